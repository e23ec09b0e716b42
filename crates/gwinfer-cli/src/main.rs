use std::error::Error;

use clap::Parser;
use gwinfer_cli::args::InferenceArgs;
use gwinfer_cli::checkpoint::run_inference;
use gwinfer_cli::logging::setup_logging;

fn main() -> Result<(), Box<dyn Error>> {
    let args = InferenceArgs::parse();
    setup_logging(args.verbose)?;
    let report = run_inference(&args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
