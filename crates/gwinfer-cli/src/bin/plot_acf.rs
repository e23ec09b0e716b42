use std::error::Error;

use clap::Parser;
use gwinfer_cli::args::PlotAcfArgs;
use gwinfer_cli::logging::setup_logging;
use gwinfer_cli::plot::plot_acf;

fn main() -> Result<(), Box<dyn Error>> {
    let args = PlotAcfArgs::parse();
    setup_logging(args.verbose)?;
    let report = plot_acf(&args)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
