#![deny(missing_docs)]

//! Driver library behind the `gwinfer` and `gwinfer-plot-acf` binaries.

/// Command-line arguments and their validation.
pub mod args;
pub mod checkpoint;
/// Global tracing subscriber setup.
pub mod logging;
/// Autocorrelation plots rendered as SVG.
pub mod plot;
/// Processing scheme and worker pool sizing.
pub mod scheme;

pub use args::{InferenceArgs, PlotAcfArgs, RunTarget};
pub use checkpoint::{run_inference, validate_checkpoint_files, CheckpointPaths, RunReport};
pub use plot::{plot_acf, render_acf_svg, PlotOptions, PlotReport};
