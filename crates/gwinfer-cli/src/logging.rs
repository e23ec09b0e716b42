use gwinfer_core::{ErrorInfo, InferenceError};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Installs the global subscriber: INFO by default, DEBUG with `--verbose`.
pub fn setup_logging(verbose: bool) -> Result<(), InferenceError> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).map_err(|err| {
        InferenceError::Config(ErrorInfo::new("logging-init", err.to_string()))
    })
}
