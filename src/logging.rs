use crate::error::{ClientError, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing for the binary. Logs go to stderr so query results
/// on stdout stay machine-readable.
pub fn init_logging(level: &str) -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_new(level)
                .map_err(|e| ClientError::InvalidArgument(format!("invalid log level: {e}")))?,
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| ClientError::InvalidArgument("logging already initialized".into()))
}
