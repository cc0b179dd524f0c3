use crate::args::LogFormat;
use crate::error::WorkerError;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Logs go to stderr; stdout is left alone.
///
/// A valid `RUST_LOG` takes precedence over `level`.
pub fn init(level: &str, format: LogFormat) -> Result<(), WorkerError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|_| WorkerError::LogLevel(level.to_string()))?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|err| WorkerError::Logging(err.to_string()))
}
