use crate::config::{LogFormat, LoggingSettings};
use thiserror::Error;
use tracing_subscriber::{
    filter::ParseError,
    fmt,
    layer::{Layer, SubscriberExt},
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Install a global tracing subscriber using the provided logging settings.
/// `RUST_LOG` directives take precedence over the configured level.
pub fn init(logging: &LoggingSettings) -> Result<(), Error> {
    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.parse()?)
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer().json().with_target(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid log level: {0}")]
    Level(#[from] ParseError),

    #[error("failed to install tracing subscriber: {0}")]
    Install(#[from] TryInitError),
}
