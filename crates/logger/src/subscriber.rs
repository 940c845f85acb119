use std::env::{VarError, var};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the log layer, selected through `RUST_LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn from_env() -> Self {
        Self::from_var(var("RUST_LOG_FORMAT"))
    }

    /// An unset or non-unicode variable selects the default quietly.
    fn from_var(raw: Result<String, VarError>) -> Self {
        Self::parse(&raw.unwrap_or_default())
    }

    /// Unknown values fall back to [`LogFormat::Compact`].
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Compact,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `default_level`.
///
/// Calling this twice is harmless: the second registration is ignored.
pub fn init_tracing(default_level: LevelFilter) {
    let env_filter =
        EnvFilter::builder().with_default_directive(default_level.into()).from_env_lossy();

    let log_layer = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_filter(env_filter)
            .boxed(),
    };

    let _ = tracing_subscriber::registry().with(log_layer).try_init();
}
