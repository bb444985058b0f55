//! Logging configuration and initialization

use serde::Deserialize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use posecast_core::{PosecastError, PosecastResult};

/// Environment variable holding the log filter
pub const LOG_FILTER_ENV: &str = "POSECAST_LOG";

/// Environment variable selecting the output format (`json` or `compact`)
pub const LOG_FORMAT_ENV: &str = "POSECAST_LOG_FORMAT";

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when no environment filter is set (default: "info")
    pub default_level: String,
    /// JSON output instead of compact text
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Install the global tracing subscriber
///
/// `POSECAST_LOG` is read first, then `RUST_LOG`, then the configured
/// default level. `POSECAST_LOG_FORMAT=json` forces JSON output.
pub fn init_logging(config: &LogConfig) -> PosecastResult<()> {
    let env_filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .map_err(|e| PosecastError::Config(format!("invalid log filter: {}", e)))?;

    let use_json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(config.json_format);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if use_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .try_init()
    };

    result.map_err(|e| PosecastError::Config(format!("logging already initialized: {}", e)))
}
