//! Logging setup on `tracing-subscriber`
//!
//! Library code only emits `tracing` events; applications call
//! [`init_tracing`] once at startup. `RUST_LOG` overrides the configured
//! level.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use tracing_subscriber::util::TryInitError;

const CRATES: [&str; 6] = ["waypoint", "route_model", "navigation", "flow_engine", "deep_link", "storage"];

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human readable output
    #[default]
    Pretty,
    /// Single-line output
    Compact,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Level for the navigation crates
    pub level: Level,
    /// Output format
    pub format: LogFormat,
    /// Include the module path
    pub with_target: bool,
    /// Use ANSI colors
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::default(),
            with_target: false,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Set the level
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable module paths
    #[must_use]
    pub fn with_target(mut self, enable: bool) -> Self {
        self.with_target = enable;
        self
    }

    /// Enable or disable colors
    #[must_use]
    pub fn with_ansi(mut self, enable: bool) -> Self {
        self.with_ansi = enable;
        self
    }
}

/// Install the global subscriber
///
/// Fails if a global subscriber is already set.
pub fn init_tracing(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = build_env_filter(config.level);
    let layer = fmt::layer().with_ansi(config.with_ansi).with_target(config.with_target);

    match config.format {
        LogFormat::Pretty => tracing_subscriber::registry().with(filter).with(layer.pretty()).try_init(),
        LogFormat::Compact => tracing_subscriber::registry().with(filter).with(layer.compact()).try_init(),
    }
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

fn default_directives(level: Level) -> String {
    let level = level.as_str().to_lowercase();
    let mut directives = vec!["warn".to_string()];
    directives.extend(CRATES.iter().map(|krate| format!("{}={}", krate, level)));
    directives.join(",")
}
