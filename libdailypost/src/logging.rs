//! Logging setup shared by the Dailypost binaries
//!
//! Logs always go to stderr so that command output on stdout stays
//! machine-readable.
//!
//! # Examples
//!
//! ```no_run
//! use libdailypost::logging::{LoggingConfig, LogFormat};
//!
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init();
//!
//! // Or respect DAILYPOST_LOG_FORMAT / DAILYPOST_LOG_LEVEL
//! libdailypost::logging::init_default();
//! ```

use std::str::FromStr;

pub const LOG_FORMAT_ENV_VAR: &str = "DAILYPOST_LOG_FORMAT";
pub const LOG_LEVEL_ENV_VAR: &str = "DAILYPOST_LOG_LEVEL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl LogFormat {
    pub const ALL: [LogFormat; 3] = [LogFormat::Text, LogFormat::Json, LogFormat::Pretty];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        LogFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| {
                format!(
                    "Invalid log format: '{}'. Valid options: text, json, pretty",
                    s
                )
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the binaries should log: format, level and the `--verbose` switch
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// `verbose` forces the debug level unless `RUST_LOG` says otherwise
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Build from the environment, letting `verbose` override the level
    pub fn from_env(verbose: bool) -> Self {
        let format = std::env::var(LOG_FORMAT_ENV_VAR)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(LogFormat::Text);

        let level = std::env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| "info".to_string());

        Self::new(format, level, verbose)
    }

    fn filter_directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    /// Install the global subscriber. Call once per process.
    ///
    /// # Panics
    ///
    /// Panics if a subscriber has already been installed
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.filter_directive()));

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .init();
            }
        }
    }
}

/// Initialize logging from `DAILYPOST_LOG_FORMAT` and `DAILYPOST_LOG_LEVEL`.
///
/// Falls back to text format at info level.
pub fn init_default() {
    LoggingConfig::from_env(false).init();
}
