//! tracing subscriber setup.
//!
//! Logs go to stderr so `check` can print its JSON result on stdout.
//! `RUST_LOG`, when set, replaces the level chosen from `-v`/`-q`.

use tracing_subscriber::EnvFilter;

use crate::cli::VerbosityLevel;
use crate::error::{Result, ValidationError};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive
    pub level: String,
    /// Include file and line numbers
    pub source_location: bool,
    /// Include thread IDs
    pub thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            source_location: false,
            thread_ids: false,
        }
    }
}

impl LoggingConfig {
    /// Create logging config from verbosity level
    pub fn from_verbosity(verbosity: VerbosityLevel) -> Self {
        let mut config = Self::default();

        match verbosity {
            VerbosityLevel::Quiet => config.level = "error".to_string(),
            VerbosityLevel::Normal => config.level = "info,tower_http=warn".to_string(),
            VerbosityLevel::Verbose => config.level = "debug,hyper=info".to_string(),
            VerbosityLevel::Debug => {
                config.level = "trace".to_string();
                config.source_location = true;
                config.thread_ids = true;
            }
        }

        config
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level))
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(atty::is(atty::Stream::Stderr))
        .with_thread_ids(config.thread_ids)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(|e| {
        ValidationError::Config(format!("Failed to initialize logging: {}", e))
    })?;

    tracing::debug!(config = ?config, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_verbosity() {
        assert_eq!(LoggingConfig::from_verbosity(VerbosityLevel::Quiet).level, "error");
        assert!(
            LoggingConfig::from_verbosity(VerbosityLevel::Normal)
                .level
                .starts_with("info")
        );
        assert!(
            LoggingConfig::from_verbosity(VerbosityLevel::Verbose)
                .level
                .starts_with("debug")
        );

        let debug = LoggingConfig::from_verbosity(VerbosityLevel::Debug);
        assert_eq!(debug.level, "trace");
        assert!(debug.source_location);
        assert!(debug.thread_ids);
    }
}
