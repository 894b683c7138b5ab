//! Structured logging and tracing for the charge controller
//!
//! Console and rolling-file layers on top of `tracing-subscriber`, plus a thin
//! component logger that stamps every line with the component, session and
//! bus it concerns.

use crate::config::LoggingConfig;
use crate::error::{ChademoError, Result};
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod level;
mod state;
mod structured;

pub use level::{layer_level, level_rank, min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

use state::{INIT_ERROR, INIT_ONCE, LOG_GUARD};

/// Initialize logging system based on configuration
///
/// Only the first call installs a subscriber; later calls report the outcome
/// of that first attempt.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_ONCE.call_once(|| {
        let init_result = (|| -> Result<()> {
            let base_level = parse_log_level(&config.level)?;
            let console_level = layer_level(config.console_level.as_deref(), base_level);
            let file_level = layer_level(config.file_level.as_deref(), base_level);

            // Most verbose level so per-layer filters can down-filter
            let filter = build_env_filter(min_level(console_level, file_level));

            if should_use_console_only() {
                init_console_only_logging(filter, config.json_format, console_level);
                return Ok(());
            }

            init_file_logging(config, filter, console_level, file_level)
        })();

        if let Err(e) = init_result {
            let _ = INIT_ERROR.set(e.to_string());
        }
    });

    if let Some(err) = INIT_ERROR.get() {
        return Err(ChademoError::config(err.clone()));
    }
    Ok(())
}

fn build_env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("chademo_ctl={}", level).into())
}

fn should_use_console_only() -> bool {
    cfg!(test) || std::env::var_os("CHADEMO_DISABLE_FILE_LOG").is_some()
}

fn init_console_only_logging(filter: EnvFilter, json_format: bool, console_level: Level) {
    let console_layer = {
        let layer = fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false);
        if json_format {
            layer
                .json()
                .with_filter(LevelFilter::from_level(console_level))
                .boxed()
        } else {
            layer
                .with_filter(LevelFilter::from_level(console_level))
                .boxed()
        }
    };

    // A test harness may already own the global subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();

    info!(
        "Logging initialized - console_level: {:?}, console-only",
        console_level
    );
}

/// Directory receiving rotated files: the parent of a file path, or the path itself
fn log_directory(file: &str) -> &Path {
    let p = Path::new(file);
    if p.extension().is_some() {
        p.parent().unwrap_or(p)
    } else {
        p
    }
}

fn init_file_logging(
    config: &LoggingConfig,
    filter: EnvFilter,
    console_level: Level,
    file_level: Level,
) -> Result<()> {
    let registry = tracing_subscriber::registry().with(filter);

    // Set up log file appender with rotation
    let file_appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix("chademo")
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(log_directory(&config.file))
        .map_err(|e| ChademoError::io(format!("Failed to create log file appender: {}", e)))?;

    let (non_blocking_appender, guard) = non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let file_layer = {
        let base = fmt::layer()
            .with_writer(non_blocking_appender)
            .with_ansi(false)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false);
        if config.json_format {
            base.json()
                .with_filter(LevelFilter::from_level(file_level))
                .boxed()
        } else {
            base.with_filter(LevelFilter::from_level(file_level))
                .boxed()
        }
    };

    let subscriber = registry.with(file_layer);

    let init = if config.console_output {
        let console_layer = {
            let base = fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false);
            if config.json_format {
                base.json()
                    .with_filter(LevelFilter::from_level(console_level))
                    .boxed()
            } else {
                base.with_filter(LevelFilter::from_level(console_level))
                    .boxed()
            }
        };
        subscriber.with(console_layer).try_init()
    } else {
        subscriber.try_init()
    };
    init.map_err(|e| ChademoError::config(format!("Failed to install subscriber: {}", e)))?;

    info!(
        "Logging initialized - console_level: {:?}, file_level: {:?}, file: {}",
        console_level, file_level, config.file
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_layer_level_falls_back() {
        assert_eq!(layer_level(None, Level::INFO), Level::INFO);
        assert_eq!(layer_level(Some("debug"), Level::INFO), Level::DEBUG);
        assert_eq!(layer_level(Some("bogus"), Level::WARN), Level::WARN);
        assert_eq!(min_level(Level::WARN, Level::DEBUG), Level::DEBUG);
    }

    #[test]
    fn test_log_directory() {
        assert_eq!(log_directory("/tmp/chademo.log"), Path::new("/tmp"));
        assert_eq!(log_directory("/var/log/chademo"), Path::new("/var/log/chademo"));
    }

    #[test]
    fn test_log_context_fields() {
        let logger = get_logger_with_context(
            LogContext::new("controller")
                .with_session_id("abc".to_string())
                .with_bus("chademo")
                .with_field("state", "Idle".to_string()),
        );
        assert_eq!(
            logger.format_fields(),
            "component=controller,session_id=abc,bus=chademo,state=Idle"
        );

        let tagged = get_logger("runtime").for_session("xyz");
        assert_eq!(tagged.format_fields(), "component=runtime,session_id=xyz");
    }

    #[test]
    fn test_init_console_only() {
        let config = LoggingConfig::default();
        assert!(init_logging(&config).is_ok());
        // Second call is a no-op
        assert!(init_logging(&config).is_ok());
        get_logger("test").info("logging up");
    }
}
