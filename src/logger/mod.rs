//! Structured logging for xtream-cache
//!
//! Tagged, leveled logging with per-module debug control:
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Debug output gated per tag via `--debug-<module>` flags
//! - Dual output: colored console + optional file appender
//!
//! Call `logger::init()` once at startup before any logging occurs.

mod format;
mod levels;
mod tags;

pub use levels::LogLevel;
pub use tags::LogTag;

use once_cell::sync::OnceCell;

use crate::arguments;

struct LoggerConfig {
    min_level: LogLevel,
}

static LOGGER_CONFIG: OnceCell<LoggerConfig> = OnceCell::new();

/// Initialize the logger system from command-line arguments
pub fn init() {
    let min_level = if arguments::is_verbose_enabled() {
        LogLevel::Verbose
    } else if arguments::is_quiet_enabled() {
        LogLevel::Warning
    } else {
        LogLevel::Info
    };

    LOGGER_CONFIG.set(LoggerConfig { min_level }).ok();

    if let Some(path) = arguments::get_arg_value("--log-file") {
        format::init_file_logging(&path);
    }
}

fn min_level() -> LogLevel {
    LOGGER_CONFIG
        .get()
        .map(|c| c.min_level)
        .unwrap_or(LogLevel::Info)
}

/// Filtering rules:
/// 1. Errors always log
/// 2. Debug for a tag logs when --debug-<tag> is set, regardless of min level
/// 3. Everything else goes through the minimum level threshold
fn should_log(tag: LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }
    if level == LogLevel::Debug && arguments::is_debug_enabled_for(tag.debug_key()) {
        return true;
    }
    level <= min_level()
}

fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(tag, level) {
        return;
    }
    format::format_and_log(tag, level, message);
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level
pub fn warning(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level
pub fn info(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level (shown with --debug-<module> or --verbose)
pub fn debug(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level (shown with --verbose)
pub fn verbose(tag: LogTag, message: &str) {
    log_internal(tag, LogLevel::Verbose, message);
}
