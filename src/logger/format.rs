/// Log line formatting and output
///
/// Dual output: colored console plus optional plain-text file appender
/// (enabled with --log-file <path>).
use colored::Colorize;
use once_cell::sync::OnceCell;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use super::levels::LogLevel;
use super::tags::LogTag;

static LOG_FILE: OnceCell<Mutex<std::fs::File>> = OnceCell::new();

/// Open the log file appender (called once from logger::init)
pub fn init_file_logging(path: &str) {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            LOG_FILE.set(Mutex::new(file)).ok();
        }
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", path, e);
        }
    }
}

/// Format a log line and write it to console and file
pub fn format_and_log(tag: LogTag, level: LogLevel, message: &str) {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");

    let colored_level = match level {
        LogLevel::Error => level.as_str().red().bold(),
        LogLevel::Warning => level.as_str().yellow(),
        LogLevel::Info => level.as_str().green(),
        LogLevel::Debug => level.as_str().cyan(),
        LogLevel::Verbose => level.as_str().dimmed(),
    };

    let line = format!(
        "{} [{:<9}] [{:<9}] {}",
        timestamp,
        colored_level,
        tag.as_str().blue(),
        message
    );

    if level == LogLevel::Error {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }

    if let Some(file) = LOG_FILE.get() {
        let plain = format!(
            "{} [{:<7}] [{:<9}] {}\n",
            timestamp,
            level.as_str(),
            tag.as_str(),
            message
        );
        if let Ok(mut file) = file.lock() {
            let _ = file.write_all(plain.as_bytes());
        }
    }
}
