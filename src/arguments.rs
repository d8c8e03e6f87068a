/// Centralized argument handling
///
/// Consolidates command-line argument parsing and debug flag checking
/// so the logger and config modules read flags through one place.
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
/// Thread-safe singleton so tests and binaries can override env::args()
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments (used by tests)
pub fn set_cmd_args(args: Vec<String>) {
    if let Ok(mut cmd_args) = CMD_ARGS.lock() {
        *cmd_args = args;
    }
}

/// Gets a copy of the current command-line arguments
pub fn get_cmd_args() -> Vec<String> {
    match CMD_ARGS.lock() {
        Ok(args) => args.clone(),
        Err(_) => env::args().collect(),
    }
}

/// Checks if a specific argument is present in the command line
pub fn has_arg(arg: &str) -> bool {
    get_cmd_args().iter().any(|a| a == arg)
}

/// Gets the value of a command-line argument that follows a flag
/// Returns None if the flag is not found or has no value
pub fn get_arg_value(flag: &str) -> Option<String> {
    let args = get_cmd_args();
    for (i, arg) in args.iter().enumerate() {
        if arg == flag && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }
    None
}

/// Verbose output mode (--verbose)
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Quiet mode - warnings and errors only (--quiet)
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Per-module debug mode (--debug-cache, --debug-upstream, ...)
pub fn is_debug_enabled_for(module: &str) -> bool {
    has_arg(&format!("--debug-{}", module))
}

/// Help request (--help / -h)
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

/// Print usage information
pub fn print_help() {
    println!("xtream-cache - caching proxy for Xtream Code IPTV panels");
    println!();
    println!("USAGE:");
    println!("    xtream-cache [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>       Config file path (default: config.json)");
    println!("    --host <addr>         Bind address override");
    println!("    --port <port>         Bind port override");
    println!("    --db-path <path>      SQLite database path override");
    println!("    --verbose             Show verbose log output");
    println!("    --quiet               Warnings and errors only");
    println!("    --debug-<module>      Per-module debug logs (cache, upstream, proxy, webserver)");
    println!("    --help, -h            Show this help");
}
