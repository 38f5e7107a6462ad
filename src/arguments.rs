/// Centralized argument handling
///
/// Consolidates command-line argument parsing and debug flag checking so the
/// rest of the code never touches `std::env` directly.
///
/// Features:
/// - Centralized CMD_ARGS storage with thread-safe access
/// - Debug flag checking functions for all modules
/// - Value-style flags (--config, --port) with simple lookup
use once_cell::sync::Lazy;
use std::env;
use std::sync::Mutex;

/// Global command-line arguments storage
pub static CMD_ARGS: Lazy<Mutex<Vec<String>>> = Lazy::new(|| Mutex::new(env::args().collect()));

/// Sets the global command-line arguments
/// Used by tests to override the default env::args() collection
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

// =============================================================================
// DEBUG FLAG CHECKING FUNCTIONS
// =============================================================================

/// Module loader debug mode
pub fn is_debug_modules_enabled() -> bool {
    has_arg("--debug-modules")
}

/// Upstream connector debug mode
pub fn is_debug_upstream_enabled() -> bool {
    has_arg("--debug-upstream")
}

/// Downstream relay debug mode
pub fn is_debug_relay_enabled() -> bool {
    has_arg("--debug-relay")
}

/// Global verbose mode
pub fn is_verbose_enabled() -> bool {
    has_arg("--verbose")
}

/// Quiet mode (warnings and errors only)
pub fn is_quiet_enabled() -> bool {
    has_arg("--quiet")
}

/// Help requested
pub fn is_help_requested() -> bool {
    has_arg("--help") || has_arg("-h")
}

// =============================================================================
// VALUE OVERRIDES
// =============================================================================

/// Configuration file path override (--config <path>)
pub fn get_config_path_override() -> Option<String> {
    get_arg_value("--config")
}

/// Relay listen port override (--port <port>)
pub fn get_port_override() -> Option<u16> {
    get_arg_value("--port").and_then(|v| v.parse().ok())
}

/// Print usage information
pub fn print_help() {
    println!("homerelay - home automation display relay");
    println!();
    println!("USAGE:");
    println!("    homerelay [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --config <path>      Configuration file (default: config.toml)");
    println!("    --port <port>        Override the relay listen port");
    println!("    --verbose            Show verbose logs");
    println!("    --quiet              Only show warnings and errors");
    println!("    --debug-modules      Debug logs for the module loader");
    println!("    --debug-upstream     Debug logs for the hub connection");
    println!("    --debug-relay        Debug logs for the display server");
    println!("    -h, --help           Print this help");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_lookup() {
        set_cmd_args(vec![
            "homerelay".to_string(),
            "--config".to_string(),
            "custom.toml".to_string(),
            "--debug-relay".to_string(),
        ]);

        assert!(has_arg("--debug-relay"));
        assert!(!has_arg("--debug-upstream"));
        assert_eq!(get_arg_value("--config").as_deref(), Some("custom.toml"));
        assert_eq!(get_arg_value("--port"), None);
        assert_eq!(get_config_path_override().as_deref(), Some("custom.toml"));
    }
}
