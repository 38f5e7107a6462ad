//! Structured logging for homerelay
//!
//! Provides a small, ergonomic logging API with:
//! - Standard log levels (Error/Warning/Info/Debug/Verbose)
//! - Per-module debug control via --debug-<module> flags
//! - Colored console output
//!
//! ## Usage
//!
//! ```rust
//! use homerelay::logger::{self, LogTag};
//!
//! logger::info(LogTag::Upstream, "Successfully authenticated");
//! logger::debug(LogTag::Relay, "Client subscribed to 3 entities"); // only with --debug-relay
//! ```
//!
//! Call `logger::init()` once at startup, before any logging occurs.

mod config;
mod core;
mod format;
mod levels;
mod tags;

pub use config::{get_logger_config, init_from_args, set_logger_config, LoggerConfig};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger system from command-line arguments
pub fn init() {
    config::init_from_args();
}

/// Log at ERROR level (always shown)
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Log at WARNING level (shown unless --quiet)
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

/// Log at INFO level (standard operations)
pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Log at DEBUG level - only shown when the matching --debug-<module> flag
/// is provided
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Log at VERBOSE level - only shown with --verbose
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}
