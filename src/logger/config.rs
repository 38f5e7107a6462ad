/// Logger configuration derived from command-line arguments
use super::levels::LogLevel;
use super::tags::LogTag;
use crate::arguments;
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::sync::RwLock;

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum level shown without a per-tag flag
    pub min_level: LogLevel,

    /// Tags with --debug-<key> enabled
    pub debug_tags: HashSet<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            debug_tags: HashSet::new(),
        }
    }
}

static LOGGER_CONFIG: Lazy<RwLock<LoggerConfig>> =
    Lazy::new(|| RwLock::new(LoggerConfig::default()));

/// Scan command-line arguments and configure the logger
///
/// Recognizes --quiet, --verbose and any --debug-<key> flag.
pub fn init_from_args() {
    let mut config = LoggerConfig::default();

    if arguments::is_quiet_enabled() {
        config.min_level = LogLevel::Warning;
    } else if arguments::is_verbose_enabled() {
        config.min_level = LogLevel::Verbose;
    }

    for arg in arguments::get_cmd_args() {
        if let Some(key) = arg.strip_prefix("--debug-") {
            config.debug_tags.insert(key.to_lowercase());
        }
    }

    set_logger_config(config);
}

/// Get a snapshot of the current logger configuration
pub fn get_logger_config() -> LoggerConfig {
    LOGGER_CONFIG
        .read()
        .map(|c| c.clone())
        .unwrap_or_default()
}

/// Replace the logger configuration (used by init and tests)
pub fn set_logger_config(config: LoggerConfig) {
    if let Ok(mut current) = LOGGER_CONFIG.write() {
        *current = config;
    }
}

/// Check whether debug output is enabled for a tag
pub fn is_debug_enabled_for_tag(tag: &LogTag) -> bool {
    get_logger_config().debug_tags.contains(&tag.to_debug_key())
}
