/// Central logging logic with automatic filtering
///
/// Filtering rules:
/// 1. Errors are always shown
/// 2. Debug level requires the --debug-<module> flag for that tag
/// 3. Everything else is checked against the minimum level threshold
use super::config::{get_logger_config, is_debug_enabled_for_tag};
use super::levels::LogLevel;
use super::tags::LogTag;

pub fn should_log(tag: &LogTag, level: LogLevel) -> bool {
    if level == LogLevel::Error {
        return true;
    }

    let config = get_logger_config();

    if level == LogLevel::Debug {
        return is_debug_enabled_for_tag(tag) || config.min_level >= LogLevel::Verbose;
    }

    level <= config.min_level
}

pub fn log_internal(tag: LogTag, level: LogLevel, message: &str) {
    if !should_log(&tag, level) {
        return;
    }

    super::format::format_and_log(tag, level.as_str(), message);
}

#[cfg(test)]
mod tests {
    use super::super::config::{set_logger_config, LoggerConfig};
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_error_always_logs() {
        set_logger_config(LoggerConfig {
            min_level: LogLevel::Warning,
            debug_tags: HashSet::new(),
        });
        assert!(should_log(&LogTag::Test, LogLevel::Error));
        assert!(!should_log(&LogTag::Test, LogLevel::Info));
    }

    #[test]
    fn test_debug_requires_tag_flag() {
        let mut debug_tags = HashSet::new();
        debug_tags.insert("upstream".to_string());
        set_logger_config(LoggerConfig {
            min_level: LogLevel::Info,
            debug_tags,
        });

        assert!(should_log(&LogTag::Upstream, LogLevel::Debug));
        assert!(!should_log(&LogTag::Relay, LogLevel::Debug));

        set_logger_config(LoggerConfig::default());
    }
}
