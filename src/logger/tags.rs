/// Log tags identifying the subsystem a message originates from
///
/// Each tag maps to a --debug-<key> command-line flag for targeted debug
/// output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Modules,
    Upstream,
    Relay,
    Http,
    Test,
    Other(String),
}

impl LogTag {
    /// Key used for --debug-<key> flag matching
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Modules => "modules".to_string(),
            LogTag::Upstream => "upstream".to_string(),
            LogTag::Relay => "relay".to_string(),
            LogTag::Http => "http".to_string(),
            LogTag::Test => "test".to_string(),
            LogTag::Other(s) => s.to_lowercase(),
        }
    }

    /// Uppercase display name for the console prefix
    pub fn to_plain_string(&self) -> String {
        match self {
            LogTag::System => "SYSTEM".to_string(),
            LogTag::Modules => "MODULES".to_string(),
            LogTag::Upstream => "UPSTREAM".to_string(),
            LogTag::Relay => "RELAY".to_string(),
            LogTag::Http => "HTTP".to_string(),
            LogTag::Test => "TEST".to_string(),
            LogTag::Other(s) => s.to_uppercase(),
        }
    }
}
