/// Configuration loading and access helpers
///
/// The configuration is loaded once at startup into a global and read
/// through `with_config`. Hot reloading is not supported; a config change
/// requires a restart (the auth handshake cannot be retried in place
/// anyway).
mod schemas;

pub use schemas::{Config, DisplayConfig, DuplicatePolicy, HubConfig, ModulesConfig};

use once_cell::sync::OnceCell;
use std::sync::RwLock;

/// Global configuration instance
static CONFIG: OnceCell<RwLock<Config>> = OnceCell::new();

/// Default configuration file path
pub const CONFIG_FILE_PATH: &str = "config.toml";

/// Load configuration from a specific file path into the global CONFIG
///
/// A missing file yields the default configuration (the hub url check
/// happens at connector construction, where the error message has context).
pub fn load_config_from_path(path: &str) -> Result<(), String> {
    let config = if std::path::Path::new(path).exists() {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path, e))?;

        toml::from_str::<Config>(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path, e))?
    } else {
        Config::default()
    };

    set_config(config);
    Ok(())
}

/// Replace the global configuration (used at startup and by tests)
pub fn set_config(config: Config) {
    match CONFIG.get() {
        Some(lock) => {
            if let Ok(mut current) = lock.write() {
                *current = config;
            }
        }
        None => {
            let _ = CONFIG.set(RwLock::new(config));
        }
    }
}

/// Run a closure against the current configuration
///
/// Falls back to defaults when called before `load_config_from_path`,
/// which keeps unit tests independent of on-disk state.
pub fn with_config<T>(f: impl FnOnce(&Config) -> T) -> T {
    let lock = CONFIG.get_or_init(|| RwLock::new(Config::default()));
    match lock.read() {
        Ok(config) => f(&config),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}
