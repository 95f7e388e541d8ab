// Configuration management module
// Handles TOML configuration for the store, embedder, and retrieval defaults

pub mod settings;


pub use settings::{Config, ConfigError, OllamaConfig, RetrievalConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
