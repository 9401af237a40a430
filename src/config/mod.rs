pub mod sandbox;

pub use sandbox::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::protocol::{TfshError, TfshResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    /// Longest accepted command line in bytes, terminator excluded.
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1234,
            max_connections: 64,
            max_line_length: 4096,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TfshResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TfshError::ConfigError(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| TfshError::ConfigError(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TfshResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TfshError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TfshError::ConfigError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn load_or_create_default<P: AsRef<Path>>(path: P) -> TfshResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load_from_file(path)
        } else {
            let config = Self::default();

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| TfshError::ConfigError(format!("Failed to create config directory: {}", e)))?;
            }

            config.save_to_file(path)?;
            Ok(config)
        }
    }

    pub fn get_default_config_path() -> TfshResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TfshError::ConfigError("No configuration directory for this platform".to_string()))?
            .join("tfsh");

        Ok(config_dir.join("tfsh_config.toml"))
    }

    pub fn validate(&self) -> TfshResult<()> {
        if self.server.port == 0 {
            return Err(TfshError::ConfigError("Invalid port number".to_string()));
        }

        if self.server.max_connections == 0 {
            return Err(TfshError::ConfigError("max_connections must be greater than 0".to_string()));
        }

        if self.server.max_line_length == 0 {
            return Err(TfshError::ConfigError("max_line_length must be greater than 0".to_string()));
        }

        self.sandbox.validate()
    }
}
