use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::protocol::{TfshError, TfshResult};

/// Where the served folder lives on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Server root. Relative paths are taken from the process working directory.
    pub root: String,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: "server".to_string(),
        }
    }
}

impl SandboxConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_string_lossy().to_string(),
        }
    }

    pub fn get_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    pub fn validate(&self) -> TfshResult<()> {
        if self.root.trim().is_empty() {
            return Err(TfshError::ConfigError("Sandbox root must not be empty".to_string()));
        }

        let path = self.get_path();
        if path.exists() && !path.is_dir() {
            return Err(TfshError::ConfigError(
                format!("Sandbox root '{}' exists but is not a directory", self.root)
            ));
        }

        Ok(())
    }
}
