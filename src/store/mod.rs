use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::StreamConfig;

/// Reads and writes the declarative configuration file (`config.json`).
///
/// This process is the sole owner of the file; every read goes back to disk
/// so an apply always works from what was last saved.
#[derive(Clone)]
pub struct ConfigStore {
    path: Arc<PathBuf>,
}

impl ConfigStore {
    pub fn open(settings: &Settings) -> anyhow::Result<Self> {
        let path = PathBuf::from(&settings.paths.config);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            let default = StreamConfig::default();
            fs::write(&path, serde_json::to_string_pretty(&default)?)?;
            tracing::info!("Seeded default configuration at {}", path.display());
        }
        Ok(Self {
            path: Arc::new(path),
        })
    }

    #[cfg(test)]
    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
        }
    }

    pub fn read(&self) -> Result<StreamConfig> {
        let raw = fs::read_to_string(self.path.as_ref())?;
        serde_json::from_str(&raw)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed configuration: {e}")))
    }

    pub fn write(&self, config: &StreamConfig) -> Result<()> {
        let raw = serde_json::to_string_pretty(config)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize configuration: {e}")))?;
        fs::write(self.path.as_ref(), raw)?;
        Ok(())
    }
}
