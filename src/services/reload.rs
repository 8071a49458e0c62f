use std::path::PathBuf;
use std::sync::Arc;

use tokio::process::Command;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::error::{AppError, Result};

/// Runs `nginx -s reload` after a successful synchronization.
///
/// Reloads are serialized through a mutex: a caller arriving while one is in
/// flight waits for it instead of racing a second reload against the same
/// master process. Failures carry the command's stderr verbatim; retrying is
/// the caller's decision.
#[derive(Clone)]
pub struct NginxReloader {
    binary: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl NginxReloader {
    pub fn new(settings: &Settings) -> Self {
        Self {
            binary: PathBuf::from(&settings.nginx.binary),
            lock: Arc::new(Mutex::new(())),
        }
    }

    #[cfg(test)]
    pub fn with_binary(binary: PathBuf) -> Self {
        Self {
            binary,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn reload(&self) -> Result<()> {
        let _guard = self.lock.lock().await;

        let output = Command::new(&self.binary)
            .args(["-s", "reload"])
            .output()
            .await
            .map_err(|e| {
                AppError::ExternalCommand(format!(
                    "failed to run {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(AppError::ExternalCommand(if stderr.is_empty() {
                format!("reload exited with {}", output.status)
            } else {
                stderr
            }));
        }

        tracing::info!("nginx reloaded");
        Ok(())
    }
}
