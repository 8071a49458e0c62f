use std::fs;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};

use crate::config::Settings;
use crate::error::{AppError, Result};
use crate::models::{HlsProfile, Platform, StreamConfig};
use crate::services::managed_block::{HLS_REGION, PUSH_REGION};

/// Matches the current transcoding invocation so its interpreter and script
/// directory survive a profile switch.
pub static EXEC_PUBLISH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"exec_publish\s+([^\s;]+)\s+([^\s;]+/)ffmpeg-abr(?:-lowcpu)?\.sh\b")
        .expect("hardcoded exec_publish pattern is invalid - fix source code")
});

/// Matches the secure_link_md5 directive for in-place secret replacement.
/// Deliberately strict: if the directive format drifts this fails closed
/// (`RegionNotFound`) instead of guessing and corrupting the directive.
pub static SECURE_LINK_DIRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"secure_link_md5\s+"[^"]*";"#)
        .expect("hardcoded secure_link_md5 pattern is invalid - fix source code")
});

/// Extracts the secret currently written into the directive.
pub static SECURE_LINK_SECRET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"secure_link_md5\s+"\$arg_expires\$uri\s+([^"]+)";"#)
        .expect("hardcoded secure_link secret pattern is invalid - fix source code")
});

static HLS_SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9!@#%_+\-=:.,]+$")
        .expect("hardcoded secret charset pattern is invalid - fix source code")
});

const DEFAULT_EXEC_COMMAND: &str = "/bin/bash";
const DEFAULT_SCRIPT_DIR: &str = "/var/www/nginx-rtmp-module/scripts/";
const NO_TARGETS_PLACEHOLDER: &str = "# (no push targets enabled)";

pub fn is_valid_hls_secret(secret: &str) -> bool {
    HLS_SECRET_PATTERN.is_match(secret)
}

/// Keeps the managed regions of the live nginx.conf in sync with the
/// declarative configuration. Each region is read, regenerated, and written
/// back atomically; a multi-region apply stops at the first failure.
pub struct ConfigSynchronizer {
    conf_path: PathBuf,
}

impl ConfigSynchronizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            conf_path: PathBuf::from(&settings.nginx.conf_path),
        }
    }

    #[cfg(test)]
    pub fn with_conf_path(conf_path: PathBuf) -> Self {
        Self { conf_path }
    }

    fn read_conf(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.conf_path)?)
    }

    fn write_conf(&self, content: &str) -> Result<()> {
        fs::write(&self.conf_path, content)?;
        Ok(())
    }

    /// Regenerate the push-target region from all enabled platforms.
    /// Returns the final target URLs that were written.
    pub fn sync_push_targets(&self, config: &StreamConfig) -> Result<Vec<String>> {
        let conf = self.read_conf()?;
        let targets = collect_push_targets(config);
        let body = if targets.is_empty() {
            NO_TARGETS_PLACEHOLDER.to_string()
        } else {
            targets
                .iter()
                .map(|url| format!("push {url};"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let updated = PUSH_REGION.render(&conf, &body)?;
        self.write_conf(&updated)?;
        Ok(targets)
    }

    /// Rewrite the transcoding invocation for the configured profile,
    /// preserving the interpreter and script directory already in the file.
    pub fn sync_hls_pipeline(&self, config: &StreamConfig) -> Result<HlsProfile> {
        let conf = self.read_conf()?;
        let profile = HlsProfile::normalize(Some(&config.hls.profile));
        let exec_line = build_exec_publish_line(&conf, profile.script());

        let updated = HLS_REGION.render(&conf, &exec_line)?;
        self.write_conf(&updated)?;
        Ok(profile)
    }

    /// Replace the secure_link_md5 secret in place. The directive is matched
    /// structurally rather than by markers.
    pub fn sync_secret(&self, secret: &str) -> Result<()> {
        if !is_valid_hls_secret(secret) {
            return Err(AppError::Validation(
                "HLS secret may only contain letters, digits and !@#%_+-=:.,".to_string(),
            ));
        }

        let conf = self.read_conf()?;
        if !SECURE_LINK_DIRECTIVE.is_match(&conf) {
            return Err(AppError::RegionNotFound(
                "secure_link_md5 directive not found in nginx.conf".to_string(),
            ));
        }

        let directive = format!("secure_link_md5 \"$arg_expires$uri {secret}\";");
        let updated = SECURE_LINK_DIRECTIVE.replacen(&conf, 1, NoExpand(&directive));
        self.write_conf(&updated)?;
        Ok(())
    }

    /// The secret currently written in the directive, if any.
    pub fn read_secret(&self) -> Option<String> {
        let conf = self.read_conf().ok()?;
        SECURE_LINK_SECRET
            .captures(&conf)
            .map(|caps| caps[1].to_string())
    }

    /// Synchronize every managed region: pipeline first, then push targets.
    /// Stops at the first failure; a partial apply is surfaced, not masked.
    pub fn apply_all(&self, config: &StreamConfig) -> Result<()> {
        self.sync_hls_pipeline(config)?;
        self.sync_push_targets(config)?;
        Ok(())
    }

    /// Startup check: the token generator signs with the config secret, nginx
    /// verifies with the one in its conf. Drift means every token is rejected.
    pub fn warn_on_secret_mismatch(&self, config: &StreamConfig) {
        let Some(expected) = config.auth.hls_secret.as_deref() else {
            return;
        };
        if let Some(actual) = self.read_secret() {
            if actual != expected {
                tracing::warn!("HLS secret mismatch between config.json and nginx.conf");
            }
        }
    }
}

/// Final push URL for a platform: base + key with exactly one separating
/// slash. `None` when the platform lacks a usable URL or key.
fn build_push_url(platform: &Platform) -> Option<String> {
    let base = platform.url.trim();
    let key = platform.key.trim();
    if base.is_empty() || key.is_empty() {
        return None;
    }
    if base.ends_with('/') {
        Some(format!("{base}{key}"))
    } else {
        Some(format!("{base}/{key}"))
    }
}

/// Every enabled platform's push URL, de-duplicated by final URL with
/// first-seen order preserved.
fn collect_push_targets(config: &StreamConfig) -> Vec<String> {
    let mut targets = Vec::new();
    for platform in config.platforms.iter().chain(&config.custom_platforms) {
        if !platform.enabled {
            continue;
        }
        let Some(url) = build_push_url(platform) else {
            continue;
        };
        if !targets.contains(&url) {
            targets.push(url);
        }
    }
    targets
}

fn build_exec_publish_line(conf: &str, script: &str) -> String {
    let (command, dir) = match EXEC_PUBLISH_PATTERN.captures(conf) {
        Some(caps) => (caps[1].to_string(), caps[2].to_string()),
        None => (DEFAULT_EXEC_COMMAND.to_string(), DEFAULT_SCRIPT_DIR.to_string()),
    };
    format!("exec_publish {command} {dir}{script} $name;")
}
