use regex::{NoExpand, Regex};

use crate::error::{AppError, Result};

/// A named span of the nginx.conf wholly owned by this service, delimited by
/// two literal comment lines. Everything between the markers is regenerated
/// on every synchronization; everything outside is preserved byte-for-byte.
pub struct ManagedRegion {
    pub name: &'static str,
    pub start: &'static str,
    pub end: &'static str,
}

pub const PUSH_REGION: ManagedRegion = ManagedRegion {
    name: "push targets",
    start: "# === Managed Push Targets (auto-generated; do not edit) ===",
    end: "# === End Managed Push Targets ===",
};

pub const HLS_REGION: ManagedRegion = ManagedRegion {
    name: "HLS pipeline",
    start: "# === Managed HLS Pipeline (auto-generated; do not edit) ===",
    end: "# === End Managed HLS Pipeline ===",
};

impl ManagedRegion {
    /// Replace the body of the first marker pair with `body`, keeping the
    /// markers. Errors with `RegionNotFound` if the pair is absent. Replacing
    /// with an identical body is a successful no-op, so repeated
    /// synchronization is idempotent.
    pub fn render(&self, content: &str, body: &str) -> Result<String> {
        let pattern = Regex::new(&format!(
            "(?s){}.*?{}",
            regex::escape(self.start),
            regex::escape(self.end)
        ))
        .expect("marker pattern is built from literal markers");

        if !pattern.is_match(content) {
            return Err(AppError::RegionNotFound(format!(
                "managed {} block not found in nginx.conf",
                self.name
            )));
        }

        let block = format!("{}\n{}\n{}", self.start, body, self.end);
        Ok(pattern.replacen(content, 1, NoExpand(&block)).into_owned())
    }
}
