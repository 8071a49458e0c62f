use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::Settings;
use crate::models::AnalyticsEvent;

/// Retention cap; oldest entries are evicted first.
const MAX_ENTRIES: usize = 1000;

/// Append-mostly analytics log (`analytics.json`). The file holds a single
/// JSON array, read in full and rewritten in full on each append, which is
/// fine at the retention cap. Write failures are logged and never block the
/// session transition that produced the event.
#[derive(Clone)]
pub struct AnalyticsLog {
    path: Arc<PathBuf>,
    write_lock: Arc<Mutex<()>>,
}

impl AnalyticsLog {
    pub fn new(settings: &Settings) -> Self {
        Self::at(PathBuf::from(&settings.paths.analytics))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path: Arc::new(path),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn append(&self, event: AnalyticsEvent) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut events = self.read_all();
        events.push(event);
        if events.len() > MAX_ENTRIES {
            let excess = events.len() - MAX_ENTRIES;
            events.drain(..excess);
        }

        match serde_json::to_string_pretty(&events) {
            Ok(raw) => {
                if let Err(e) = fs::write(self.path.as_ref(), raw) {
                    tracing::error!("Failed to write analytics log: {}", e);
                }
            }
            Err(e) => tracing::error!("Failed to serialize analytics log: {}", e),
        }
    }

    /// The newest `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<AnalyticsEvent> {
        let events = self.read_all();
        let skip = events.len().saturating_sub(limit);
        events.into_iter().skip(skip).collect()
    }

    fn read_all(&self) -> Vec<AnalyticsEvent> {
        match fs::read_to_string(self.path.as_ref()) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalyticsEventKind;

    #[test]
    fn test_append_and_recent_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = AnalyticsLog::at(dir.path().join("analytics.json"));

        log.append(AnalyticsEvent::stream_start("alice"));
        log.append(AnalyticsEvent::stream_stop(Some("alice".into()), 60, 5));

        let events = log.recent(100);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, AnalyticsEventKind::StreamStart);
        assert_eq!(events[1].event, AnalyticsEventKind::StreamStop);
        assert_eq!(events[1].duration, Some(60));
    }

    #[test]
    fn test_retention_cap_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let log = AnalyticsLog::at(dir.path().join("analytics.json"));

        for i in 0..(MAX_ENTRIES + 5) {
            log.append(AnalyticsEvent::stream_start(&format!("user{i}")));
        }

        let events = log.recent(MAX_ENTRIES + 100);
        assert_eq!(events.len(), MAX_ENTRIES);
        assert_eq!(events[0].publisher.as_deref(), Some("user5"));
    }

    #[test]
    fn test_recent_limits_to_newest() {
        let dir = tempfile::tempdir().unwrap();
        let log = AnalyticsLog::at(dir.path().join("analytics.json"));

        for i in 0..10 {
            log.append(AnalyticsEvent::stream_start(&format!("user{i}")));
        }

        let events = log.recent(3);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].publisher.as_deref(), Some("user7"));
        assert_eq!(events[2].publisher.as_deref(), Some("user9"));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = AnalyticsLog::at(dir.path().join("analytics.json"));
        assert!(log.recent(100).is_empty());
    }
}
