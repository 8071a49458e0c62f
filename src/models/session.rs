use serde::{Deserialize, Serialize};

/// The single broadcast session record, persisted verbatim to `session.json`.
///
/// Timestamps are epoch milliseconds. `start_time` survives reconnects within
/// the grace period; `total_views` counts new sessions only, never resumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct StreamSession {
    pub is_live: bool,
    pub start_time: Option<i64>,
    pub publisher: Option<String>,
    pub disconnect_time: Option<i64>,
    pub peak_viewers: u64,
    pub total_views: u64,
}

impl StreamSession {
    /// Live sessions never carry a disconnect timestamp.
    pub fn uptime_seconds(&self, now_ms: i64) -> u64 {
        match (self.is_live, self.start_time) {
            (true, Some(start)) => ((now_ms - start).max(0) / 1000) as u64,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_serializes_camel_case() {
        let session = StreamSession {
            is_live: true,
            start_time: Some(1_700_000_000_000),
            publisher: Some("alice".into()),
            disconnect_time: None,
            peak_viewers: 12,
            total_views: 3,
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains("\"isLive\":true"));
        assert!(json.contains("\"startTime\":1700000000000"));
        assert!(json.contains("\"peakViewers\":12"));
        assert!(json.contains("\"totalViews\":3"));
    }

    #[test]
    fn test_uptime_only_while_live() {
        let mut session = StreamSession {
            is_live: true,
            start_time: Some(1_000),
            ..Default::default()
        };
        assert_eq!(session.uptime_seconds(61_000), 60);
        session.is_live = false;
        assert_eq!(session.uptime_seconds(61_000), 0);
    }
}
