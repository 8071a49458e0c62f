use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsEventKind {
    StreamStart,
    StreamStop,
}

/// One entry in the append-only analytics log (`analytics.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub timestamp: DateTime<Utc>,
    pub event: AnalyticsEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Whole seconds, stream_stop only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peak_viewers: Option<u64>,
}

impl AnalyticsEvent {
    pub fn stream_start(publisher: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            event: AnalyticsEventKind::StreamStart,
            publisher: Some(publisher.to_string()),
            duration: None,
            peak_viewers: None,
        }
    }

    pub fn stream_stop(publisher: Option<String>, duration: u64, peak_viewers: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            event: AnalyticsEventKind::StreamStop,
            publisher,
            duration: Some(duration),
            peak_viewers: Some(peak_viewers),
        }
    }
}
