use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::services::session::SessionManager;

/// Repeated status reads within this window reuse the last successful poll.
pub const VIEWER_CACHE_WINDOW: Duration = Duration::from_secs(2);

/// Upper bound on a single /stat request.
pub const STAT_TIMEOUT: Duration = Duration::from_secs(2);

/// Client count of the live application's active stream in the nginx-rtmp
/// /stat XML.
static LIVE_NCLIENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<application>\s*<name>live</name>.*?<stream>.*?<nclients>(\d+)</nclients>")
        .expect("hardcoded stat pattern is invalid - fix source code")
});

/// Some nginx builds report HLS clients under a separate element.
static HLS_NCLIENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<hls>.*?<nclients>(\d+)</nclients>")
        .expect("hardcoded stat pattern is invalid - fix source code")
});

struct CacheState {
    count: u64,
    last_poll: Option<Instant>,
}

/// Short-lived cache over the nginx-rtmp /stat endpoint.
///
/// A failed or unparsable poll returns the previous value without touching
/// the window guard, so the next caller retries immediately. The internal
/// mutex also serializes concurrent pollers: the second caller observes the
/// refreshed window and takes the cached value.
pub struct ViewerCountCache {
    stat_url: String,
    http: reqwest::Client,
    state: Mutex<CacheState>,
}

impl ViewerCountCache {
    pub fn new(settings: &Settings) -> Self {
        Self::with_stat_url(settings.nginx.stat_url.clone())
    }

    pub fn with_stat_url(stat_url: String) -> Self {
        Self {
            stat_url,
            http: reqwest::Client::builder()
                .timeout(STAT_TIMEOUT)
                .build()
                .unwrap_or_default(),
            state: Mutex::new(CacheState {
                count: 0,
                last_poll: None,
            }),
        }
    }

    pub async fn get_count(&self, session: &SessionManager) -> u64 {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last_poll {
            if last.elapsed() < VIEWER_CACHE_WINDOW {
                return state.count;
            }
        }

        match self.poll().await {
            Ok(count) => {
                state.count = count;
                state.last_poll = Some(Instant::now());
                session.record_viewers(count);
                count
            }
            Err(e) => {
                tracing::debug!("Viewer count poll failed, using cached value: {}", e);
                state.count
            }
        }
    }

    async fn poll(&self) -> anyhow::Result<u64> {
        let body = self
            .http
            .get(&self.stat_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_viewer_count(&body).ok_or_else(|| anyhow::anyhow!("no client count in /stat response"))
    }
}

/// Extract the viewer count from a /stat response, preferring the live
/// application and taking the maximum against a separate HLS count.
pub fn parse_viewer_count(body: &str) -> Option<u64> {
    let live = LIVE_NCLIENTS
        .captures(body)
        .and_then(|caps| caps[1].parse::<u64>().ok());
    let hls = HLS_NCLIENTS
        .captures(body)
        .and_then(|caps| caps[1].parse::<u64>().ok());

    match (live, hls) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::analytics::AnalyticsLog;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const STAT_XML: &str = "\
<rtmp><server><application><name>live</name><live>\
<stream><name>stream</name><nclients>7</nclients></stream>\
</live></application></server></rtmp>";

    fn test_session(dir: &tempfile::TempDir) -> SessionManager {
        SessionManager::load_from(
            dir.path().join("session.json"),
            AnalyticsLog::at(dir.path().join("analytics.json")),
        )
    }

    /// Spawn a throwaway stat endpoint that counts hits.
    async fn spawn_stat_server(response: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_handler = hits.clone();
        let app = axum::Router::new().route(
            "/stat",
            axum::routing::get(move || {
                let hits = hits_handler.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    response
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/stat"), hits)
    }

    #[test]
    fn test_parse_prefers_live_application() {
        assert_eq!(parse_viewer_count(STAT_XML), Some(7));
    }

    #[test]
    fn test_parse_takes_max_with_hls_count() {
        let body = format!("{STAT_XML}<hls><nclients>12</nclients></hls>");
        assert_eq!(parse_viewer_count(&body), Some(12));
        let body = format!("{STAT_XML}<hls><nclients>3</nclients></hls>");
        assert_eq!(parse_viewer_count(&body), Some(7));
    }

    #[test]
    fn test_parse_without_counts_is_none() {
        assert_eq!(parse_viewer_count("<rtmp></rtmp>"), None);
    }

    #[tokio::test]
    async fn test_calls_within_window_poll_once() {
        let dir = tempfile::tempdir().unwrap();
        let session = test_session(&dir);
        let (url, hits) = spawn_stat_server(STAT_XML).await;
        let cache = ViewerCountCache::with_stat_url(url);

        assert_eq!(cache.get_count(&session).await, 7);
        assert_eq!(cache.get_count(&session).await, 7);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_cache_and_retries_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let session = test_session(&dir);
        let (url, hits) = spawn_stat_server("<rtmp>no counts</rtmp>").await;
        let cache = ViewerCountCache::with_stat_url(url);

        // Both calls poll: the parse failure must not arm the window guard.
        assert_eq!(cache.get_count(&session).await, 0);
        assert_eq!(cache.get_count(&session).await, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_returns_cached_value() {
        let dir = tempfile::tempdir().unwrap();
        let session = test_session(&dir);
        let cache = ViewerCountCache::with_stat_url("http://127.0.0.1:1/stat".to_string());
        assert_eq!(cache.get_count(&session).await, 0);
    }

    #[tokio::test]
    async fn test_successful_poll_updates_live_session_peak() {
        let dir = tempfile::tempdir().unwrap();
        let session = test_session(&dir);
        session.on_publish_start("alice");

        let (url, _) = spawn_stat_server(STAT_XML).await;
        let cache = ViewerCountCache::with_stat_url(url);
        assert_eq!(cache.get_count(&session).await, 7);
        assert_eq!(session.snapshot().peak_viewers, 7);
    }
}
