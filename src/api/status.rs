use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use crate::error::Result;
use crate::models::AnalyticsEvent;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/stream/status", get(stream_status))
        .route("/health", get(health))
        .route("/analytics", get(analytics))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub is_live: bool,
    pub start_time: Option<i64>,
    pub uptime: u64,
    pub viewers: u64,
    pub peak_viewers: u64,
    pub publisher: Option<String>,
    pub server_time: i64,
}

/// Public broadcast status. Reading it applies the passive expiry check and
/// refreshes the viewer count through the cache.
async fn stream_status(State(state): State<AppState>) -> impl IntoResponse {
    // Poll before snapshotting: a successful poll can raise the session's
    // recorded peak, and the snapshot below must already include it.
    let viewers = state.viewers.get_count(&state.session).await;
    let now = chrono::Utc::now().timestamp_millis();
    let session = state.session.snapshot_at(now);

    let status = StreamStatus {
        is_live: session.is_live,
        start_time: session.start_time,
        uptime: session.uptime_seconds(now),
        viewers,
        peak_viewers: session.peak_viewers,
        publisher: session.publisher,
        server_time: now,
    };

    (
        [
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(status),
    )
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime": state.started_at.elapsed().as_secs(),
        "streamLive": state.session.is_live(),
    }))
}

async fn analytics(State(state): State<AppState>) -> Result<Json<Vec<AnalyticsEvent>>> {
    Ok(Json(state.analytics.recent(100)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::state_with_stat_url;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    const STAT_XML: &str = "\
<rtmp><server><application><name>live</name><live>\
<stream><name>stream</name><nclients>7</nclients></stream>\
</live></application></server></rtmp>";

    async fn spawn_stat_server() -> String {
        let app = axum::Router::new()
            .route("/stat", axum::routing::get(|| async { STAT_XML }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/stat")
    }

    async fn get_status(state: crate::AppState) -> serde_json::Value {
        let app = routes().with_state(state);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/stream/status")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-store, no-cache, must-revalidate"
        );
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_first_status_read_reports_polled_peak() {
        let dir = tempfile::tempdir().unwrap();
        let stat_url = spawn_stat_server().await;
        let state = state_with_stat_url(&dir, &stat_url);
        state.session.on_publish_start("alice");

        // The very first read polls 7 viewers; the peak raised by that poll
        // must appear in the same response, not one read later.
        let status = get_status(state).await;
        assert_eq!(status["isLive"], true);
        assert_eq!(status["viewers"], 7);
        assert_eq!(status["peakViewers"], 7);
    }

    #[tokio::test]
    async fn test_status_while_idle() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with_stat_url(&dir, "http://127.0.0.1:1/stat");

        let status = get_status(state).await;
        assert_eq!(status["isLive"], false);
        assert_eq!(status["viewers"], 0);
        assert_eq!(status["uptime"], 0);
        assert_eq!(status["startTime"], serde_json::Value::Null);
    }
}
