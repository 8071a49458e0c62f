use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    routing::any,
    Form, Json, RequestExt, Router,
};
use serde::Deserialize;

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/callback/on_publish", any(on_publish))
        .route("/callback/on_done", any(on_done))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackPayload {
    pub user: Option<String>,
    pub pass: Option<String>,
    pub name: Option<String>,
    pub app: Option<String>,
}

/// nginx-rtmp notify directives post these urlencoded, but the callbacks can
/// also be wired through proxies that re-encode as JSON, or configured with
/// everything in the query string. Accept all three; an unreadable body
/// degrades to an empty payload, which fails authentication.
async fn extract_payload(request: Request) -> CallbackPayload {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("application/json"))
        .unwrap_or(false);

    if is_json {
        match request.extract::<Json<CallbackPayload>, _>().await {
            Ok(Json(payload)) => payload,
            Err(_) => CallbackPayload::default(),
        }
    } else {
        // Form reads the query string on GET and the urlencoded body otherwise.
        match request.extract::<Form<CallbackPayload>, _>().await {
            Ok(Form(payload)) => payload,
            Err(_) => CallbackPayload::default(),
        }
    }
}

/// Publish attempt. Credentials are checked here, before the session state
/// machine ever sees the event; a mismatch is a 403 and nothing mutates.
async fn on_publish(
    State(state): State<AppState>,
    request: Request,
) -> (StatusCode, &'static str) {
    let payload = extract_payload(request).await;
    tracing::info!(
        app = payload.app.as_deref().unwrap_or(""),
        name = payload.name.as_deref().unwrap_or(""),
        user = payload.user.as_deref().unwrap_or(""),
        "on_publish attempt"
    );

    let Ok(config) = state.store.read() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "Config error");
    };

    let authorized = match (&payload.user, &payload.pass) {
        (Some(user), Some(pass)) => config
            .auth
            .users
            .iter()
            .any(|u| &u.username == user && &u.key == pass),
        _ => false,
    };
    if !authorized {
        tracing::warn!(
            user = payload.user.as_deref().unwrap_or(""),
            "Publish auth failed"
        );
        return (StatusCode::FORBIDDEN, "Unauthorized");
    }

    // Checked above: authorized implies user is present.
    if let Some(user) = &payload.user {
        state.session.on_publish_start(user);
    }
    (StatusCode::OK, "OK")
}

/// Publish ended. Always 200; stopping while not live is a no-op.
async fn on_done(State(state): State<AppState>, request: Request) -> (StatusCode, &'static str) {
    let payload = extract_payload(request).await;
    tracing::info!(
        app = payload.app.as_deref().unwrap_or(""),
        name = payload.name.as_deref().unwrap_or(""),
        "on_done"
    );
    state.session.on_publish_stop();
    (StatusCode::OK, "OK")
}
