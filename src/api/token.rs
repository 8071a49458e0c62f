use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::services::{generate_hls_token, DEFAULT_TOKEN_VALIDITY_SECS};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/token/hls", get(hls_token))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    #[serde(default = "default_stream")]
    pub stream: String,
}

fn default_stream() -> String {
    "master".to_string()
}

/// Server-side signed playback URL. The secret never leaves this process;
/// viewers only see the derived signature and expiry.
async fn hls_token(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse> {
    let config = state.store.read()?;
    let secret = config
        .auth
        .hls_secret
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("HLS secret not configured")))?;

    let uri = format!("/hls/{}.m3u8", query.stream);
    let token = generate_hls_token(&uri, &secret, DEFAULT_TOKEN_VALIDITY_SECS);

    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(json!({
            "url": format!("{uri}?md5={}&expires={}", token.md5, token.expires),
            "expires": token.expires,
            "expiresIn": DEFAULT_TOKEN_VALIDITY_SECS,
        })),
    ))
}
