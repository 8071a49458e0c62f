use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, Result};
use crate::AppState;

/// Admin-key gate for configuration routes. The key comes from the
/// `x-admin-key` header or the `adminKey` query parameter and is checked
/// against `ADMIN_API_KEY` in the environment or the stored configuration.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let config = state.store.read()?;
    let admin_key = config
        .admin_key()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Admin API key not configured")))?;

    let provided = request
        .headers()
        .get("x-admin-key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            request
                .uri()
                .query()
                .and_then(|q| query_param(q, "adminKey"))
        });

    match provided {
        Some(key) if key == admin_key => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}

fn query_param(query: &str, name: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}
