use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json, Router,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{HlsProfile, Platform, StreamConfig, StreamUser};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/config", get(get_config))
        .route("/platforms", post(update_platforms))
        .route("/hls", post(update_hls))
        .route("/auth", post(update_auth))
        .route("/auth/user", post(add_user))
        .route("/auth/user/:username", delete(delete_user))
        .route("/key/rotate", post(rotate_key))
        .route("/apply", post(apply))
        .route("/reload", post(reload))
}

async fn get_config(State(state): State<AppState>) -> Result<Json<StreamConfig>> {
    Ok(Json(state.store.read()?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlatformsRequest {
    pub platforms: Option<Vec<Platform>>,
    pub custom_platforms: Option<Vec<Platform>>,
}

async fn update_platforms(
    State(state): State<AppState>,
    Json(payload): Json<UpdatePlatformsRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut config = state.store.read()?;
    if let Some(platforms) = payload.platforms {
        config.platforms = platforms;
    }
    if let Some(custom) = payload.custom_platforms {
        config.custom_platforms = custom;
    }
    state.store.write(&config)?;
    Ok(Json(json!({ "success": true, "message": "Platforms updated" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateHlsRequest {
    pub fragment_duration: Option<u32>,
    pub playlist_length: Option<u32>,
    pub cleanup: Option<bool>,
    pub profile: Option<String>,
}

async fn update_hls(
    State(state): State<AppState>,
    Json(payload): Json<UpdateHlsRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut config = state.store.read()?;
    if let Some(fragment_duration) = payload.fragment_duration {
        config.hls.fragment_duration = fragment_duration;
    }
    if let Some(playlist_length) = payload.playlist_length {
        config.hls.playlist_length = playlist_length;
    }
    if let Some(cleanup) = payload.cleanup {
        config.hls.cleanup = cleanup;
    }
    if let Some(profile) = payload.profile {
        let profile = HlsProfile::parse(&profile)
            .ok_or_else(|| AppError::Validation(format!("Invalid HLS profile: {profile}")))?;
        config.hls.profile = profile.as_str().to_string();
    }
    state.store.write(&config)?;
    Ok(Json(json!({ "success": true, "message": "HLS settings updated" })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAuthRequest {
    pub users: Option<Vec<StreamUser>>,
    pub hls_secret: Option<String>,
}

async fn update_auth(
    State(state): State<AppState>,
    Json(payload): Json<UpdateAuthRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut config = state.store.read()?;
    if let Some(users) = payload.users {
        config.auth.users = users;
    }
    if let Some(secret) = payload.hls_secret {
        // The nginx directive is the verifier; update it before the stored
        // copy so a failed rewrite leaves both sides on the old secret.
        state.synchronizer.sync_secret(&secret)?;
        config.auth.hls_secret = Some(secret);
    }
    state.store.write(&config)?;
    Ok(Json(json!({ "success": true, "message": "Auth settings updated" })))
}

#[derive(Debug, Deserialize)]
pub struct UserRequest {
    pub username: String,
}

async fn add_user(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<serde_json::Value>> {
    if payload.username.is_empty() {
        return Err(AppError::Validation("Username required".to_string()));
    }

    let mut config = state.store.read()?;
    if config
        .auth
        .users
        .iter()
        .any(|u| u.username == payload.username)
    {
        return Err(AppError::Validation("Username already exists".to_string()));
    }

    let user = StreamUser {
        username: payload.username,
        key: generate_stream_key(16),
    };
    config.auth.users.push(user.clone());
    state.store.write(&config)?;

    Ok(Json(json!({ "success": true, "user": user, "message": "User added" })))
}

async fn delete_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let mut config = state.store.read()?;
    let index = config
        .auth
        .users
        .iter()
        .position(|u| u.username == username)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if config.auth.users.len() == 1 {
        return Err(AppError::Validation("Cannot delete the last user".to_string()));
    }

    config.auth.users.remove(index);
    state.store.write(&config)?;
    Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

async fn rotate_key(
    State(state): State<AppState>,
    Json(payload): Json<UserRequest>,
) -> Result<Json<serde_json::Value>> {
    let mut config = state.store.read()?;
    let user = config
        .auth
        .users
        .iter_mut()
        .find(|u| u.username == payload.username)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let new_key = generate_stream_key(16);
    user.key = new_key.clone();
    state.store.write(&config)?;

    Ok(Json(json!({ "success": true, "newKey": new_key, "message": "Stream key rotated" })))
}

/// Synchronize every managed region into nginx.conf, then reload nginx.
/// A failure partway leaves earlier regions applied; the caller re-applies
/// after fixing the cause.
async fn apply(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    let config = state.store.read()?;
    state.synchronizer.apply_all(&config)?;
    state.reloader.reload().await?;
    Ok(Json(json!({ "success": true, "message": "Configuration applied" })))
}

async fn reload(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    state.reloader.reload().await?;
    Ok(Json(json!({ "success": true, "message": "nginx reloaded successfully" })))
}

fn generate_stream_key(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_alphanumeric() {
        let key = generate_stream_key(16);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(key, generate_stream_key(16));
    }
}
