//! # Settings Routes
//!
//! Store profile, the store logo and free-form `ui.*` client preferences.
//! Preference values are arbitrary JSON, persisted as their JSON text.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::{info, warn};

use shopkeep_core::settings::StoreProfile;

use super::check_image_content_type;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::media::LOGO_FOLDER;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings", get(get_profile).put(put_profile))
        .route("/settings/preferences/{key}", get(get_preference).put(put_preference))
        .route("/settings/logo", get(get_logo).put(put_logo).delete(delete_logo))
}

async fn get_profile(State(state): State<AppState>) -> ApiResult<Json<StoreProfile>> {
    Ok(Json(state.db.settings().profile().await?))
}

/// Saves the profile. `logo_path` in the body is ignored.
async fn put_profile(
    State(state): State<AppState>,
    ApiJson(profile): ApiJson<StoreProfile>,
) -> ApiResult<Json<StoreProfile>> {
    Ok(Json(state.db.settings().save_profile(&profile).await?))
}

async fn get_preference(State(state): State<AppState>, Path(key): Path<String>) -> ApiResult<Json<Value>> {
    let raw = state
        .db
        .settings()
        .preference(&key)
        .await?
        .ok_or_else(|| ApiError::not_found("Preference", &key))?;
    // Values written outside the API may not be JSON; serve them as strings.
    let value = serde_json::from_str(&raw).unwrap_or(Value::String(raw));
    Ok(Json(value))
}

async fn put_preference(
    State(state): State<AppState>,
    Path(key): Path<String>,
    ApiJson(value): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    state.db.settings().set_preference(&key, &value.to_string()).await?;
    Ok(Json(value))
}

async fn get_logo(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let path = state
        .db
        .settings()
        .profile()
        .await?
        .logo_path
        .ok_or_else(|| ApiError::not_found("Logo", "store"))?;
    let (bytes, kind) = state.media.read(&path).await?;
    Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes))
}

async fn put_logo(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<StoreProfile>> {
    check_image_content_type(&headers)?;
    let settings = state.db.settings();
    let previous = settings.profile().await?.logo_path;

    let path = state.media.save(LOGO_FOLDER, "logo", &body).await?;
    if let Err(e) = settings.set_logo_path(Some(&path)).await {
        let _ = state.media.remove(&path).await;
        return Err(e.into());
    }

    if let Some(old) = previous {
        if let Err(e) = state.media.remove(&old).await {
            warn!(path = %old, "Could not remove replaced logo: {}", e);
        }
    }
    info!(path = %path, "Store logo updated");
    Ok(Json(settings.profile().await?))
}

async fn delete_logo(State(state): State<AppState>) -> ApiResult<StatusCode> {
    let settings = state.db.settings();
    if let Some(old) = settings.profile().await?.logo_path {
        settings.set_logo_path(None).await?;
        state.media.remove(&old).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
