use axum::extract::State;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use shopkeep_db::repository::today;

use crate::digest::{build_digest, send_digest};
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DigestParams {
    /// Day summarized; defaults to today.
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct DigestSent {
    pub date: NaiveDate,
    pub recipients: Vec<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/digest/preview", get(preview))
        .route("/digest/send", post(send))
}

/// The email body exactly as it would be sent.
async fn preview(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DigestParams>,
) -> ApiResult<Html<String>> {
    let day = params.date.unwrap_or_else(today);
    let data = build_digest(&state.db, day).await?;
    let currency = state.db.settings().profile().await?.currency;
    Ok(Html(data.render_html(&currency)))
}

async fn send(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DigestParams>,
) -> ApiResult<Json<DigestSent>> {
    let date = params.date.unwrap_or_else(today);
    let recipients = send_digest(&state, date).await?;
    Ok(Json(DigestSent { date, recipients }))
}
