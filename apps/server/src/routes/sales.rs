//! # Sale Routes
//!
//! Point-of-sale capture. Card prices fall back to the store surcharge
//! configured in the settings.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use shopkeep_core::cart::{Discount, QuoteOptions, SaleQuote};
use shopkeep_core::{PaymentMethod, RecordType, Sale};
use shopkeep_db::{NewSale, SaleDetail, SaleFilter, SaleLineInput};

use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub lines: Vec<SaleLineInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default)]
    pub discount: Discount,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sales", get(list_sales).post(create_sale))
        .route("/sales/quote", post(quote))
        .route("/sales/{id}", get(get_sale))
        .route("/sales/{id}/cancel", post(cancel_sale))
}

async fn card_surcharge_bps(state: &AppState) -> ApiResult<u32> {
    Ok(state.db.settings().profile().await?.card_surcharge_bps)
}

async fn quote(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<QuoteRequest>,
) -> ApiResult<Json<SaleQuote>> {
    let options = QuoteOptions {
        payment_method: body.payment_method,
        record_type: body.record_type,
        discount: body.discount,
        card_surcharge_bps: card_surcharge_bps(&state).await?,
    };
    Ok(Json(state.db.sales().quote(&body.lines, &options).await?))
}

async fn create_sale(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<NewSale>,
) -> ApiResult<(StatusCode, Json<SaleDetail>)> {
    let surcharge = card_surcharge_bps(&state).await?;
    let sale = state.db.sales().create(&body, surcharge).await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

async fn list_sales(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<SaleFilter>,
) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.sales().list(&filter).await?))
}

async fn get_sale(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SaleDetail>> {
    state
        .db
        .sales()
        .get(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

/// Cancels a completed sale and puts its stock back.
async fn cancel_sale(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<SaleDetail>> {
    Ok(Json(state.db.sales().cancel(&id).await?))
}
