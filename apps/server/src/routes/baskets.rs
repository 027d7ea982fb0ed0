//! # Basket Routes
//!
//! Composition, pricing quotes and assemblies of basket products.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use shopkeep_core::cart::Discount;
use shopkeep_core::{BasketAssembly, BasketAssemblyItem};
use shopkeep_db::{BasketComposition, ComponentInput};

use crate::error::ApiResult;
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CompositionRequest {
    pub components: Vec<ComponentInput>,
    #[serde(default)]
    pub discount: Discount,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    /// Omitted: price the saved composition.
    pub components: Option<Vec<ComponentInput>>,
    #[serde(default)]
    pub discount: Discount,
}

#[derive(Debug, Deserialize)]
pub struct AssembleRequest {
    pub quantity: i64,
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/baskets/{id}/components", get(get_composition).put(set_composition))
        .route("/baskets/{id}/quote", post(quote))
        .route("/baskets/{id}/assemble", post(assemble))
        .route("/baskets/{id}/assemblies", get(assemblies))
        .route("/baskets/assemblies/{id}/items", get(assembly_items))
        .route("/baskets/assemblies/{id}/cancel", post(cancel_assembly))
}

async fn get_composition(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BasketComposition>> {
    Ok(Json(state.db.baskets().composition(&id).await?))
}

/// Replaces the composition; the basket's cost and price are recomputed.
async fn set_composition(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<CompositionRequest>,
) -> ApiResult<Json<BasketComposition>> {
    let composition = state
        .db
        .baskets()
        .set_components(&id, &body.components, &body.discount)
        .await?;
    Ok(Json(composition))
}

async fn quote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<QuoteRequest>,
) -> ApiResult<Json<BasketComposition>> {
    let composition = state
        .db
        .baskets()
        .quote(&id, body.components.as_deref(), &body.discount)
        .await?;
    Ok(Json(composition))
}

async fn assemble(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<AssembleRequest>,
) -> ApiResult<(StatusCode, Json<BasketAssembly>)> {
    let assembly = state.db.baskets().assemble(&id, body.quantity, body.notes).await?;
    Ok((StatusCode::CREATED, Json(assembly)))
}

async fn assemblies(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<BasketAssembly>>> {
    Ok(Json(state.db.baskets().assemblies(&id).await?))
}

/// Component quantities taken by an assembly; cancelling returns exactly these.
async fn assembly_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<BasketAssemblyItem>>> {
    Ok(Json(state.db.baskets().assembly_items(&id).await?))
}

async fn cancel_assembly(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BasketAssembly>> {
    Ok(Json(state.db.baskets().cancel_assembly(&id).await?))
}
