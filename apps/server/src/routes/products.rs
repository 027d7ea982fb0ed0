//! # Product Routes
//!
//! Catalog CRUD, stock adjustments, the low-stock list and product photos.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use shopkeep_core::Product;
use shopkeep_db::repository::generate_id;
use shopkeep_db::ProductFilter;

use super::check_image_content_type;
use crate::error::{ApiError, ApiResult};
use crate::extract::{ApiJson, ApiQuery};
use crate::media::PRODUCT_FOLDER;
use crate::AppState;

/// Editable product fields.
///
/// `stock` is only read on create; afterwards it changes through
/// `POST /api/products/{id}/stock`, sales and assemblies.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub cost_cents: i64,
    pub price_cents: i64,
    pub card_price_cents: Option<i64>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub prove_stock: i64,
    /// Defaults to the store's low-stock threshold.
    pub min_stock: Option<i64>,
    #[serde(default)]
    pub is_basket: bool,
    pub is_active: Option<bool>,
}

fn default_unit() -> String {
    "un".to_string()
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    pub delta: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/low-stock", get(low_stock))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/stock", post(adjust_stock))
        .route(
            "/products/{id}/photo",
            get(get_photo).put(put_photo).delete(delete_photo),
        )
}

async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().search(&filter).await?))
}

async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let min_stock = match input.min_stock {
        Some(min) => min,
        None => state.db.settings().profile().await?.low_stock_threshold,
    };
    let now = Utc::now();
    let product = Product {
        id: generate_id(),
        store_id: state.db.store_id().to_string(),
        sku: input.sku,
        barcode: input.barcode,
        name: input.name,
        description: input.description,
        category: input.category,
        unit: input.unit,
        cost_cents: input.cost_cents,
        price_cents: input.price_cents,
        card_price_cents: input.card_price_cents,
        stock: input.stock,
        prove_stock: input.prove_stock,
        min_stock,
        is_basket: input.is_basket,
        photo_path: None,
        is_active: input.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    let created = state.db.products().insert(&product).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn low_stock(State(state): State<AppState>) -> ApiResult<Json<Vec<Product>>> {
    Ok(Json(state.db.products().low_stock().await?))
}

async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().require(&id).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<Json<Product>> {
    let repo = state.db.products();
    let mut product = repo.require(&id).await?;

    product.sku = input.sku;
    product.barcode = input.barcode;
    product.name = input.name;
    product.description = input.description;
    product.category = input.category;
    product.unit = input.unit;
    product.cost_cents = input.cost_cents;
    product.price_cents = input.price_cents;
    product.card_price_cents = input.card_price_cents;
    product.prove_stock = input.prove_stock;
    if let Some(min) = input.min_stock {
        product.min_stock = min;
    }
    if let Some(active) = input.is_active {
        product.is_active = active;
    }
    // A basket stays a basket; the repository keeps its composition prices.
    product.is_basket = product.is_basket || input.is_basket;

    Ok(Json(repo.update(&product).await?))
}

async fn delete_product(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.products().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn adjust_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StockAdjustment>,
) -> ApiResult<Json<Product>> {
    Ok(Json(state.db.products().adjust_stock(&id, body.delta).await?))
}

async fn get_photo(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<impl IntoResponse> {
    let product = state.db.products().require(&id).await?;
    let path = product
        .photo_path
        .ok_or_else(|| ApiError::not_found("Photo", &id))?;
    let (bytes, kind) = state.media.read(&path).await?;
    Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes))
}

/// Stores the request body as the product photo, replacing any previous one.
async fn put_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Product>> {
    check_image_content_type(&headers)?;
    let repo = state.db.products();
    let previous = repo.require(&id).await?.photo_path;

    let path = state.media.save(PRODUCT_FOLDER, &id, &body).await?;
    let product = match repo.set_photo(&id, Some(&path)).await {
        Ok(product) => product,
        Err(e) => {
            let _ = state.media.remove(&path).await;
            return Err(e.into());
        }
    };

    if let Some(old) = previous {
        if let Err(e) = state.media.remove(&old).await {
            warn!(path = %old, "Could not remove replaced photo: {}", e);
        }
    }
    info!(id = %id, path = %path, "Product photo updated");
    Ok(Json(product))
}

async fn delete_photo(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Product>> {
    let repo = state.db.products();
    let previous = repo.require(&id).await?.photo_path;
    let product = repo.set_photo(&id, None).await?;
    if let Some(old) = previous {
        state.media.remove(&old).await?;
    }
    Ok(Json(product))
}
