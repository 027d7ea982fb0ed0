//! # Label Route
//!
//! Renders a printable A4 sheet of price labels as PDF.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use tracing::info;

use shopkeep_core::labels::{render_labels, LabelItem, LabelLayout};
use shopkeep_core::Product;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LabelRequestItem {
    pub product_id: String,
    #[serde(default = "one")]
    pub copies: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct LabelRequest {
    pub items: Vec<LabelRequestItem>,
    /// Overrides the layout saved in the settings.
    pub layout: Option<LabelLayout>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/labels", post(labels))
}

fn label_for(product: &Product, copies: u32) -> LabelItem {
    LabelItem {
        name: product.name.clone(),
        price: product.price(),
        code: product.barcode.clone().unwrap_or_else(|| product.sku.clone()),
        unit: product.unit.clone(),
        copies,
    }
}

async fn labels(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LabelRequest>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.db.settings().profile().await?;
    let layout = body.layout.unwrap_or(profile.label_layout);

    let ids: Vec<String> = body.items.iter().map(|i| i.product_id.clone()).collect();
    let products: HashMap<String, Product> = state
        .db
        .products()
        .get_many(&ids)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    let items = body
        .items
        .iter()
        .map(|item| {
            products
                .get(&item.product_id)
                .map(|p| label_for(p, item.copies))
                .ok_or_else(|| ApiError::not_found("Product", &item.product_id))
        })
        .collect::<ApiResult<Vec<_>>>()?;

    let store_name = layout.show_store_name.then_some(profile.name.as_str());
    let pdf = render_labels(&layout, &items, &profile.currency, store_name)?;

    info!(labels = items.iter().map(|i| i.copies).sum::<u32>(), bytes = pdf.len(), "Label sheet rendered");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf"),
            (header::CONTENT_DISPOSITION, "inline; filename=\"etiquetas.pdf\""),
        ],
        pdf,
    ))
}
