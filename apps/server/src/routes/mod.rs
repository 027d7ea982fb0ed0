//! # HTTP Routes
//!
//! One module per resource; each exposes `router()` and the handlers it
//! mounts. All JSON bodies are parsed through [`ApiJson`](crate::extract::ApiJson)
//! so malformed input produces the same error shape as business failures.
//!
//! ```text
//! /health
//! /api/products      /api/baskets     /api/sales      /api/customers
//! /api/expenses      /api/accounts    /api/reports    /api/settings
//! /api/labels        /api/digest
//! ```

pub mod accounts;
pub mod baskets;
pub mod customers;
pub mod digest;
pub mod expenses;
pub mod health;
pub mod labels;
pub mod products;
pub mod reports;
pub mod sales;
pub mod settings;

use axum::http::header;
use axum::http::HeaderMap;
use axum::Router;

use crate::error::ApiError;
use crate::media::MediaError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest(
            "/api",
            Router::new()
                .merge(products::router())
                .merge(baskets::router())
                .merge(sales::router())
                .merge(customers::router())
                .merge(expenses::router())
                .merge(accounts::router())
                .merge(reports::router())
                .merge(settings::router())
                .merge(labels::router())
                .merge(digest::router()),
        )
}

/// Rejects uploads whose declared type is not an accepted image.
///
/// A missing header is allowed; the file signature is checked when stored.
pub(crate) fn check_image_content_type(headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(value) = headers.get(header::CONTENT_TYPE) else {
        return Ok(());
    };
    let declared = value.to_str().unwrap_or_default();
    let essence = declared.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/png" | "image/jpeg" | "image/webp" | "application/octet-stream" => Ok(()),
        _ => Err(MediaError::UnsupportedType(declared.to_string()).into()),
    }
}
