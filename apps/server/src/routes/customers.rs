use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use shopkeep_core::{Customer, Sale};
use shopkeep_db::repository::generate_id;
use shopkeep_db::CustomerFilter;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerInput {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub document: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_active: Option<bool>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer).put(update_customer).delete(delete_customer),
        )
        .route("/customers/{id}/history", get(history))
}

async fn list_customers(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<CustomerFilter>,
) -> ApiResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.customers().list(&filter).await?))
}

async fn create_customer(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let now = Utc::now();
    let customer = Customer {
        id: generate_id(),
        store_id: state.db.store_id().to_string(),
        name: input.name,
        phone: input.phone,
        email: input.email,
        document: input.document,
        address: input.address,
        notes: input.notes,
        is_active: input.is_active.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    let created = state.db.customers().insert(&customer).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_customer(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Customer>> {
    Ok(Json(state.db.customers().require(&id).await?))
}

async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<CustomerInput>,
) -> ApiResult<Json<Customer>> {
    let repo = state.db.customers();
    let mut customer = repo.require(&id).await?;
    customer.name = input.name;
    customer.phone = input.phone;
    customer.email = input.email;
    customer.document = input.document;
    customer.address = input.address;
    customer.notes = input.notes;
    if let Some(active) = input.is_active {
        customer.is_active = active;
    }
    Ok(Json(repo.update(&customer).await?))
}

async fn delete_customer(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.customers().soft_delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Purchase history, newest first.
async fn history(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<Sale>>> {
    Ok(Json(state.db.customers().history(&id).await?))
}
