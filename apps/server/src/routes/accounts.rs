//! # Account Routes
//!
//! Payables and receivables. Every account is returned as an
//! [`AccountView`] carrying its status as of today.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use shopkeep_core::accounts::{AccountView, AccountsSummary};
use shopkeep_core::{Account, AccountKind};
use shopkeep_db::repository::{generate_id, today};
use shopkeep_db::AccountFilter;

use super::expenses::DateParam;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountInput {
    pub kind: AccountKind,
    pub counterparty: String,
    pub description: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub settled_on: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts).post(create_account))
        .route("/accounts/summary", get(summary))
        .route(
            "/accounts/{id}",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/accounts/{id}/settle", post(settle_account))
}

async fn list_accounts(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<AccountFilter>,
) -> ApiResult<Json<Vec<AccountView>>> {
    let today = today();
    let accounts = state.db.accounts().list(&filter, today).await?;
    Ok(Json(accounts.into_iter().map(|a| AccountView::new(a, today)).collect()))
}

async fn summary(State(state): State<AppState>) -> ApiResult<Json<AccountsSummary>> {
    Ok(Json(state.db.accounts().summary(today()).await?))
}

async fn create_account(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AccountInput>,
) -> ApiResult<(StatusCode, Json<AccountView>)> {
    let now = Utc::now();
    let account = Account {
        id: generate_id(),
        store_id: state.db.store_id().to_string(),
        kind: input.kind,
        counterparty: input.counterparty,
        description: input.description,
        amount_cents: input.amount_cents,
        due_date: input.due_date,
        settled_on: input.settled_on,
        customer_id: input.customer_id,
        notes: input.notes,
        created_at: now,
        updated_at: now,
    };
    let created = state.db.accounts().insert(&account).await?;
    Ok((StatusCode::CREATED, Json(AccountView::new(created, today()))))
}

async fn get_account(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<AccountView>> {
    let account = state.db.accounts().require(&id).await?;
    Ok(Json(AccountView::new(account, today())))
}

async fn update_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<AccountInput>,
) -> ApiResult<Json<AccountView>> {
    let repo = state.db.accounts();
    let mut account = repo.require(&id).await?;
    account.kind = input.kind;
    account.counterparty = input.counterparty;
    account.description = input.description;
    account.amount_cents = input.amount_cents;
    account.due_date = input.due_date;
    account.settled_on = input.settled_on;
    account.customer_id = input.customer_id;
    account.notes = input.notes;
    let updated = repo.update(&account).await?;
    Ok(Json(AccountView::new(updated, today())))
}

async fn delete_account(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.accounts().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn settle_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<DateParam>,
) -> ApiResult<Json<AccountView>> {
    let today = today();
    let account = state
        .db
        .accounts()
        .settle(&id, params.date.unwrap_or(today))
        .await?;
    Ok(Json(AccountView::new(account, today)))
}
