//! # Expense Routes
//!
//! A recurring expense is the template of its series. Occurrences are
//! created by `POST /api/expenses/recurring` (idempotent) and by the seed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use shopkeep_core::{Expense, Recurrence};
use shopkeep_db::repository::{generate_id, today};
use shopkeep_db::ExpenseFilter;

use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiQuery};
use crate::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseInput {
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub paid_on: Option<NaiveDate>,
    #[serde(default)]
    pub recurrence: Recurrence,
    pub recurrence_end: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// `?date=YYYY-MM-DD`, defaulting to today.
#[derive(Debug, Default, Deserialize)]
pub struct DateParam {
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecurringParams {
    /// Generate occurrences due up to this date. Defaults to today.
    pub until: Option<NaiveDate>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/expenses", get(list_expenses).post(create_expense))
        .route("/expenses/recurring", post(generate_recurring))
        .route(
            "/expenses/{id}",
            get(get_expense).put(update_expense).delete(delete_expense),
        )
        .route("/expenses/{id}/pay", post(pay_expense))
}

async fn list_expenses(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ExpenseFilter>,
) -> ApiResult<Json<Vec<Expense>>> {
    Ok(Json(state.db.expenses().list(&filter).await?))
}

async fn create_expense(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ExpenseInput>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let now = Utc::now();
    let expense = Expense {
        id: generate_id(),
        store_id: state.db.store_id().to_string(),
        description: input.description,
        category: input.category,
        amount_cents: input.amount_cents,
        due_date: input.due_date,
        paid_on: input.paid_on,
        recurrence: input.recurrence,
        recurrence_end: input.recurrence_end,
        series_id: None,
        notes: input.notes,
        created_at: now,
        updated_at: now,
    };
    let created = state.db.expenses().insert(&expense).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn get_expense(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Expense>> {
    Ok(Json(state.db.expenses().require(&id).await?))
}

async fn update_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<ExpenseInput>,
) -> ApiResult<Json<Expense>> {
    let repo = state.db.expenses();
    let mut expense = repo.require(&id).await?;
    expense.description = input.description;
    expense.category = input.category;
    expense.amount_cents = input.amount_cents;
    expense.due_date = input.due_date;
    expense.paid_on = input.paid_on;
    expense.recurrence = input.recurrence;
    expense.recurrence_end = input.recurrence_end;
    expense.notes = input.notes;
    Ok(Json(repo.update(&expense).await?))
}

async fn delete_expense(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    state.db.expenses().delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn pay_expense(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<DateParam>,
) -> ApiResult<Json<Expense>> {
    let paid_on = params.date.unwrap_or_else(today);
    Ok(Json(state.db.expenses().pay(&id, paid_on).await?))
}

/// Returns the occurrences created by this call.
async fn generate_recurring(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<RecurringParams>,
) -> ApiResult<Json<Vec<Expense>>> {
    let until = params.until.unwrap_or_else(today);
    Ok(Json(state.db.expenses().generate_recurring(until).await?))
}
