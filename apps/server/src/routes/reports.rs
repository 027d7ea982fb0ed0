//! # Report Routes
//!
//! The dashboard is computed from raw rows by
//! [`build_dashboard`](shopkeep_core::report::build_dashboard); nothing is
//! pre-aggregated in the database.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use shopkeep_core::report::{build_dashboard, Dashboard};
use shopkeep_core::DateRange;
use shopkeep_db::repository::today;
use shopkeep_db::{Database, DbResult};

use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::AppState;

/// Days covered when `from` is omitted.
pub const DEFAULT_SPAN_DAYS: i64 = 30;

#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DashboardParams {
    /// `to` defaults to today and `from` to the 30 days ending at `to`.
    pub fn range(&self, today: NaiveDate) -> Result<DateRange, shopkeep_core::CoreError> {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_SPAN_DAYS - 1));
        DateRange::new(from, to)
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/reports/dashboard", get(dashboard))
}

/// Loads the rows of `range` and aggregates them.
pub async fn load_dashboard(db: &Database, range: DateRange) -> DbResult<Dashboard> {
    debug!(from = %range.from, to = %range.to, "Building dashboard");
    let (sales, items) = db.sales().in_range(&range).await?;
    let expenses = db.expenses().in_range(&range).await?;
    Ok(build_dashboard(range, &sales, &items, &expenses))
}

async fn dashboard(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<DashboardParams>,
) -> ApiResult<Json<Dashboard>> {
    let range = params.range(today())?;
    Ok(Json(load_dashboard(&state.db, range).await?))
}
