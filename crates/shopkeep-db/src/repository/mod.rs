//! # Repository Module
//!
//! Database repository implementations for Shopkeep.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP handler                                                          │
//! │       │  db.sales().create(&new_sale, surcharge)                       │
//! │       ▼                                                                 │
//! │  SaleRepository                                                        │
//! │  ├── BEGIN IMMEDIATE                                                   │
//! │  ├── load products, quote cart (shopkeep-core)                         │
//! │  ├── insert sale + items                                               │
//! │  ├── guarded stock decrements                                          │
//! │  └── COMMIT (or ROLLBACK on any error)                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every repository is scoped to one store id, set when the [`Database`]
//! hands it out.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Product CRUD, search, stock adjustments
//! - [`BasketRepository`] - Basket composition, assembly and cancellation
//! - [`SaleRepository`] - Sale capture, listing and cancellation
//! - [`CustomerRepository`] - Customers and purchase history
//! - [`ExpenseRepository`] - Expenses and recurring generation
//! - [`AccountRepository`] - Payables and receivables
//! - [`SettingsRepository`] - Key/value store settings
//!
//! [`Database`]: crate::Database
//! [`ProductRepository`]: product::ProductRepository
//! [`BasketRepository`]: basket::BasketRepository
//! [`SaleRepository`]: sale::SaleRepository
//! [`CustomerRepository`]: customer::CustomerRepository
//! [`ExpenseRepository`]: expense::ExpenseRepository
//! [`AccountRepository`]: account::AccountRepository
//! [`SettingsRepository`]: settings::SettingsRepository

pub mod account;
pub mod basket;
pub mod customer;
pub mod expense;
pub mod product;
pub mod sale;
pub mod settings;

use chrono::{Local, NaiveDate};
use sqlx::{Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::error::DbResult;

/// Generates a new record ID.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Business date in the server's local time zone.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Escapes `%`, `_` and `\` so user text matches literally in `LIKE ... ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Opens a `BEGIN IMMEDIATE` transaction.
///
/// The write lock is taken at BEGIN, so read-then-write transactions wait on
/// `busy_timeout` instead of failing with `SQLITE_BUSY` on lock upgrade.
pub(crate) async fn begin_write(pool: &SqlitePool) -> DbResult<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Default and maximum page sizes for list endpoints.
pub(crate) fn page_limit(limit: Option<u32>) -> i64 {
    i64::from(limit.unwrap_or(100).clamp(1, 500))
}
