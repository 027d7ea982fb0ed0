//! # shopkeep-db: Database Layer for Shopkeep
//!
//! SQLite persistence for the shop, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /api/sales)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   shopkeep-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ products      │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ baskets       │    │ 001_initial_ │  │   │
//! │  │   │ WAL, FKs      │    │ sales         │    │ schema.sql   │  │   │
//! │  │   │               │    │ customers     │    │              │  │   │
//! │  │   │               │    │ expenses      │    │              │  │   │
//! │  │   │               │    │ accounts      │    │              │  │   │
//! │  │   │               │    │ settings      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (platform data dir by default)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per table family
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shopkeep_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/shop.db")).await?;
//! let low = db.products().low_stock().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::account::{AccountFilter, AccountRepository};
pub use repository::basket::{BasketComposition, BasketRepository, ComponentInput};
pub use repository::customer::{CustomerFilter, CustomerRepository};
pub use repository::expense::{ExpenseFilter, ExpenseRepository};
pub use repository::product::{ProductFilter, ProductRepository};
pub use repository::sale::{NewSale, SaleDetail, SaleFilter, SaleLineInput, SaleRepository};
pub use repository::settings::SettingsRepository;
