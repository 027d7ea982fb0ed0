//! # shopkeep-core: Pure Business Logic for Shopkeep
//!
//! This crate contains all retail business rules as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Shopkeep Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Frontend                                 │   │
//! │  │    Catalog ──► Cart ──► Checkout ──► Dashboard                  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ shopkeep-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  types · money · basket · cart · recurrence · accounts          │   │
//! │  │  report · labels · digest · validation                          │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  shopkeep-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Product, Sale, Expense, Account, ...)
//! - [`money`] - Integer cents and currency formatting
//! - [`basket`] - Basket/combo pricing and stock composition
//! - [`cart`] - Cart lines, price selection, discounts, sale quotes
//! - [`recurrence`] - Recurring expense date generation
//! - [`accounts`] - Payable/receivable status and summaries
//! - [`report`] - Dashboard aggregation over a date range
//! - [`labels`] - Label sheet layout and PDF rendering
//! - [`digest`] - Daily digest HTML rendering
//! - [`settings`] - Typed view over key/value store settings
//! - [`validation`] - Field validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use shopkeep_core::money::Money;
//!
//! let price = Money::from_cents(1099);
//! let line = price.multiply_quantity(3);
//! assert_eq!(line.cents(), 3297);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod accounts;
pub mod basket;
pub mod cart;
pub mod digest;
pub mod error;
pub mod labels;
pub mod money;
pub mod recurrence;
pub mod report;
pub mod settings;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{CurrencyFormat, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default store ID (single-store runtime with a multi-store schema).
pub const DEFAULT_STORE_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single line in a cart.
///
/// Prevents accidental over-ordering (typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest stock level any product may hold.
pub const MAX_STOCK: i64 = 1_000_000_000;

/// Largest single manual stock adjustment, in either direction.
pub const MAX_STOCK_DELTA: i64 = 1_000_000;

/// Maximum number of components in a basket composition.
pub const MAX_BASKET_COMPONENTS: usize = 50;

/// Longest date range a report may cover, in days.
pub const MAX_REPORT_SPAN_DAYS: i64 = 366;
