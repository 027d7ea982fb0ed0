//! # Validation Module
//!
//! Input validation for form fields coming from the web client.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend form                                                │
//! │  ├── Basic format checks, immediate feedback                           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Server handler (Rust)                                        │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── THIS MODULE: field and business rule validation                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / UNIQUE / FOREIGN KEY                                   │
//! │  └── CHECK (stock >= 0, prove_stock <= stock)                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use shopkeep_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("CESTA-P").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::types::{Account, Customer, Expense, Product, Recurrence};
use crate::{MAX_ITEM_QUANTITY, MAX_STOCK, MAX_STOCK_DELTA};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: 1-50 characters of letters, digits, `-` and `_`.
///
/// ```rust
/// use shopkeep_core::validation::validate_sku;
///
/// assert!(validate_sku("CESTA-P").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
    }

    if sku.chars().count() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::invalid_format(
            "sku",
            "must contain only letters, numbers, hyphens, and underscores",
        ));
    }

    Ok(())
}

/// Validates a required free-text field with a maximum length.
pub fn validate_required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    validate_optional_text(field, Some(value), max)
}

/// Validates an optional free-text field's length.
pub fn validate_optional_text(field: &str, value: Option<&str>, max: usize) -> ValidationResult<()> {
    match value {
        Some(v) if v.trim().chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_required_text("name", name, 200)
}

/// Validates a search query (may be empty, at most 100 characters).
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();
    validate_optional_text("query", Some(query), 100)?;
    Ok(query.to_string())
}

/// Validates an email address shape: one `@`, non-empty local part, dotted domain.
///
/// ```rust
/// use shopkeep_core::validation::validate_email;
///
/// assert!(validate_email("ana@loja.com.br").is_ok());
/// assert!(validate_email("ana@loja").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = || ValidationError::invalid_format("email", "must look like name@domain.tld");

    if email.chars().count() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity: 1..=MAX_ITEM_QUANTITY.
///
/// ## User Workflow
/// ```text
/// User enters quantity: 5
///      │
///      ▼
/// validate_quantity(5) ← THIS FUNCTION
///      │
///      ├── qty <= 0?   → "quantity must be positive"
///      ├── qty > 999?  → "quantity must be between 1 and 999"
///      └── OK → quote / record the sale
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a manual stock adjustment: non-zero, at most
/// `MAX_STOCK_DELTA` units either way.
pub fn validate_stock_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::MustBePositive {
            field: "delta".to_string(),
        });
    }

    if delta.unsigned_abs() > MAX_STOCK_DELTA.unsigned_abs() {
        return Err(ValidationError::OutOfRange {
            field: "delta".to_string(),
            min: -MAX_STOCK_DELTA,
            max: MAX_STOCK_DELTA,
        });
    }

    Ok(())
}

/// Validates a non-negative amount in cents (zero allowed).
pub fn validate_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a strictly positive amount in cents (expenses, accounts).
pub fn validate_positive_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates price ordering: `cost <= price <= card_price`.
///
/// ```rust
/// use shopkeep_core::validation::validate_price_ordering;
///
/// assert!(validate_price_ordering(500, 1000, Some(1100)).is_ok());
/// assert!(validate_price_ordering(1200, 1000, None).is_err());
/// assert!(validate_price_ordering(500, 1000, Some(900)).is_err());
/// ```
pub fn validate_price_ordering(
    cost_cents: i64,
    price_cents: i64,
    card_price_cents: Option<i64>,
) -> ValidationResult<()> {
    validate_cents("cost", cost_cents)?;
    validate_cents("price", price_cents)?;

    if cost_cents > price_cents {
        return Err(ValidationError::Ordering {
            field: "cost".to_string(),
            relation: "greater than".to_string(),
            other: "price".to_string(),
        });
    }

    if let Some(card) = card_price_cents {
        validate_cents("card_price", card)?;
        if card < price_cents {
            return Err(ValidationError::Ordering {
                field: "card_price".to_string(),
                relation: "less than".to_string(),
                other: "price".to_string(),
            });
        }
    }

    Ok(())
}

fn validate_stock_count(field: &str, value: i64) -> ValidationResult<()> {
    if !(0..=MAX_STOCK).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK,
        });
    }
    Ok(())
}

/// Validates stock levels: all within `0..=MAX_STOCK` and PROVE within stock.
pub fn validate_stock_levels(stock: i64, prove_stock: i64, min_stock: i64) -> ValidationResult<()> {
    validate_stock_count("stock", stock)?;
    validate_stock_count("prove_stock", prove_stock)?;
    validate_stock_count("min_stock", min_stock)?;

    if prove_stock > stock {
        return Err(ValidationError::Ordering {
            field: "prove_stock".to_string(),
            relation: "greater than".to_string(),
            other: "stock".to_string(),
        });
    }

    Ok(())
}

/// Validates a rate in basis points (0 to 10000 = 0% to 100%).
pub fn validate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 10000,
        });
    }
    Ok(())
}

// =============================================================================
// Identifier Validators
// =============================================================================

/// Validates a UUID string.
///
/// ```rust
/// use shopkeep_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required("id"));
    }

    uuid::Uuid::parse_str(id)
        .map_err(|_| ValidationError::invalid_format("id", "must be a valid UUID"))?;

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// Validates that an optional end date is not before its start date.
pub fn validate_date_order(field: &str, start: NaiveDate, end: Option<NaiveDate>) -> ValidationResult<()> {
    match end {
        Some(end) if end < start => Err(ValidationError::Ordering {
            field: field.to_string(),
            relation: "before".to_string(),
            other: start.to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates every field rule of a product record.
pub fn validate_product(product: &Product) -> ValidationResult<()> {
    validate_sku(&product.sku)?;
    validate_product_name(&product.name)?;
    validate_optional_text("barcode", product.barcode.as_deref(), 50)?;
    validate_optional_text("description", product.description.as_deref(), 1000)?;
    validate_optional_text("category", product.category.as_deref(), 80)?;
    validate_required_text("unit", &product.unit, 10)?;
    validate_price_ordering(product.cost_cents, product.price_cents, product.card_price_cents)?;
    validate_stock_levels(product.stock, product.prove_stock, product.min_stock)
}

pub fn validate_customer(customer: &Customer) -> ValidationResult<()> {
    validate_required_text("name", &customer.name, 200)?;
    validate_optional_text("phone", customer.phone.as_deref(), 40)?;
    if let Some(email) = customer.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }
    validate_optional_text("document", customer.document.as_deref(), 40)?;
    validate_optional_text("address", customer.address.as_deref(), 300)?;
    validate_optional_text("notes", customer.notes.as_deref(), 1000)
}

/// Validates an expense. Only templates may carry a recurrence end.
pub fn validate_expense(expense: &Expense) -> ValidationResult<()> {
    validate_required_text("description", &expense.description, 200)?;
    validate_required_text("category", &expense.category, 80)?;
    validate_positive_cents("amount", expense.amount_cents)?;
    validate_optional_text("notes", expense.notes.as_deref(), 1000)?;
    if expense.recurrence == Recurrence::None && expense.recurrence_end.is_some() {
        return Err(ValidationError::invalid_format(
            "recurrence_end",
            "only recurring expenses can have an end date",
        ));
    }
    validate_date_order("recurrence_end", expense.due_date, expense.recurrence_end)
}

pub fn validate_account(account: &Account) -> ValidationResult<()> {
    validate_required_text("counterparty", &account.counterparty, 200)?;
    validate_required_text("description", &account.description, 200)?;
    validate_positive_cents("amount", account.amount_cents)?;
    validate_optional_text("notes", account.notes.as_deref(), 1000)
}

// =============================================================================
// Unit Tests
// =============================================================================
