//! # Domain Types
//!
//! Core records used throughout Shopkeep.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │      Sale       │   │    Customer     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku, name      │   │  receipt_number │   │  name, phone    │       │
//! │  │  cost / price   │   │  record_type    │   │  email          │       │
//! │  │  stock / PROVE  │   │  payment_method │   └─────────────────┘       │
//! │  │  is_basket      │   │  totals, cost   │                             │
//! │  └───────┬─────────┘   └───────┬─────────┘   ┌─────────────────┐       │
//! │          │ components          │ items        │    Expense      │       │
//! │  ┌───────▼─────────┐   ┌───────▼─────────┐   │  recurrence     │       │
//! │  │ BasketComponent │   │    SaleItem     │   └─────────────────┘       │
//! │  │ item/packaging/ │   │  (snapshot)     │   ┌─────────────────┐       │
//! │  │ extra × qty     │   └─────────────────┘   │    Account      │       │
//! │  └─────────────────┘                          │ payable/recv.   │       │
//! │                                               └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID where one exists (sku, receipt_number)

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::money::Money;
use crate::MAX_REPORT_SPAN_DAYS;

/// Implements `as_str`, `Display` and `FromStr` for a snake_case enum.
macro_rules! text_enum {
    ($ty:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub const ALL: &'static [$ty] = &[$($ty::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    _ => Err(ValidationError::NotAllowed {
                        field: stringify!($ty).to_string(),
                        allowed: vec![$($text.to_string()),+],
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product. Baskets are products too (`is_basket`).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub store_id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,

    /// Sale unit shown on labels ("un", "kg", "cx").
    pub unit: String,

    /// Acquisition cost in cents. For baskets: derived component cost.
    pub cost_cents: i64,

    /// Cash price in cents.
    pub price_cents: i64,

    /// Price for card payments; `None` falls back to the store surcharge.
    pub card_price_cents: Option<i64>,

    /// Units on hand, including the PROVE reserve.
    pub stock: i64,

    /// PROVE: units reserved for sampling, not sellable.
    pub prove_stock: i64,

    /// Alert threshold for the low-stock list.
    pub min_stock: i64,

    pub is_basket: bool,
    pub photo_path: Option<String>,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Units that may be sold: stock minus the PROVE reserve, never negative.
    #[inline]
    pub fn sellable_stock(&self) -> i64 {
        (self.stock - self.prove_stock).max(0)
    }

    pub fn can_sell(&self, quantity: i64) -> bool {
        self.sellable_stock() >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.sellable_stock() <= self.min_stock
    }

    /// Unit price charged for the given payment method.
    ///
    /// ## Rules
    /// - Cash / transfer: `price_cents`
    /// - Debit / credit: `card_price_cents`, or `price_cents` plus
    ///   `card_surcharge_bps` when no card price is configured
    pub fn price_for(&self, method: PaymentMethod, card_surcharge_bps: u32) -> Money {
        method.select_price(self.price_cents, self.card_price_cents, card_surcharge_bps)
    }

    /// Gross margin in basis points of price (0 when price is zero).
    pub fn margin_bps(&self) -> i64 {
        if self.price_cents == 0 {
            return 0;
        }
        (self.price_cents - self.cost_cents) * 10000 / self.price_cents
    }
}

// =============================================================================
// Basket Composition
// =============================================================================

/// What a basket component contributes.
///
/// Items contribute their *price*; packaging and extras contribute their
/// *cost* (they are not sold separately inside the basket).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ComponentRole {
    Item,
    Packaging,
    Extra,
}

text_enum!(ComponentRole {
    Item => "item",
    Packaging => "packaging",
    Extra => "extra",
});

/// One line of a basket composition as persisted.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BasketComponent {
    pub id: String,
    pub basket_id: String,
    pub component_id: String,
    pub role: ComponentRole,
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AssemblyStatus {
    Assembled,
    Cancelled,
}

text_enum!(AssemblyStatus {
    Assembled => "assembled",
    Cancelled => "cancelled",
});

/// A batch of baskets built from component stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BasketAssembly {
    pub id: String,
    pub store_id: String,
    pub basket_id: String,
    pub quantity: i64,
    pub status: AssemblyStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Component quantity actually deducted by an assembly.
///
/// Restoration uses these rows, not the current composition.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BasketAssemblyItem {
    pub id: String,
    pub assembly_id: String,
    pub component_id: String,
    pub quantity: i64,
}

// =============================================================================
// Sales
// =============================================================================

/// Sale vs. donation: donations deduct stock with zero revenue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum RecordType {
    #[default]
    Sale,
    Donation,
}

text_enum!(RecordType {
    Sale => "sale",
    Donation => "donation",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SaleStatus {
    #[default]
    Completed,
    Cancelled,
}

text_enum!(SaleStatus {
    Completed => "completed",
    Cancelled => "cancelled",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum PaymentMethod {
    #[default]
    Cash,
    DebitCard,
    CreditCard,
    Transfer,
}

text_enum!(PaymentMethod {
    Cash => "cash",
    DebitCard => "debit_card",
    CreditCard => "credit_card",
    Transfer => "transfer",
});

impl PaymentMethod {
    /// Whether the card price applies.
    pub fn is_card(&self) -> bool {
        matches!(self, PaymentMethod::DebitCard | PaymentMethod::CreditCard)
    }

    /// Picks the unit price this method pays from a cash price and an
    /// optional card price, applying the surcharge when no card price exists.
    pub fn select_price(
        &self,
        price_cents: i64,
        card_price_cents: Option<i64>,
        card_surcharge_bps: u32,
    ) -> Money {
        let price = Money::from_cents(price_cents);
        if !self.is_card() {
            return price;
        }
        match card_price_cents {
            Some(card) => Money::from_cents(card),
            None => price + price.percentage(card_surcharge_bps),
        }
    }
}

/// A recorded sale or donation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub store_id: String,
    pub receipt_number: String,
    pub record_type: RecordType,
    pub status: SaleStatus,
    pub payment_method: PaymentMethod,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Sum of unit cost × quantity at time of sale.
    pub cost_total_cents: i64,
    pub notes: Option<String>,
    /// Business date the sale counts toward in reports.
    #[ts(as = "String")]
    pub sold_on: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Completed, revenue-generating sale.
    pub fn counts_as_revenue(&self) -> bool {
        self.status == SaleStatus::Completed && self.record_type == RecordType::Sale
    }
}

/// A line item in a sale. Product data is frozen at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    pub quantity: i64,
    pub line_total_cents: i64,
    pub is_basket: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Customers
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub store_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Tax/identity document number.
    pub document: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Expenses
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Recurrence {
    #[default]
    None,
    Weekly,
    Monthly,
    Yearly,
}

text_enum!(Recurrence {
    None => "none",
    Weekly => "weekly",
    Monthly => "monthly",
    Yearly => "yearly",
});

/// An expense. Recurring expenses act as templates for their series.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub store_id: String,
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub paid_on: Option<NaiveDate>,
    pub recurrence: Recurrence,
    #[ts(as = "Option<String>")]
    pub recurrence_end: Option<NaiveDate>,
    /// Template expense this occurrence was generated from.
    pub series_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Expense {
    pub fn is_paid(&self) -> bool {
        self.paid_on.is_some()
    }

    /// Template of a recurring series (not a generated occurrence).
    pub fn is_recurring_template(&self) -> bool {
        self.recurrence != Recurrence::None && self.series_id.is_none()
    }
}

// =============================================================================
// Accounts Payable / Receivable
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AccountKind {
    Payable,
    Receivable,
}

text_enum!(AccountKind {
    Payable => "payable",
    Receivable => "receivable",
});

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Account {
    pub id: String,
    pub store_id: String,
    pub kind: AccountKind,
    /// Supplier (payable) or debtor (receivable).
    pub counterparty: String,
    pub description: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub settled_on: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Store Settings
// =============================================================================

/// A single key/value setting persisted per store.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StoreSetting {
    pub store_id: String,
    pub key: String,
    pub value: String,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Date Range
// =============================================================================

/// Inclusive date range used by listings and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DateRange {
    #[ts(as = "String")]
    pub from: NaiveDate,
    #[ts(as = "String")]
    pub to: NaiveDate,
}

impl DateRange {
    /// Creates a validated range (`from <= to`, span within the report limit).
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::InvalidDateRange(format!(
                "start {} is after end {}",
                from, to
            )));
        }
        let span = (to - from).num_days() + 1;
        if span > MAX_REPORT_SPAN_DAYS {
            return Err(CoreError::InvalidDateRange(format!(
                "range covers {} days, maximum is {}",
                span, MAX_REPORT_SPAN_DAYS
            )));
        }
        Ok(DateRange { from, to })
    }

    pub fn single_day(day: NaiveDate) -> Self {
        DateRange { from: day, to: day }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.from && day <= self.to
    }

    pub fn num_days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    /// Every day in the range, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let from = self.from;
        (0..self.num_days()).map(move |offset| from + Duration::days(offset))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::DEFAULT_STORE_ID;

    pub(crate) fn product(id: &str, cost_cents: i64, price_cents: i64, stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: id.to_string(),
            store_id: DEFAULT_STORE_ID.to_string(),
            sku: format!("SKU-{}", id),
            barcode: None,
            name: format!("Product {}", id),
            description: None,
            category: None,
            unit: "un".to_string(),
            cost_cents,
            price_cents,
            card_price_cents: None,
            stock,
            prove_stock: 0,
            min_stock: 0,
            is_basket: false,
            photo_path: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_sellable_stock_excludes_prove() {
        let mut p = product("1", 100, 200, 10);
        p.prove_stock = 3;
        assert_eq!(p.sellable_stock(), 7);
        assert!(p.can_sell(7));
        assert!(!p.can_sell(8));

        // Reserve larger than stock never yields negative sellable units
        p.prove_stock = 12;
        assert_eq!(p.sellable_stock(), 0);
    }

    #[test]
    fn test_price_selection_by_payment_method() {
        let mut p = product("1", 500, 1000, 5);
        assert_eq!(p.price_for(PaymentMethod::Cash, 500).cents(), 1000);
        assert_eq!(p.price_for(PaymentMethod::Transfer, 500).cents(), 1000);
        // No card price: surcharge applies
        assert_eq!(p.price_for(PaymentMethod::CreditCard, 500).cents(), 1050);

        p.card_price_cents = Some(1100);
        assert_eq!(p.price_for(PaymentMethod::DebitCard, 500).cents(), 1100);
        assert_eq!(p.price_for(PaymentMethod::Cash, 500).cents(), 1000);
    }

    #[test]
    fn test_margin_bps() {
        assert_eq!(product("1", 600, 1000, 0).margin_bps(), 4000);
        assert_eq!(product("1", 0, 0, 0).margin_bps(), 0);
    }

    #[test]
    fn test_text_enums_round_trip_through_serde_names() {
        for method in PaymentMethod::ALL {
            let json = serde_json::to_string(method).unwrap();
            assert_eq!(json, format!("\"{}\"", method.as_str()));
            assert_eq!(method.as_str().parse::<PaymentMethod>().unwrap(), *method);
        }
        assert!("pix".parse::<PaymentMethod>().is_err());
        assert_eq!(" Monthly ".parse::<Recurrence>().unwrap(), Recurrence::Monthly);
    }

    #[test]
    fn test_date_range_validation() {
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();

        let range = DateRange::new(d("2026-01-30"), d("2026-02-02")).unwrap();
        assert_eq!(range.num_days(), 4);
        assert_eq!(range.days().last(), Some(d("2026-02-02")));
        assert!(range.contains(d("2026-02-01")));
        assert!(!range.contains(d("2026-02-03")));

        assert!(DateRange::new(d("2026-02-02"), d("2026-01-30")).is_err());
        assert!(DateRange::new(d("2025-01-01"), d("2026-12-31")).is_err());
    }
}
