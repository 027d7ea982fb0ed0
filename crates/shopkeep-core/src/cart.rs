//! # Cart Module
//!
//! Client-held cart semantics and the pure sale quote.
//!
//! The browser owns the cart between requests; the server rebuilds a [`Cart`]
//! from current product rows and calls [`quote`] both for display and when
//! recording the sale, so prices are never taken from the client.
//!
//! ## Quote Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Sale Quote                                     │
//! │                                                                         │
//! │  Cart lines ──► price by payment method ──► subtotal                    │
//! │                  cash/transfer: price          │                        │
//! │                  card: card price or           ▼                        │
//! │                        price + surcharge    − discount (0..subtotal)    │
//! │                                                │                        │
//! │                                                ▼                        │
//! │                                              total                      │
//! │                                                                         │
//! │  Donation: every price is zero, cost is still counted.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{PaymentMethod, Product, RecordType};
use crate::validation::{validate_bps, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Discount
// =============================================================================

/// Discount applied to a sale subtotal or basket base price.
///
/// Serialized as `{"kind": "percentage", "value": 1000}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
#[ts(export)]
pub enum Discount {
    #[default]
    None,
    /// Basis points of the subtotal (1000 = 10%).
    Percentage(u32),
    /// Fixed amount.
    Fixed(Money),
}

impl Discount {
    /// Checks the discount parameters themselves.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Discount::None => Ok(()),
            Discount::Percentage(bps) => validate_bps("discount", *bps),
            Discount::Fixed(amount) if amount.is_negative() => Err(ValidationError::OutOfRange {
                field: "discount".to_string(),
                min: 0,
                max: i64::MAX,
            }),
            Discount::Fixed(_) => Ok(()),
        }
    }

    /// Discount amount for `subtotal`, always within `[0, subtotal]`.
    ///
    /// ```rust
    /// use shopkeep_core::cart::Discount;
    /// use shopkeep_core::Money;
    ///
    /// let subtotal = Money::from_cents(5000);
    /// assert_eq!(Discount::Percentage(1000).amount(subtotal).cents(), 500);
    /// assert_eq!(Discount::Fixed(Money::from_cents(9000)).amount(subtotal), subtotal);
    /// ```
    pub fn amount(&self, subtotal: Money) -> Money {
        let ceiling = subtotal.max(Money::zero());
        let raw = match self {
            Discount::None => Money::zero(),
            Discount::Percentage(bps) => ceiling.percentage((*bps).min(10000)),
            Discount::Fixed(amount) => *amount,
        };
        raw.clamp(Money::zero(), ceiling)
    }
}

// =============================================================================
// Cart
// =============================================================================

/// A cart line. Product data is captured when the line is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub card_price_cents: Option<i64>,
    pub cost_cents: i64,
    pub is_basket: bool,
    /// Stock minus PROVE at the time the line was built.
    pub sellable_stock: i64,
    pub quantity: i64,
}

impl CartLine {
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            price_cents: product.price_cents,
            card_price_cents: product.card_price_cents,
            cost_cents: product.cost_cents,
            is_basket: product.is_basket,
            sellable_stock: product.sellable_stock(),
            quantity,
        }
    }

    /// Unit price for a payment method (see [`Product::price_for`]).
    pub fn unit_price(&self, method: PaymentMethod, card_surcharge_bps: u32) -> Money {
        method.select_price(self.price_cents, self.card_price_cents, card_surcharge_bps)
    }
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `product_id` (adding again increases quantity)
/// - Quantity is within 1..=MAX_ITEM_QUANTITY
/// - At most MAX_CART_ITEMS distinct lines
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Adds a product or increases its quantity if already present.
    pub fn add(&mut self, product: &Product, quantity: i64) -> CoreResult<()> {
        validate_quantity(quantity)?;

        if let Some(line) = self.lines.iter_mut().find(|l| l.product_id == product.id) {
            let new_qty = line.quantity + quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            line.quantity = new_qty;
            return Ok(());
        }

        if self.lines.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }

        self.lines.push(CartLine::from_product(product, quantity));
        Ok(())
    }

    /// Sets a line's quantity; zero removes the line.
    pub fn update_quantity(&mut self, product_id: &str, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        validate_quantity(quantity)?;

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.product_id == product_id)
            .ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;
        line.quantity = quantity;
        Ok(())
    }

    pub fn remove(&mut self, product_id: &str) -> CoreResult<()> {
        let before = self.lines.len();
        self.lines.retain(|l| l.product_id != product_id);
        if self.lines.len() == before {
            return Err(CoreError::ProductNotFound(product_id.to_string()));
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Fails on the first line asking for more than its sellable stock.
    pub fn check_stock(&self) -> CoreResult<()> {
        for line in &self.lines {
            if line.quantity > line.sellable_stock {
                return Err(CoreError::InsufficientStock {
                    sku: line.sku.clone(),
                    available: line.sellable_stock.max(0),
                    requested: line.quantity,
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Quote
// =============================================================================

/// Parameters of a quote that do not live in the cart.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuoteOptions {
    pub payment_method: PaymentMethod,
    pub record_type: RecordType,
    pub discount: Discount,
    /// Store card surcharge used when a product has no card price.
    pub card_surcharge_bps: u32,
}

/// A priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QuotedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price: Money,
    pub unit_cost: Money,
    pub quantity: i64,
    pub line_total: Money,
    pub is_basket: bool,
}

/// Totals for a cart under given quote options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleQuote {
    pub payment_method: PaymentMethod,
    pub record_type: RecordType,
    pub lines: Vec<QuotedLine>,
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
    pub cost_total: Money,
    /// `total - cost_total`; negative for donations.
    pub margin: Money,
    pub item_count: i64,
}

/// Prices a cart.
///
/// ## Errors
/// - `EmptyCart` when there are no lines
/// - `Validation` for a malformed discount or card surcharge
/// - `InsufficientStock` when any line exceeds sellable stock
pub fn quote(cart: &Cart, options: &QuoteOptions) -> CoreResult<SaleQuote> {
    if cart.is_empty() {
        return Err(CoreError::EmptyCart);
    }
    options.discount.validate()?;
    validate_bps("card_surcharge", options.card_surcharge_bps)?;
    cart.check_stock()?;

    let donation = options.record_type == RecordType::Donation;

    let lines: Vec<QuotedLine> = cart
        .lines
        .iter()
        .map(|line| {
            let unit_price = if donation {
                Money::zero()
            } else {
                line.unit_price(options.payment_method, options.card_surcharge_bps)
            };
            QuotedLine {
                product_id: line.product_id.clone(),
                sku: line.sku.clone(),
                name: line.name.clone(),
                unit_price,
                unit_cost: Money::from_cents(line.cost_cents),
                quantity: line.quantity,
                line_total: unit_price.multiply_quantity(line.quantity),
                is_basket: line.is_basket,
            }
        })
        .collect();

    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let discount = if donation {
        Money::zero()
    } else {
        options.discount.amount(subtotal)
    };
    let total = subtotal - discount;
    let cost_total: Money = lines
        .iter()
        .map(|l| l.unit_cost.multiply_quantity(l.quantity))
        .sum();

    Ok(SaleQuote {
        payment_method: options.payment_method,
        record_type: options.record_type,
        item_count: cart.total_quantity(),
        lines,
        subtotal,
        discount,
        total,
        cost_total,
        margin: total - cost_total,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
