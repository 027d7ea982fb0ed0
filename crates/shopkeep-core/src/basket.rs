//! # Basket Module
//!
//! Pricing and stock composition for baskets (combos): products built from
//! other products.
//!
//! ## Pricing Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Basket Pricing                                   │
//! │                                                                         │
//! │  item lines       ──► Σ price × qty ──┐                                 │
//! │  packaging/extra  ──► Σ cost  × qty ──┴──► base price                   │
//! │                                              │                          │
//! │                                              ▼  − discount (0..base)    │
//! │  all lines        ──► Σ cost  × qty ──────► floor                       │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                              price = max(base − discount, cost)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Model
//! Assembling `n` baskets deducts `qty × n` of every component and adds `n`
//! to the basket's own stock. The deducted quantities are recorded so a
//! cancellation restores exactly what was taken.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Discount;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ComponentRole, Product};
use crate::validation::validate_quantity;
use crate::MAX_BASKET_COMPONENTS;

// =============================================================================
// Composition Lines
// =============================================================================

/// The parts of a component product that basket math needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComponentRef {
    pub id: String,
    pub sku: String,
    pub name: String,
    pub is_basket: bool,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub sellable_stock: i64,
}

impl From<&Product> for ComponentRef {
    fn from(product: &Product) -> Self {
        ComponentRef {
            id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            is_basket: product.is_basket,
            cost_cents: product.cost_cents,
            price_cents: product.price_cents,
            sellable_stock: product.sellable_stock(),
        }
    }
}

/// One component of a basket with its role and per-basket quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BasketLine {
    pub component: ComponentRef,
    pub role: ComponentRole,
    pub quantity: i64,
}

impl BasketLine {
    pub fn new(product: &Product, role: ComponentRole, quantity: i64) -> Self {
        BasketLine {
            component: ComponentRef::from(product),
            role,
            quantity,
        }
    }

    fn cost(&self) -> Money {
        Money::from_cents(self.component.cost_cents).multiply_quantity(self.quantity)
    }

    /// What this line adds to the basket's base price.
    fn contribution(&self) -> Money {
        match self.role {
            ComponentRole::Item => {
                Money::from_cents(self.component.price_cents).multiply_quantity(self.quantity)
            }
            ComponentRole::Packaging | ComponentRole::Extra => self.cost(),
        }
    }
}

// =============================================================================
// Pricing
// =============================================================================

/// Result of pricing a basket composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BasketPricing {
    /// Σ price × qty over item lines.
    pub items_price: Money,
    /// Σ cost × qty over packaging and extra lines.
    pub extras_cost: Money,
    /// Σ cost × qty over all lines.
    pub cost: Money,
    pub base_price: Money,
    /// Discount actually applied (bounded to `[0, base_price]`).
    pub discount: Money,
    pub price: Money,
    /// True when the discounted price fell below cost and was raised to it.
    pub clamped_to_cost: bool,
}

/// Prices a basket composition.
///
/// ```rust
/// use shopkeep_core::basket::{price_basket, BasketLine, ComponentRef};
/// use shopkeep_core::cart::Discount;
/// use shopkeep_core::ComponentRole;
///
/// let line = |id: &str, role, cost, price, qty| BasketLine {
///     component: ComponentRef {
///         id: id.into(), sku: id.into(), name: id.into(), is_basket: false,
///         cost_cents: cost, price_cents: price, sellable_stock: 10,
///     },
///     role,
///     quantity: qty,
/// };
/// let lines = vec![
///     line("coffee", ComponentRole::Item, 800, 1500, 1),
///     line("box", ComponentRole::Packaging, 300, 0, 1),
/// ];
/// let pricing = price_basket(&lines, &Discount::None);
/// assert_eq!(pricing.base_price.cents(), 1800);
/// assert_eq!(pricing.cost.cents(), 1100);
/// ```
pub fn price_basket(lines: &[BasketLine], discount: &Discount) -> BasketPricing {
    let items_price: Money = lines
        .iter()
        .filter(|l| l.role == ComponentRole::Item)
        .map(BasketLine::contribution)
        .sum();
    let extras_cost: Money = lines
        .iter()
        .filter(|l| l.role != ComponentRole::Item)
        .map(BasketLine::contribution)
        .sum();
    let cost: Money = lines.iter().map(BasketLine::cost).sum();

    let base_price = items_price + extras_cost;
    let discount = discount.amount(base_price);
    let discounted = base_price - discount;
    let clamped_to_cost = discounted < cost;

    BasketPricing {
        items_price,
        extras_cost,
        cost,
        base_price,
        discount,
        price: if clamped_to_cost { cost } else { discounted },
        clamped_to_cost,
    }
}

// =============================================================================
// Stock Composition
// =============================================================================

/// Maximum number of baskets the components' sellable stock can produce.
pub fn assemblable(lines: &[BasketLine]) -> i64 {
    // (quantity per basket, sellable stock) keyed by component
    let mut needs: HashMap<&str, (i64, i64)> = HashMap::new();
    for line in lines.iter().filter(|l| l.quantity > 0) {
        let entry = needs
            .entry(line.component.id.as_str())
            .or_insert((0, line.component.sellable_stock.max(0)));
        entry.0 += line.quantity;
    }

    needs
        .values()
        .map(|(per_basket, stock)| stock / per_basket)
        .min()
        .unwrap_or(0)
}

/// Quantity of one component to deduct (or restore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Deduction {
    pub component_id: String,
    pub quantity: i64,
}

/// Component quantities to deduct when assembling `count` baskets.
///
/// A component listed under several roles yields a single merged deduction.
/// Order follows first appearance in the composition.
pub fn deduction_plan(lines: &[BasketLine], count: i64) -> CoreResult<Vec<Deduction>> {
    validate_quantity(count)?;
    if lines.is_empty() {
        return Err(CoreError::InvalidBasket("basket has no components".to_string()));
    }

    let mut plan: Vec<Deduction> = Vec::with_capacity(lines.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for line in lines {
        let qty = line.quantity * count;
        match index.get(line.component.id.as_str()) {
            Some(&i) => plan[i].quantity += qty,
            None => {
                index.insert(line.component.id.as_str(), plan.len());
                plan.push(Deduction {
                    component_id: line.component.id.clone(),
                    quantity: qty,
                });
            }
        }
    }

    Ok(plan)
}

/// Checks that `count` baskets can be assembled from current sellable stock.
pub fn check_assembly(lines: &[BasketLine], count: i64) -> CoreResult<Vec<Deduction>> {
    let plan = deduction_plan(lines, count)?;

    for deduction in &plan {
        let component = lines
            .iter()
            .map(|l| &l.component)
            .find(|c| c.id == deduction.component_id);
        if let Some(component) = component {
            if component.sellable_stock < deduction.quantity {
                return Err(CoreError::InsufficientStock {
                    sku: component.sku.clone(),
                    available: component.sellable_stock,
                    requested: deduction.quantity,
                });
            }
        }
    }

    Ok(plan)
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a basket composition before it is saved.
///
/// ## Rules
/// - at least one component, at most `MAX_BASKET_COMPONENTS`
/// - every quantity within 1..=999
/// - a basket cannot contain itself or another basket
/// - no duplicate (component, role) pairs
pub fn validate_composition(basket_id: &str, lines: &[BasketLine]) -> CoreResult<()> {
    if lines.is_empty() {
        return Err(CoreError::InvalidBasket(
            "basket must have at least one component".to_string(),
        ));
    }
    if lines.len() > MAX_BASKET_COMPONENTS {
        return Err(CoreError::InvalidBasket(format!(
            "basket cannot have more than {} components",
            MAX_BASKET_COMPONENTS
        )));
    }

    let mut seen = HashSet::new();
    for line in lines {
        validate_quantity(line.quantity)?;

        if line.component.id == basket_id {
            return Err(CoreError::InvalidBasket(
                "basket cannot contain itself".to_string(),
            ));
        }
        if line.component.is_basket {
            return Err(CoreError::InvalidBasket(format!(
                "{} is a basket; baskets cannot be nested",
                line.component.name
            )));
        }
        if !seen.insert((line.component.id.as_str(), line.role)) {
            return Err(CoreError::InvalidBasket(format!(
                "{} is listed twice as {}",
                line.component.name, line.role
            )));
        }
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
