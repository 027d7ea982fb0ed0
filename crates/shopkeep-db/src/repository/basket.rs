//! # Basket Repository
//!
//! Basket composition bookkeeping and assembly.
//!
//! ## Assembly Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Basket Assembly                                   │
//! │                                                                         │
//! │  1. COMPOSE                                                            │
//! │     └── set_components() → rows in basket_components                   │
//! │         basket cost/price recomputed from the components               │
//! │                                                                         │
//! │  2. ASSEMBLE n  (one transaction)                                      │
//! │     ├── component stock -= qty × n   (guarded)                         │
//! │     ├── basket_assemblies + basket_assembly_items (what was taken)     │
//! │     └── basket stock += n                                              │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL  (one transaction)                               │
//! │     ├── basket stock -= n            (guarded)                         │
//! │     └── component stock += recorded item quantities                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use shopkeep_core::basket::{assemblable, check_assembly, price_basket, validate_composition, BasketLine, BasketPricing};
use shopkeep_core::cart::Discount;
use shopkeep_core::validation::{validate_optional_text, validate_quantity};
use shopkeep_core::{
    AssemblyStatus, BasketAssembly, BasketAssemblyItem, BasketComponent, ComponentRole, CoreError, Product,
};

use super::{begin_write, generate_id};
use super::product::{fetch, fetch_many, return_stock, take_stock};
use crate::error::{DbError, DbResult};

/// One requested component of a composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInput {
    pub component_id: String,
    pub role: ComponentRole,
    pub quantity: i64,
}

/// A basket with its resolved composition.
#[derive(Debug, Clone, Serialize)]
pub struct BasketComposition {
    pub basket: Product,
    pub lines: Vec<BasketLine>,
    /// Pricing of the lines without discount.
    pub pricing: BasketPricing,
    /// Baskets the current component stock can still produce.
    pub assemblable: i64,
}

impl BasketComposition {
    fn new(basket: Product, lines: Vec<BasketLine>, discount: &Discount) -> Self {
        BasketComposition {
            pricing: price_basket(&lines, discount),
            assemblable: assemblable(&lines),
            basket,
            lines,
        }
    }
}

/// Repository for basket compositions and assemblies.
#[derive(Debug, Clone)]
pub struct BasketRepository {
    pool: SqlitePool,
    store_id: String,
}

impl BasketRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        BasketRepository { pool, store_id }
    }

    /// The basket with its current composition and undiscounted pricing.
    pub async fn composition(&self, basket_id: &str) -> DbResult<BasketComposition> {
        let mut conn = self.pool.acquire().await?;
        let basket = require_basket(&mut conn, &self.store_id, basket_id).await?;
        let lines = current_lines(&mut conn, &self.store_id, basket_id).await?;
        Ok(BasketComposition::new(basket, lines, &Discount::None))
    }

    /// Prices a composition without saving it.
    ///
    /// `inputs = None` prices the saved composition.
    pub async fn quote(
        &self,
        basket_id: &str,
        inputs: Option<&[ComponentInput]>,
        discount: &Discount,
    ) -> DbResult<BasketComposition> {
        discount.validate()?;
        let mut conn = self.pool.acquire().await?;
        let basket = require_basket(&mut conn, &self.store_id, basket_id).await?;
        let lines = match inputs {
            Some(inputs) => resolve_lines(&mut conn, &self.store_id, basket_id, inputs).await?,
            None => current_lines(&mut conn, &self.store_id, basket_id).await?,
        };
        Ok(BasketComposition::new(basket, lines, discount))
    }

    /// Replaces the composition and recomputes the basket's cost and price.
    ///
    /// The stored price is `price_basket(lines, discount).price`, so it is
    /// never below the total component cost. A card price that would end up
    /// below the new cash price is cleared.
    pub async fn set_components(
        &self,
        basket_id: &str,
        inputs: &[ComponentInput],
        discount: &Discount,
    ) -> DbResult<BasketComposition> {
        discount.validate()?;
        debug!(basket_id = %basket_id, components = inputs.len(), "Saving basket composition");

        let mut tx = begin_write(&self.pool).await?;
        require_basket(&mut tx, &self.store_id, basket_id).await?;
        let lines = resolve_lines(&mut tx, &self.store_id, basket_id, inputs).await?;

        sqlx::query("DELETE FROM basket_components WHERE basket_id = ?1")
            .bind(basket_id)
            .execute(&mut *tx)
            .await?;

        let now = Utc::now();
        for line in &lines {
            sqlx::query(
                r#"
                INSERT INTO basket_components (id, basket_id, component_id, role, quantity, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(generate_id())
            .bind(basket_id)
            .bind(&line.component.id)
            .bind(line.role)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let pricing = price_basket(&lines, discount);
        sqlx::query(
            r#"
            UPDATE products SET
                cost_cents = ?3,
                price_cents = ?4,
                card_price_cents = CASE
                    WHEN card_price_cents IS NOT NULL AND card_price_cents < ?4 THEN NULL
                    ELSE card_price_cents
                END,
                updated_at = ?5
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(basket_id)
        .bind(&self.store_id)
        .bind(pricing.cost.cents())
        .bind(pricing.price.cents())
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let basket = require_basket(&mut tx, &self.store_id, basket_id).await?;
        tx.commit().await?;

        info!(
            basket_id = %basket_id,
            cost = pricing.cost.cents(),
            price = pricing.price.cents(),
            clamped = pricing.clamped_to_cost,
            "Basket composition saved"
        );
        Ok(BasketComposition::new(basket, lines, discount))
    }

    /// Builds `quantity` baskets from component stock.
    ///
    /// ## Errors
    /// - `InvalidBasket` if the basket has no components or is inactive
    /// - `InsufficientStock` naming the first short component
    pub async fn assemble(
        &self,
        basket_id: &str,
        quantity: i64,
        notes: Option<String>,
    ) -> DbResult<BasketAssembly> {
        validate_quantity(quantity)?;
        validate_optional_text("notes", notes.as_deref(), 500)?;
        debug!(basket_id = %basket_id, quantity = quantity, "Assembling baskets");

        let mut tx = begin_write(&self.pool).await?;
        let basket = require_basket(&mut tx, &self.store_id, basket_id).await?;
        if !basket.is_active {
            return Err(CoreError::InvalidBasket(format!("{} is inactive", basket.sku)).into());
        }
        let lines = current_lines(&mut tx, &self.store_id, basket_id).await?;
        let plan = check_assembly(&lines, quantity)?;

        let assembly = BasketAssembly {
            id: generate_id(),
            store_id: self.store_id.clone(),
            basket_id: basket_id.to_string(),
            quantity,
            status: AssemblyStatus::Assembled,
            notes,
            created_at: Utc::now(),
            cancelled_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO basket_assemblies (id, store_id, basket_id, quantity, status, notes, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&assembly.id)
        .bind(&assembly.store_id)
        .bind(&assembly.basket_id)
        .bind(assembly.quantity)
        .bind(assembly.status)
        .bind(&assembly.notes)
        .bind(assembly.created_at)
        .execute(&mut *tx)
        .await?;

        for deduction in &plan {
            take_stock(&mut tx, &self.store_id, &deduction.component_id, deduction.quantity).await?;
            sqlx::query(
                r#"
                INSERT INTO basket_assembly_items (id, assembly_id, component_id, quantity)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )
            .bind(generate_id())
            .bind(&assembly.id)
            .bind(&deduction.component_id)
            .bind(deduction.quantity)
            .execute(&mut *tx)
            .await?;
        }

        return_stock(&mut tx, &self.store_id, basket_id, quantity).await?;
        tx.commit().await?;

        info!(
            assembly_id = %assembly.id,
            basket_id = %basket_id,
            quantity = quantity,
            "Baskets assembled"
        );
        Ok(assembly)
    }

    /// Assemblies of a basket, newest first.
    pub async fn assemblies(&self, basket_id: &str) -> DbResult<Vec<BasketAssembly>> {
        let assemblies = sqlx::query_as::<_, BasketAssembly>(
            r#"
            SELECT * FROM basket_assemblies
            WHERE basket_id = ?1 AND store_id = ?2
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(basket_id)
        .bind(&self.store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(assemblies)
    }

    /// Component quantities recorded for an assembly.
    pub async fn assembly_items(&self, assembly_id: &str) -> DbResult<Vec<BasketAssemblyItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_assembly(&mut conn, &self.store_id, assembly_id).await?;
        assembly_item_rows(&mut conn, assembly_id).await
    }

    /// Undoes an assembly using the recorded component quantities.
    ///
    /// The assembled baskets must still be in sellable stock.
    pub async fn cancel_assembly(&self, assembly_id: &str) -> DbResult<BasketAssembly> {
        debug!(assembly_id = %assembly_id, "Cancelling basket assembly");

        let mut tx = begin_write(&self.pool).await?;
        let assembly = fetch_assembly(&mut tx, &self.store_id, assembly_id).await?;
        if assembly.status == AssemblyStatus::Cancelled {
            return Err(CoreError::InvalidStatus {
                entity: "BasketAssembly".to_string(),
                id: assembly_id.to_string(),
                status: assembly.status.to_string(),
            }
            .into());
        }

        take_stock(&mut tx, &self.store_id, &assembly.basket_id, assembly.quantity).await?;
        for item in assembly_item_rows(&mut tx, assembly_id).await? {
            return_stock(&mut tx, &self.store_id, &item.component_id, item.quantity).await?;
        }

        sqlx::query(
            "UPDATE basket_assemblies SET status = ?2, cancelled_at = ?3 WHERE id = ?1",
        )
        .bind(assembly_id)
        .bind(AssemblyStatus::Cancelled)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let cancelled = fetch_assembly(&mut tx, &self.store_id, assembly_id).await?;
        tx.commit().await?;

        info!(assembly_id = %assembly_id, basket_id = %cancelled.basket_id, "Basket assembly cancelled");
        Ok(cancelled)
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn require_basket(conn: &mut SqliteConnection, store_id: &str, basket_id: &str) -> DbResult<Product> {
    let basket = fetch(conn, store_id, basket_id)
        .await?
        .ok_or_else(|| DbError::not_found("Product", basket_id))?;
    if !basket.is_basket {
        return Err(CoreError::InvalidBasket(format!("{} is not a basket", basket.sku)).into());
    }
    Ok(basket)
}

async fn component_rows(conn: &mut SqliteConnection, basket_id: &str) -> DbResult<Vec<BasketComponent>> {
    let rows = sqlx::query_as::<_, BasketComponent>(
        "SELECT * FROM basket_components WHERE basket_id = ?1 ORDER BY rowid",
    )
    .bind(basket_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows)
}

/// Saved composition joined with fresh component data.
async fn current_lines(conn: &mut SqliteConnection, store_id: &str, basket_id: &str) -> DbResult<Vec<BasketLine>> {
    let rows = component_rows(conn, basket_id).await?;
    let ids: Vec<String> = rows.iter().map(|r| r.component_id.clone()).collect();
    let products: HashMap<String, Product> = fetch_many(conn, store_id, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    rows.iter()
        .map(|row| {
            products
                .get(&row.component_id)
                .map(|p| BasketLine::new(p, row.role, row.quantity))
                .ok_or_else(|| DbError::not_found("Product", &row.component_id))
        })
        .collect()
}

/// Turns requested components into validated lines.
async fn resolve_lines(
    conn: &mut SqliteConnection,
    store_id: &str,
    basket_id: &str,
    inputs: &[ComponentInput],
) -> DbResult<Vec<BasketLine>> {
    let ids: Vec<String> = inputs.iter().map(|i| i.component_id.clone()).collect();
    let products: HashMap<String, Product> = fetch_many(conn, store_id, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id.clone(), p))
        .collect();

    let mut lines = Vec::with_capacity(inputs.len());
    for input in inputs {
        let product = products
            .get(&input.component_id)
            .ok_or_else(|| DbError::not_found("Product", &input.component_id))?;
        if !product.is_active {
            return Err(CoreError::InvalidBasket(format!("{} is inactive", product.sku)).into());
        }
        lines.push(BasketLine::new(product, input.role, input.quantity));
    }

    validate_composition(basket_id, &lines)?;
    Ok(lines)
}

async fn fetch_assembly(conn: &mut SqliteConnection, store_id: &str, id: &str) -> DbResult<BasketAssembly> {
    sqlx::query_as::<_, BasketAssembly>(
        "SELECT * FROM basket_assemblies WHERE id = ?1 AND store_id = ?2",
    )
    .bind(id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DbError::not_found("BasketAssembly", id))
}

async fn assembly_item_rows(conn: &mut SqliteConnection, assembly_id: &str) -> DbResult<Vec<BasketAssemblyItem>> {
    let items = sqlx::query_as::<_, BasketAssemblyItem>(
        "SELECT * FROM basket_assembly_items WHERE assembly_id = ?1 ORDER BY rowid",
    )
    .bind(assembly_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

// =============================================================================
// Tests
// =============================================================================
