//! # Product Repository
//!
//! Database operations for products (baskets included).
//!
//! ## Key Operations
//! - Search by name / SKU / barcode
//! - CRUD with soft delete
//! - Guarded stock adjustments
//! - Low-stock listing
//!
//! ## Stock Guard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Stock Update Strategy                                │
//! │                                                                         │
//! │  ❌ WRONG: read, compute, write back                                   │
//! │     SELECT stock ...; UPDATE products SET stock = 7                    │
//! │     (two concurrent sales both read 10 and both write 7)               │
//! │                                                                         │
//! │  ✅ CORRECT: delta update with the guard in the WHERE clause           │
//! │     UPDATE products SET stock = stock - 3                              │
//! │     WHERE id = ? AND stock - prove_stock >= 3                          │
//! │                                                                         │
//! │  0 rows affected → not found, or not enough sellable stock             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use shopkeep_core::validation::{validate_product, validate_search_query, validate_stock_delta};
use shopkeep_core::{CoreError, Product, ValidationError, MAX_STOCK, MAX_STOCK_DELTA};

use super::{begin_write, like_pattern, page_limit};
use crate::error::{DbError, DbResult};

/// Query parameters for product listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Matches name or SKU (substring) or barcode (exact).
    pub q: Option<String>,
    pub category: Option<String>,
    pub is_basket: Option<bool>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let results = repo.search(&ProductFilter { q: Some("cesta".into()), ..Default::default() }).await?;
/// let product = repo.get_by_id("uuid-here").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
    store_id: String,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        ProductRepository { pool, store_id }
    }

    /// Lists products matching the filter, ordered by name.
    ///
    /// An empty query lists every (active) product.
    pub async fn search(&self, filter: &ProductFilter) -> DbResult<Vec<Product>> {
        let query = match filter.q.as_deref() {
            Some(q) => validate_search_query(q)?,
            None => String::new(),
        };
        let (pattern, exact) = if query.is_empty() {
            (None, None)
        } else {
            (Some(like_pattern(&query)), Some(query.clone()))
        };
        let category = filter
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());

        debug!(query = %query, ?category, is_basket = ?filter.is_basket, "Searching products");

        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE store_id = ?1
              AND (?2 OR is_active = 1)
              AND (?3 IS NULL OR name LIKE ?3 ESCAPE '\' OR sku LIKE ?3 ESCAPE '\' OR barcode = ?4)
              AND (?5 IS NULL OR is_basket = ?5)
              AND (?6 IS NULL OR category = ?6)
            ORDER BY name COLLATE NOCASE
            LIMIT ?7
            "#,
        )
        .bind(&self.store_id)
        .bind(filter.include_inactive)
        .bind(pattern)
        .bind(exact)
        .bind(filter.is_basket)
        .bind(category)
        .bind(page_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found (active or not)
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, &self.store_id, id).await
    }

    /// Like [`get_by_id`](Self::get_by_id) but missing products are an error.
    pub async fn require(&self, id: &str) -> DbResult<Product> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE store_id = ?1 AND sku = ?2",
        )
        .bind(&self.store_id)
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Loads several products at once. Missing IDs are simply absent.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_many(&mut conn, &self.store_id, ids).await
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::UniqueViolation)` - SKU already exists in this store
    pub async fn insert(&self, product: &Product) -> DbResult<Product> {
        validate_product(product)?;
        debug!(sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, store_id, sku, barcode, name, description, category, unit,
                cost_cents, price_cents, card_price_cents,
                stock, prove_stock, min_stock,
                is_basket, photo_path, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19
            )
            "#,
        )
        .bind(&product.id)
        .bind(&self.store_id)
        .bind(product.sku.trim())
        .bind(&product.barcode)
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.unit.trim())
        .bind(product.cost_cents)
        .bind(product.price_cents)
        .bind(product.card_price_cents)
        .bind(product.stock)
        .bind(product.prove_stock)
        .bind(product.min_stock)
        .bind(product.is_basket)
        .bind(&product.photo_path)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("sku", &product.sku))?;

        info!(id = %product.id, sku = %product.sku, "Product created");
        self.require(&product.id).await
    }

    /// Updates a product's descriptive fields, prices and stock thresholds.
    ///
    /// `stock` only changes through [`adjust_stock`](Self::adjust_stock) and
    /// `photo_path` through [`set_photo`](Self::set_photo).
    ///
    /// ## Baskets
    /// - A basket stays a basket, and its `cost_cents` / `price_cents` are
    ///   only set by the composition; the values in `product` are ignored.
    /// - A product used as a basket component cannot become a basket.
    pub async fn update(&self, product: &Product) -> DbResult<Product> {
        debug!(id = %product.id, "Updating product");

        let mut tx = begin_write(&self.pool).await?;
        let current = fetch(&mut tx, &self.store_id, &product.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &product.id))?;

        let mut record = product.clone();
        if current.is_basket {
            record.is_basket = true;
            record.cost_cents = current.cost_cents;
            record.price_cents = current.price_cents;
        } else if record.is_basket && is_component(&mut tx, &product.id).await? {
            return Err(CoreError::InvalidBasket(format!(
                "{} is a component of another basket",
                current.sku
            ))
            .into());
        }
        validate_product(&record)?;

        sqlx::query(
            r#"
            UPDATE products SET
                sku = ?3,
                barcode = ?4,
                name = ?5,
                description = ?6,
                category = ?7,
                unit = ?8,
                cost_cents = ?9,
                price_cents = ?10,
                card_price_cents = ?11,
                prove_stock = ?12,
                min_stock = ?13,
                is_basket = ?14,
                is_active = ?15,
                updated_at = ?16
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(&record.id)
        .bind(&self.store_id)
        .bind(record.sku.trim())
        .bind(&record.barcode)
        .bind(record.name.trim())
        .bind(&record.description)
        .bind(&record.category)
        .bind(record.unit.trim())
        .bind(record.cost_cents)
        .bind(record.price_cents)
        .bind(record.card_price_cents)
        .bind(record.prove_stock)
        .bind(record.min_stock)
        .bind(record.is_basket)
        .bind(record.is_active)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(|e| DbError::from(e).on_duplicate("sku", &record.sku))?;

        let updated = fetch(&mut tx, &self.store_id, &record.id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", &record.id))?;
        tx.commit().await?;

        Ok(updated)
    }

    /// Applies a stock delta (positive restock, negative loss/correction).
    ///
    /// A negative delta may only consume sellable units: the PROVE reserve
    /// is never touched and stock never goes below zero. The delta is bounded
    /// by `MAX_STOCK_DELTA` and the result by `MAX_STOCK`.
    pub async fn adjust_stock(&self, id: &str, delta: i64) -> DbResult<Product> {
        validate_stock_delta(delta)?;
        debug!(id = %id, delta = %delta, "Adjusting stock");

        let mut conn = self.pool.acquire().await?;
        if delta > 0 {
            return_stock(&mut conn, &self.store_id, id, delta).await?;
        } else {
            let quantity = delta.checked_neg().ok_or_else(|| ValidationError::OutOfRange {
                field: "delta".to_string(),
                min: -MAX_STOCK_DELTA,
                max: MAX_STOCK_DELTA,
            })?;
            take_stock(&mut conn, &self.store_id, id, quantity).await?;
        }
        drop(conn);

        info!(id = %id, delta = %delta, "Stock adjusted");
        self.require(id).await
    }

    /// Soft-deletes a product by setting is_active = false.
    ///
    /// Historical sale items and basket compositions still reference it.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft-deleting product");

        let result = sqlx::query(
            "UPDATE products SET is_active = 0, updated_at = ?3 WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(&self.store_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Active products whose sellable stock is at or under `min_stock`.
    ///
    /// Ordered by how far below the threshold they are.
    pub async fn low_stock(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE store_id = ?1
              AND is_active = 1
              AND stock - prove_stock <= min_stock
            ORDER BY (stock - prove_stock) - min_stock, name COLLATE NOCASE
            "#,
        )
        .bind(&self.store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Sets or clears the stored photo path.
    pub async fn set_photo(&self, id: &str, photo_path: Option<&str>) -> DbResult<Product> {
        let result = sqlx::query(
            "UPDATE products SET photo_path = ?3, updated_at = ?4 WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(&self.store_id)
        .bind(photo_path)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.require(id).await
    }

    /// Counts active products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE store_id = ?1 AND is_active = 1",
        )
        .bind(&self.store_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level helpers (shared with transactional repositories)
// =============================================================================

pub(crate) async fn fetch(
    conn: &mut SqliteConnection,
    store_id: &str,
    id: &str,
) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE id = ?1 AND store_id = ?2",
    )
    .bind(id)
    .bind(store_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(product)
}

/// Whether any basket lists this product as a component.
pub(crate) async fn is_component(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
    let used: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM basket_components WHERE component_id = ?1)",
    )
    .bind(id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(used)
}

pub(crate) async fn fetch_many(
    conn: &mut SqliteConnection,
    store_id: &str,
    ids: &[String],
) -> DbResult<Vec<Product>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut builder: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM products WHERE store_id = ");
    builder.push_bind(store_id);
    builder.push(" AND id IN (");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");

    let products = builder
        .build_query_as::<Product>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(products)
}

/// Removes `quantity` sellable units, failing instead of dipping into PROVE.
pub(crate) async fn take_stock(
    conn: &mut SqliteConnection,
    store_id: &str,
    id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products SET stock = stock - ?3, updated_at = ?4
        WHERE id = ?1 AND store_id = ?2 AND stock - prove_stock >= ?3
        "#,
    )
    .bind(id)
    .bind(store_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(match fetch(conn, store_id, id).await? {
            None => DbError::not_found("Product", id),
            Some(product) => CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.sellable_stock(),
                requested: quantity,
            }
            .into(),
        });
    }

    Ok(())
}

/// Adds `quantity` units, refusing to push stock past `MAX_STOCK`.
pub(crate) async fn return_stock(
    conn: &mut SqliteConnection,
    store_id: &str,
    id: &str,
    quantity: i64,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE products SET stock = stock + ?3, updated_at = ?4
        WHERE id = ?1 AND store_id = ?2 AND stock <= ?5 - ?3
        "#,
    )
    .bind(id)
    .bind(store_id)
    .bind(quantity)
    .bind(Utc::now())
    .bind(MAX_STOCK)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(match fetch(conn, store_id, id).await? {
            None => DbError::not_found("Product", id),
            Some(_) => ValidationError::OutOfRange {
                field: "stock".to_string(),
                min: 0,
                max: MAX_STOCK,
            }
            .into(),
        });
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, insert_product, product, stock_of};

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = db().await;
        let inserted = insert_product(&db, "CAFE-250", 800, 1500, 10).await;

        let found = db.products().get_by_id(&inserted.id).await.unwrap().unwrap();
        assert_eq!(found.sku, "CAFE-250");
        assert_eq!(found.price_cents, 1500);
        assert!(found.is_active);

        let by_sku = db.products().get_by_sku("CAFE-250").await.unwrap().unwrap();
        assert_eq!(by_sku.id, inserted.id);
        assert!(db.products().get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = db().await;
        insert_product(&db, "CAFE-250", 800, 1500, 10).await;

        let err = db
            .products()
            .insert(&product("CAFE-250", 100, 200, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_insert_validates_record() {
        let db = db().await;
        let mut bad = product("BAD", 2000, 1000, 1);
        assert!(matches!(
            db.products().insert(&bad).await,
            Err(DbError::Business(CoreError::Validation(_)))
        ));

        bad.cost_cents = 100;
        bad.sku = "has space".to_string();
        assert!(db.products().insert(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_search_matches_name_sku_and_barcode() {
        let db = db().await;
        let mut coffee = product("CAFE-250", 800, 1500, 10);
        coffee.name = "Café Torrado 250g".to_string();
        coffee.barcode = Some("7891234567890".to_string());
        db.products().insert(&coffee).await.unwrap();
        insert_product(&db, "CHA-MATE", 300, 700, 5).await;
        let mut juice = product("SUCO-100", 300, 700, 5);
        juice.name = "Suco 100% Natural".to_string();
        db.products().insert(&juice).await.unwrap();

        let repo = db.products();
        let by_name = repo
            .search(&ProductFilter { q: Some("torrado".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].sku, "CAFE-250");

        let by_barcode = repo
            .search(&ProductFilter { q: Some("7891234567890".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(by_barcode.len(), 1);

        // '%' in the query matches literally
        let literal = repo
            .search(&ProductFilter { q: Some("100%".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(literal.len(), 1);
        assert_eq!(literal[0].sku, "SUCO-100");

        let all = repo.search(&ProductFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_search() {
        let db = db().await;
        let p = insert_product(&db, "CAFE-250", 800, 1500, 10).await;
        let repo = db.products();

        repo.soft_delete(&p.id).await.unwrap();

        assert!(repo.search(&ProductFilter::default()).await.unwrap().is_empty());
        let with_inactive = repo
            .search(&ProductFilter { include_inactive: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(with_inactive.len(), 1);
        assert!(!repo.get_by_id(&p.id).await.unwrap().unwrap().is_active);
        assert!(matches!(repo.soft_delete("missing").await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_update_keeps_stock() {
        let db = db().await;
        let mut p = insert_product(&db, "CAFE-250", 800, 1500, 10).await;

        p.name = "Café Especial".to_string();
        p.price_cents = 1800;
        p.stock = 999; // ignored
        p.prove_stock = 2;
        let updated = db.products().update(&p).await.unwrap();

        assert_eq!(updated.name, "Café Especial");
        assert_eq!(updated.price_cents, 1800);
        assert_eq!(updated.stock, 10);
        assert_eq!(updated.prove_stock, 2);
    }

    #[tokio::test]
    async fn test_update_cannot_reserve_more_than_stock() {
        let db = db().await;
        let mut p = insert_product(&db, "CAFE-250", 800, 1500, 3).await;

        // Record claims enough stock, the row does not: the CHECK constraint wins
        p.stock = 50;
        p.prove_stock = 5;
        assert!(matches!(
            db.products().update(&p).await,
            Err(DbError::CheckViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_adjust_stock_guards_prove_reserve() {
        let db = db().await;
        let mut p = insert_product(&db, "CAFE-250", 800, 1500, 10).await;
        p.prove_stock = 4;
        db.products().update(&p).await.unwrap();
        let repo = db.products();

        assert_eq!(repo.adjust_stock(&p.id, 5).await.unwrap().stock, 15);
        assert_eq!(repo.adjust_stock(&p.id, -11).await.unwrap().stock, 4);

        let err = repo.adjust_stock(&p.id, -1).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Business(CoreError::InsufficientStock { available: 0, requested: 1, .. })
        ));
        assert_eq!(stock_of(&db, &p.id).await, 4);

        assert!(repo.adjust_stock(&p.id, 0).await.is_err());
        assert!(matches!(repo.adjust_stock("missing", 1).await, Err(DbError::NotFound { .. })));
        assert!(matches!(repo.adjust_stock("missing", -1).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_extreme_deltas() {
        let db = db().await;
        let p = insert_product(&db, "CAFE-250", 800, 1500, 10).await;
        let repo = db.products();

        for delta in [i64::MAX, i64::MIN, MAX_STOCK_DELTA + 1, -MAX_STOCK_DELTA - 1] {
            assert!(matches!(
                repo.adjust_stock(&p.id, delta).await,
                Err(DbError::Business(CoreError::Validation(ValidationError::OutOfRange { .. })))
            ));
        }

        // The row is untouched and still readable
        let reread = repo.require(&p.id).await.unwrap();
        assert_eq!(reread.stock, 10);
        assert_eq!(repo.search(&ProductFilter::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_adjust_stock_respects_stock_cap() {
        let db = db().await;
        let p = insert_product(&db, "GRAO", 1, 2, MAX_STOCK - 5).await;
        let repo = db.products();

        assert!(matches!(
            repo.adjust_stock(&p.id, 6).await,
            Err(DbError::Business(CoreError::Validation(ValidationError::OutOfRange { .. })))
        ));
        assert_eq!(repo.adjust_stock(&p.id, 5).await.unwrap().stock, MAX_STOCK);

        let mut too_many = product("DEMAIS", 1, 2, MAX_STOCK + 1);
        too_many.min_stock = 0;
        assert!(repo.insert(&too_many).await.is_err());
    }

    #[tokio::test]
    async fn test_low_stock_uses_sellable_units() {
        let db = db().await;
        let mut reserved = product("RESERVADO", 100, 200, 10);
        reserved.prove_stock = 8;
        reserved.min_stock = 3;
        db.products().insert(&reserved).await.unwrap();

        let mut healthy = product("OK", 100, 200, 50);
        healthy.min_stock = 3;
        db.products().insert(&healthy).await.unwrap();

        let low = db.products().low_stock().await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "RESERVADO");
    }

    #[tokio::test]
    async fn test_get_many_and_photo() {
        let db = db().await;
        let a = insert_product(&db, "A", 100, 200, 1).await;
        let b = insert_product(&db, "B", 100, 200, 1).await;

        let found = db
            .products()
            .get_many(&[a.id.clone(), b.id.clone(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(db.products().get_many(&[]).await.unwrap().is_empty());

        let with_photo = db.products().set_photo(&a.id, Some("products/a.png")).await.unwrap();
        assert_eq!(with_photo.photo_path.as_deref(), Some("products/a.png"));
        let cleared = db.products().set_photo(&a.id, None).await.unwrap();
        assert!(cleared.photo_path.is_none());
        assert_eq!(db.products().count().await.unwrap(), 2);
    }
}
