//! # Sale Repository
//!
//! Database operations for sales, donations and sale items.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. QUOTE (read only)                                                  │
//! │     └── quote() → SaleQuote   (client shows totals while editing)      │
//! │                                                                         │
//! │  2. CREATE (one transaction)                                           │
//! │     ├── load products, re-quote with fresh prices and stock            │
//! │     ├── next receipt number for the day                                │
//! │     ├── INSERT sale + sale_items (product snapshot)                    │
//! │     └── guarded stock decrement per line                               │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL (one transaction)                                │
//! │     ├── status = cancelled                                             │
//! │     └── stock += item quantities                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use shopkeep_core::cart::{quote, Cart, Discount, QuoteOptions, SaleQuote};
use shopkeep_core::validation::{validate_optional_text, validate_quantity};
use shopkeep_core::{
    CoreError, DateRange, PaymentMethod, RecordType, Sale, SaleItem, SaleStatus, MAX_CART_ITEMS,
};

use super::product::{fetch_many, return_stock, take_stock};
use super::{begin_write, generate_id, page_limit, today};
use crate::error::{DbError, DbResult};

/// One requested cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineInput {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything needed to record a sale or donation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSale {
    pub lines: Vec<SaleLineInput>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub record_type: RecordType,
    #[serde(default)]
    pub discount: Discount,
    pub customer_id: Option<String>,
    pub notes: Option<String>,
    /// Business date; defaults to today.
    pub sold_on: Option<NaiveDate>,
}

/// A sale with its items.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

/// Query parameters for sale listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaleFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub status: Option<SaleStatus>,
    pub record_type: Option<RecordType>,
    pub limit: Option<u32>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
    store_id: String,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        SaleRepository { pool, store_id }
    }

    /// Prices a cart against current product data without recording anything.
    pub async fn quote(&self, lines: &[SaleLineInput], options: &QuoteOptions) -> DbResult<SaleQuote> {
        let mut conn = self.pool.acquire().await?;
        let cart = build_cart(&mut conn, &self.store_id, lines).await?;
        Ok(quote(&cart, options)?)
    }

    /// Records a sale or donation and decrements stock, atomically.
    ///
    /// ## Errors
    /// - `EmptyCart`, `QuantityTooLarge`, `CartTooLarge`
    /// - `InsufficientStock` when any line exceeds sellable stock
    /// - `NotFound` for unknown products or customer
    pub async fn create(&self, new_sale: &NewSale, card_surcharge_bps: u32) -> DbResult<SaleDetail> {
        validate_optional_text("notes", new_sale.notes.as_deref(), 500)?;
        let options = QuoteOptions {
            payment_method: new_sale.payment_method,
            record_type: new_sale.record_type,
            discount: new_sale.discount,
            card_surcharge_bps,
        };
        let sold_on = new_sale.sold_on.unwrap_or_else(today);
        debug!(lines = new_sale.lines.len(), record_type = %new_sale.record_type, "Creating sale");

        let mut tx = begin_write(&self.pool).await?;

        if let Some(customer_id) = new_sale.customer_id.as_deref() {
            let exists: Option<i64> =
                sqlx::query_scalar("SELECT 1 FROM customers WHERE id = ?1 AND store_id = ?2")
                    .bind(customer_id)
                    .bind(&self.store_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            if exists.is_none() {
                return Err(DbError::not_found("Customer", customer_id));
            }
        }

        let cart = build_cart(&mut tx, &self.store_id, &new_sale.lines).await?;
        let priced = quote(&cart, &options)?;
        let now = Utc::now();

        let sale = Sale {
            id: generate_id(),
            store_id: self.store_id.clone(),
            receipt_number: next_receipt_number(&mut tx, &self.store_id, sold_on).await?,
            record_type: priced.record_type,
            status: SaleStatus::Completed,
            payment_method: priced.payment_method,
            customer_id: new_sale.customer_id.clone(),
            subtotal_cents: priced.subtotal.cents(),
            discount_cents: priced.discount.cents(),
            total_cents: priced.total.cents(),
            cost_total_cents: priced.cost_total.cents(),
            notes: new_sale.notes.clone(),
            sold_on,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, store_id, receipt_number, record_type, status, payment_method,
                customer_id, subtotal_cents, discount_cents, total_cents, cost_total_cents,
                notes, sold_on, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.store_id)
        .bind(&sale.receipt_number)
        .bind(sale.record_type)
        .bind(sale.status)
        .bind(sale.payment_method)
        .bind(&sale.customer_id)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.cost_total_cents)
        .bind(&sale.notes)
        .bind(sale.sold_on)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(priced.lines.len());
        for line in &priced.lines {
            let item = SaleItem {
                id: generate_id(),
                sale_id: sale.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                unit_price_cents: line.unit_price.cents(),
                unit_cost_cents: line.unit_cost.cents(),
                quantity: line.quantity,
                line_total_cents: line.line_total.cents(),
                is_basket: line.is_basket,
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, sku_snapshot, name_snapshot,
                    unit_price_cents, unit_cost_cents, quantity, line_total_cents,
                    is_basket, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&item.id)
            .bind(&item.sale_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.unit_price_cents)
            .bind(item.unit_cost_cents)
            .bind(item.quantity)
            .bind(item.line_total_cents)
            .bind(item.is_basket)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            // The quote saw enough stock; the guard catches a concurrent sale
            take_stock(&mut tx, &self.store_id, &item.product_id, item.quantity).await?;
            items.push(item);
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            receipt = %sale.receipt_number,
            record_type = %sale.record_type,
            total = sale.total_cents,
            items = items.len(),
            "Sale recorded"
        );
        Ok(SaleDetail { sale, items })
    }

    /// Gets a sale with its items.
    pub async fn get(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(sale) = fetch_sale(&mut conn, &self.store_id, id).await? else {
            return Ok(None);
        };
        let items = item_rows(&mut conn, id).await?;
        Ok(Some(SaleDetail { sale, items }))
    }

    /// Lists sales, newest business date first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(CoreError::InvalidDateRange(format!("start {} is after end {}", from, to)).into());
            }
        }

        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE store_id = ?1
              AND (?2 IS NULL OR sold_on >= ?2)
              AND (?3 IS NULL OR sold_on <= ?3)
              AND (?4 IS NULL OR customer_id = ?4)
              AND (?5 IS NULL OR status = ?5)
              AND (?6 IS NULL OR record_type = ?6)
            ORDER BY sold_on DESC, created_at DESC
            LIMIT ?7
            "#,
        )
        .bind(&self.store_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(&filter.customer_id)
        .bind(filter.status)
        .bind(filter.record_type)
        .bind(page_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Every sale and sale item whose business date is in `range`.
    ///
    /// Feeds the dashboard; cancelled sales are included and filtered there.
    pub async fn in_range(&self, range: &DateRange) -> DbResult<(Vec<Sale>, Vec<SaleItem>)> {
        let sales = sqlx::query_as::<_, Sale>(
            "SELECT * FROM sales WHERE store_id = ?1 AND sold_on BETWEEN ?2 AND ?3 ORDER BY sold_on, created_at",
        )
        .bind(&self.store_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT i.* FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            WHERE s.store_id = ?1 AND s.sold_on BETWEEN ?2 AND ?3
            ORDER BY i.rowid
            "#,
        )
        .bind(&self.store_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        debug!(sales = sales.len(), items = items.len(), "Loaded sales for range");
        Ok((sales, items))
    }

    /// Cancels a completed sale and puts its items back in stock.
    pub async fn cancel(&self, id: &str) -> DbResult<SaleDetail> {
        debug!(sale_id = %id, "Cancelling sale");

        let mut tx = begin_write(&self.pool).await?;
        let sale = fetch_sale(&mut tx, &self.store_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        if sale.status == SaleStatus::Cancelled {
            return Err(CoreError::InvalidStatus {
                entity: "Sale".to_string(),
                id: id.to_string(),
                status: sale.status.to_string(),
            }
            .into());
        }

        let items = item_rows(&mut tx, id).await?;
        for item in &items {
            return_stock(&mut tx, &self.store_id, &item.product_id, item.quantity).await?;
        }

        let now = Utc::now();
        sqlx::query("UPDATE sales SET status = ?2, cancelled_at = ?3, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(SaleStatus::Cancelled)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let sale = fetch_sale(&mut tx, &self.store_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))?;
        tx.commit().await?;

        info!(sale_id = %id, receipt = %sale.receipt_number, "Sale cancelled, stock restored");
        Ok(SaleDetail { sale, items })
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Loads the products behind the requested lines into a cart.
async fn build_cart(conn: &mut SqliteConnection, store_id: &str, lines: &[SaleLineInput]) -> DbResult<Cart> {
    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS }.into());
    }
    for line in lines {
        validate_quantity(line.quantity)?;
    }

    let ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
    let products = fetch_many(conn, store_id, &ids).await?;

    let mut cart = Cart::new();
    for line in lines {
        let product = products
            .iter()
            .find(|p| p.id == line.product_id)
            .ok_or_else(|| DbError::not_found("Product", &line.product_id))?;
        if !product.is_active {
            return Err(CoreError::ProductNotFound(product.sku.clone()).into());
        }
        cart.add(product, line.quantity)?;
    }

    Ok(cart)
}

/// Next `YYYYMMDD-NNNN` receipt number for the business date.
async fn next_receipt_number(conn: &mut SqliteConnection, store_id: &str, day: NaiveDate) -> DbResult<String> {
    let day_key = day.format("%Y%m%d").to_string();
    let seq: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO receipt_counters (store_id, day, last_seq) VALUES (?1, ?2, 1)
        ON CONFLICT (store_id, day) DO UPDATE SET last_seq = last_seq + 1
        RETURNING last_seq
        "#,
    )
    .bind(store_id)
    .bind(&day_key)
    .fetch_one(&mut *conn)
    .await?;

    Ok(format!("{}-{:04}", day_key, seq))
}

async fn fetch_sale(conn: &mut SqliteConnection, store_id: &str, id: &str) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1 AND store_id = ?2")
        .bind(id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(sale)
}

async fn item_rows(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
    let items = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY rowid")
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

    Ok(items)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::repository::test_support::{d, db, insert_product, product, stock_of};
    use crate::{Database, DbConfig};
    use shopkeep_core::Money;

    fn line(product_id: &str, quantity: i64) -> SaleLineInput {
        SaleLineInput {
            product_id: product_id.to_string(),
            quantity,
        }
    }

    fn sale_of(lines: Vec<SaleLineInput>) -> NewSale {
        NewSale {
            lines,
            sold_on: Some(d("2026-05-10")),
            ..NewSale::default()
        }
    }

    #[tokio::test]
    async fn test_create_sale_snapshots_and_decrements() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let tea = insert_product(&db, "CHA", 300, 700, 5).await;

        let detail = db
            .sales()
            .create(&sale_of(vec![line(&coffee.id, 2), line(&tea.id, 1)]), 0)
            .await
            .unwrap();

        assert_eq!(detail.sale.subtotal_cents, 3700);
        assert_eq!(detail.sale.total_cents, 3700);
        assert_eq!(detail.sale.cost_total_cents, 1900);
        assert_eq!(detail.sale.receipt_number, "20260510-0001");
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].sku_snapshot, "CAFE");
        assert_eq!(detail.items[0].line_total_cents, 3000);

        assert_eq!(stock_of(&db, &coffee.id).await, 8);
        assert_eq!(stock_of(&db, &tea.id).await, 4);

        let loaded = db.sales().get(&detail.sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.items.len(), 2);
    }

    #[tokio::test]
    async fn test_card_price_and_discount() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1000, 10).await;

        let mut new_sale = sale_of(vec![line(&coffee.id, 2)]);
        new_sale.payment_method = PaymentMethod::CreditCard;
        new_sale.discount = Discount::Fixed(Money::from_cents(100_000));

        // 5% surcharge: 1050 × 2; fixed discount capped at subtotal
        let detail = db.sales().create(&new_sale, 500).await.unwrap();
        assert_eq!(detail.sale.subtotal_cents, 2100);
        assert_eq!(detail.sale.discount_cents, 2100);
        assert_eq!(detail.sale.total_cents, 0);
    }

    #[tokio::test]
    async fn test_donation_has_zero_revenue_but_cost() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;

        let mut new_sale = sale_of(vec![line(&coffee.id, 3)]);
        new_sale.record_type = RecordType::Donation;
        new_sale.discount = Discount::Percentage(1000);

        let detail = db.sales().create(&new_sale, 0).await.unwrap();
        assert_eq!(detail.sale.total_cents, 0);
        assert_eq!(detail.sale.discount_cents, 0);
        assert_eq!(detail.sale.cost_total_cents, 2400);
        assert_eq!(detail.items[0].unit_price_cents, 0);
        assert_eq!(stock_of(&db, &coffee.id).await, 7);
    }

    #[tokio::test]
    async fn test_insufficient_stock_records_nothing() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let mut reserved = product("RESERVA", 100, 200, 5);
        reserved.prove_stock = 4;
        let reserved = db.products().insert(&reserved).await.unwrap();

        let err = db
            .sales()
            .create(&sale_of(vec![line(&coffee.id, 1), line(&reserved.id, 2)]), 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Business(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));

        assert_eq!(stock_of(&db, &coffee.id).await, 10);
        assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_carts() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let repo = db.sales();

        assert!(matches!(
            repo.create(&sale_of(vec![]), 0).await,
            Err(DbError::Business(CoreError::EmptyCart))
        ));
        assert!(matches!(
            repo.create(&sale_of(vec![line("missing", 1)]), 0).await,
            Err(DbError::NotFound { .. })
        ));
        assert!(repo.create(&sale_of(vec![line(&coffee.id, 0)]), 0).await.is_err());

        let mut with_customer = sale_of(vec![line(&coffee.id, 1)]);
        with_customer.customer_id = Some("missing".to_string());
        assert!(matches!(
            repo.create(&with_customer, 0).await,
            Err(DbError::NotFound { ref entity, .. }) if entity == "Customer"
        ));

        db.products().soft_delete(&coffee.id).await.unwrap();
        assert!(matches!(
            repo.create(&sale_of(vec![line(&coffee.id, 1)]), 0).await,
            Err(DbError::Business(CoreError::ProductNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_receipt_numbers_are_sequential_per_day() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let repo = db.sales();

        let first = repo.create(&sale_of(vec![line(&coffee.id, 1)]), 0).await.unwrap();
        let second = repo.create(&sale_of(vec![line(&coffee.id, 1)]), 0).await.unwrap();
        let mut next_day = sale_of(vec![line(&coffee.id, 1)]);
        next_day.sold_on = Some(d("2026-05-11"));
        let third = repo.create(&next_day, 0).await.unwrap();

        assert_eq!(first.sale.receipt_number, "20260510-0001");
        assert_eq!(second.sale.receipt_number, "20260510-0002");
        assert_eq!(third.sale.receipt_number, "20260511-0001");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("shop.db")).max_connections(8))
            .await
            .unwrap();
        let coffee = insert_product(&db, "CAFE", 800, 1500, 100).await;

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let db = db.clone();
                let id = coffee.id.clone();
                tokio::spawn(async move { db.sales().create(&sale_of(vec![line(&id, 1)]), 0).await })
            })
            .collect();

        let mut receipts = HashSet::new();
        for task in tasks {
            let detail = task.await.unwrap().unwrap();
            receipts.insert(detail.sale.receipt_number);
        }

        assert_eq!(receipts.len(), 40);
        assert_eq!(stock_of(&db, &coffee.id).await, 60);
        db.close().await;
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_once() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let repo = db.sales();
        let detail = repo.create(&sale_of(vec![line(&coffee.id, 4)]), 0).await.unwrap();

        let cancelled = repo.cancel(&detail.sale.id).await.unwrap();
        assert_eq!(cancelled.sale.status, SaleStatus::Cancelled);
        assert!(cancelled.sale.cancelled_at.is_some());
        assert_eq!(stock_of(&db, &coffee.id).await, 10);

        assert!(matches!(
            repo.cancel(&detail.sale.id).await,
            Err(DbError::Business(CoreError::InvalidStatus { .. }))
        ));
        assert_eq!(stock_of(&db, &coffee.id).await, 10);
        assert!(matches!(repo.cancel("missing").await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_and_range() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 20).await;
        let repo = db.sales();

        for day in ["2026-05-01", "2026-05-10", "2026-05-20"] {
            let mut s = sale_of(vec![line(&coffee.id, 1)]);
            s.sold_on = Some(d(day));
            repo.create(&s, 0).await.unwrap();
        }

        let filter = SaleFilter {
            from: Some(d("2026-05-05")),
            to: Some(d("2026-05-31")),
            ..SaleFilter::default()
        };
        let listed = repo.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].sold_on, d("2026-05-20"));

        let backwards = SaleFilter {
            from: Some(d("2026-05-31")),
            to: Some(d("2026-05-01")),
            ..SaleFilter::default()
        };
        assert!(repo.list(&backwards).await.is_err());

        let range = DateRange::new(d("2026-05-01"), d("2026-05-10")).unwrap();
        let (sales, items) = repo.in_range(&range).await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_quote_reads_without_writing() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;

        let quote = db
            .sales()
            .quote(&[line(&coffee.id, 2), line(&coffee.id, 1)], &QuoteOptions::default())
            .await
            .unwrap();
        assert_eq!(quote.lines.len(), 1);
        assert_eq!(quote.item_count, 3);
        assert_eq!(quote.total.cents(), 4500);
        assert_eq!(stock_of(&db, &coffee.id).await, 10);
    }
}
