//! # Customer Repository
//!
//! Customer CRUD with soft delete, plus purchase history.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use shopkeep_core::validation::{validate_customer, validate_search_query};
use shopkeep_core::{Customer, Sale};

use super::{like_pattern, page_limit};
use crate::error::{DbError, DbResult};

/// Query parameters for customer listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerFilter {
    /// Matches name, phone, email or document (substring).
    pub q: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
    store_id: String,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        CustomerRepository { pool, store_id }
    }

    /// Lists customers ordered by name.
    pub async fn list(&self, filter: &CustomerFilter) -> DbResult<Vec<Customer>> {
        let pattern = match filter.q.as_deref() {
            Some(q) => Some(validate_search_query(q)?)
                .filter(|q| !q.is_empty())
                .map(|q| like_pattern(&q)),
            None => None,
        };
        debug!(?pattern, "Listing customers");

        let customers = sqlx::query_as::<_, Customer>(
            r#"
            SELECT * FROM customers
            WHERE store_id = ?1
              AND (?2 OR is_active = 1)
              AND (?3 IS NULL
                   OR name LIKE ?3 ESCAPE '\'
                   OR phone LIKE ?3 ESCAPE '\'
                   OR email LIKE ?3 ESCAPE '\'
                   OR document LIKE ?3 ESCAPE '\')
            ORDER BY name COLLATE NOCASE
            LIMIT ?4
            "#,
        )
        .bind(&self.store_id)
        .bind(filter.include_inactive)
        .bind(pattern)
        .bind(page_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT * FROM customers WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(&self.store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn require(&self, id: &str) -> DbResult<Customer> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Inserts a new customer.
    pub async fn insert(&self, customer: &Customer) -> DbResult<Customer> {
        validate_customer(customer)?;
        debug!(name = %customer.name, "Inserting customer");

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, store_id, name, phone, email, document, address, notes,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&customer.id)
        .bind(&self.store_id)
        .bind(customer.name.trim())
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.document)
        .bind(&customer.address)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %customer.id, "Customer created");
        self.require(&customer.id).await
    }

    /// Updates a customer's contact details.
    pub async fn update(&self, customer: &Customer) -> DbResult<Customer> {
        validate_customer(customer)?;
        debug!(id = %customer.id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE customers SET
                name = ?3,
                phone = ?4,
                email = ?5,
                document = ?6,
                address = ?7,
                notes = ?8,
                is_active = ?9,
                updated_at = ?10
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(&customer.id)
        .bind(&self.store_id)
        .bind(customer.name.trim())
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.document)
        .bind(&customer.address)
        .bind(&customer.notes)
        .bind(customer.is_active)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", &customer.id));
        }

        self.require(&customer.id).await
    }

    /// Soft-deletes a customer. Their sales keep the reference.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE customers SET is_active = 0, updated_at = ?3 WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(&self.store_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        info!(id = %id, "Customer deactivated");
        Ok(())
    }

    /// Every sale and donation recorded for the customer, newest first.
    pub async fn history(&self, id: &str) -> DbResult<Vec<Sale>> {
        self.require(id).await?;

        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE store_id = ?1 AND customer_id = ?2
            ORDER BY sold_on DESC, created_at DESC
            "#,
        )
        .bind(&self.store_id)
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::generate_id;
    use crate::repository::test_support::{d, db, insert_product};
    use crate::{NewSale, SaleLineInput};
    use shopkeep_core::{SaleStatus, DEFAULT_STORE_ID};

    fn customer(name: &str) -> Customer {
        let now = Utc::now();
        Customer {
            id: generate_id(),
            store_id: DEFAULT_STORE_ID.to_string(),
            name: name.to_string(),
            phone: Some("(11) 98765-4321".to_string()),
            email: None,
            document: None,
            address: None,
            notes: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_update_and_search() {
        let db = db().await;
        let repo = db.customers();

        let ana = repo.insert(&customer("Ana Souza")).await.unwrap();
        repo.insert(&customer("Bruno Lima")).await.unwrap();

        let mut changed = ana.clone();
        changed.email = Some("ana@example.com".to_string());
        let updated = repo.update(&changed).await.unwrap();
        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));

        let filter = CustomerFilter {
            q: Some("example".to_string()),
            ..CustomerFilter::default()
        };
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, ana.id);

        assert_eq!(repo.list(&CustomerFilter::default()).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_invalid_customer() {
        let db = db().await;
        let mut bad = customer("  ");
        assert!(db.customers().insert(&bad).await.is_err());

        bad.name = "Carla".to_string();
        bad.email = Some("not-an-email".to_string());
        assert!(db.customers().insert(&bad).await.is_err());
    }

    #[tokio::test]
    async fn test_soft_delete_hides_customer() {
        let db = db().await;
        let repo = db.customers();
        let ana = repo.insert(&customer("Ana Souza")).await.unwrap();

        repo.soft_delete(&ana.id).await.unwrap();
        assert!(repo.list(&CustomerFilter::default()).await.unwrap().is_empty());

        let all = CustomerFilter {
            include_inactive: true,
            ..CustomerFilter::default()
        };
        assert_eq!(repo.list(&all).await.unwrap().len(), 1);
        assert!(!repo.require(&ana.id).await.unwrap().is_active);
        assert!(matches!(repo.soft_delete("missing").await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_history_lists_customer_sales() {
        let db = db().await;
        let coffee = insert_product(&db, "CAFE", 800, 1500, 10).await;
        let ana = db.customers().insert(&customer("Ana Souza")).await.unwrap();

        for day in ["2026-05-01", "2026-05-03"] {
            let new_sale = NewSale {
                lines: vec![SaleLineInput {
                    product_id: coffee.id.clone(),
                    quantity: 1,
                }],
                customer_id: Some(ana.id.clone()),
                sold_on: Some(d(day)),
                ..NewSale::default()
            };
            db.sales().create(&new_sale, 0).await.unwrap();
        }
        let anonymous = NewSale {
            lines: vec![SaleLineInput {
                product_id: coffee.id.clone(),
                quantity: 1,
            }],
            sold_on: Some(d("2026-05-02")),
            ..NewSale::default()
        };
        db.sales().create(&anonymous, 0).await.unwrap();

        let history = db.customers().history(&ana.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].sold_on, d("2026-05-03"));
        assert!(history.iter().all(|s| s.status == SaleStatus::Completed));

        assert!(matches!(
            db.customers().history("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
