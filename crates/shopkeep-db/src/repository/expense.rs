//! # Expense Repository
//!
//! Expenses and recurring-series generation.
//!
//! ## Recurring Series
//! ```text
//! template (recurrence = monthly, series_id = NULL, due 2026-01-31)
//!    ├── occurrence (recurrence = none, series_id = template, due 2026-02-28)
//!    ├── occurrence (recurrence = none, series_id = template, due 2026-03-31)
//!    └── ...
//! ```
//! The template is itself the first occurrence. `(series_id, due_date)` is
//! unique, so generation can run any number of times.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use shopkeep_core::recurrence::pending_occurrences;
use shopkeep_core::validation::validate_expense;
use shopkeep_core::{CoreError, DateRange, Expense, Recurrence};

use super::{begin_write, generate_id, page_limit};
use crate::error::{DbError, DbResult};

/// Query parameters for expense listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpenseFilter {
    /// Due date lower bound (inclusive).
    pub from: Option<NaiveDate>,
    /// Due date upper bound (inclusive).
    pub to: Option<NaiveDate>,
    pub paid: Option<bool>,
    pub category: Option<String>,
    pub limit: Option<u32>,
}

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
    store_id: String,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        ExpenseRepository { pool, store_id }
    }

    /// Lists expenses by due date, soonest first.
    pub async fn list(&self, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            r#"
            SELECT * FROM expenses
            WHERE store_id = ?1
              AND (?2 IS NULL OR due_date >= ?2)
              AND (?3 IS NULL OR due_date <= ?3)
              AND (?4 IS NULL OR (paid_on IS NOT NULL) = ?4)
              AND (?5 IS NULL OR category = ?5)
            ORDER BY due_date, description COLLATE NOCASE
            LIMIT ?6
            "#,
        )
        .bind(&self.store_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.paid)
        .bind(filter.category.as_deref().map(str::trim))
        .bind(page_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Every expense due within `range`, for reports.
    pub async fn in_range(&self, range: &DateRange) -> DbResult<Vec<Expense>> {
        let expenses = sqlx::query_as::<_, Expense>(
            "SELECT * FROM expenses WHERE store_id = ?1 AND due_date BETWEEN ?2 AND ?3 ORDER BY due_date",
        )
        .bind(&self.store_id)
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, &self.store_id, id).await
    }

    pub async fn require(&self, id: &str) -> DbResult<Expense> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Expense", id))
    }

    /// Inserts an expense. A recurring expense becomes the template of its series.
    pub async fn insert(&self, expense: &Expense) -> DbResult<Expense> {
        validate_expense(expense)?;
        debug!(description = %expense.description, recurrence = %expense.recurrence, "Inserting expense");

        let mut conn = self.pool.acquire().await?;
        insert_row(&mut conn, &self.store_id, expense).await?;
        drop(conn);

        info!(id = %expense.id, amount = expense.amount_cents, "Expense created");
        self.require(&expense.id).await
    }

    /// Updates an expense. The series link is never changed here.
    pub async fn update(&self, expense: &Expense) -> DbResult<Expense> {
        validate_expense(expense)?;
        debug!(id = %expense.id, "Updating expense");

        let result = sqlx::query(
            r#"
            UPDATE expenses SET
                description = ?3,
                category = ?4,
                amount_cents = ?5,
                due_date = ?6,
                paid_on = ?7,
                recurrence = ?8,
                recurrence_end = ?9,
                notes = ?10,
                updated_at = ?11
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(&expense.id)
        .bind(&self.store_id)
        .bind(expense.description.trim())
        .bind(expense.category.trim())
        .bind(expense.amount_cents)
        .bind(expense.due_date)
        .bind(expense.paid_on)
        .bind(expense.recurrence)
        .bind(expense.recurrence_end)
        .bind(&expense.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", &expense.id));
        }

        self.require(&expense.id).await
    }

    /// Deletes an expense. Occurrences of a deleted template keep existing,
    /// detached from the series.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1 AND store_id = ?2")
            .bind(id)
            .bind(&self.store_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", id));
        }

        info!(id = %id, "Expense deleted");
        Ok(())
    }

    /// Marks an unpaid expense as paid on `paid_on`.
    pub async fn pay(&self, id: &str, paid_on: NaiveDate) -> DbResult<Expense> {
        let result = sqlx::query(
            r#"
            UPDATE expenses SET paid_on = ?3, updated_at = ?4
            WHERE id = ?1 AND store_id = ?2 AND paid_on IS NULL
            "#,
        )
        .bind(id)
        .bind(&self.store_id)
        .bind(paid_on)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let expense = self.require(id).await?;
            return Err(CoreError::InvalidStatus {
                entity: "Expense".to_string(),
                id: id.to_string(),
                status: format!("paid on {}", expense.paid_on.unwrap_or(paid_on)),
            }
            .into());
        }

        info!(id = %id, %paid_on, "Expense paid");
        self.require(id).await
    }

    /// Creates the missing occurrences of every recurring series up to `until`.
    ///
    /// Returns only the occurrences created by this call.
    pub async fn generate_recurring(&self, until: NaiveDate) -> DbResult<Vec<Expense>> {
        debug!(%until, "Generating recurring expenses");

        let mut tx = begin_write(&self.pool).await?;

        let templates = sqlx::query_as::<_, Expense>(
            r#"
            SELECT * FROM expenses
            WHERE store_id = ?1 AND recurrence != 'none' AND series_id IS NULL AND due_date <= ?2
            ORDER BY due_date
            "#,
        )
        .bind(&self.store_id)
        .bind(until)
        .fetch_all(&mut *tx)
        .await?;

        let mut created = Vec::new();
        for template in &templates {
            let existing: Vec<NaiveDate> =
                sqlx::query_scalar("SELECT due_date FROM expenses WHERE series_id = ?1")
                    .bind(&template.id)
                    .fetch_all(&mut *tx)
                    .await?;

            for due_date in pending_occurrences(template, &existing, until) {
                let now = Utc::now();
                let occurrence = Expense {
                    id: generate_id(),
                    store_id: self.store_id.clone(),
                    description: template.description.clone(),
                    category: template.category.clone(),
                    amount_cents: template.amount_cents,
                    due_date,
                    paid_on: None,
                    recurrence: Recurrence::None,
                    recurrence_end: None,
                    series_id: Some(template.id.clone()),
                    notes: template.notes.clone(),
                    created_at: now,
                    updated_at: now,
                };
                insert_row(&mut tx, &self.store_id, &occurrence).await?;
                created.push(occurrence);
            }
        }

        tx.commit().await?;

        info!(templates = templates.len(), created = created.len(), %until, "Recurring expenses generated");
        Ok(created)
    }
}

async fn fetch(conn: &mut SqliteConnection, store_id: &str, id: &str) -> DbResult<Option<Expense>> {
    let expense = sqlx::query_as::<_, Expense>("SELECT * FROM expenses WHERE id = ?1 AND store_id = ?2")
        .bind(id)
        .bind(store_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(expense)
}

async fn insert_row(conn: &mut SqliteConnection, store_id: &str, expense: &Expense) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO expenses (
            id, store_id, description, category, amount_cents, due_date, paid_on,
            recurrence, recurrence_end, series_id, notes, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&expense.id)
    .bind(store_id)
    .bind(expense.description.trim())
    .bind(expense.category.trim())
    .bind(expense.amount_cents)
    .bind(expense.due_date)
    .bind(expense.paid_on)
    .bind(expense.recurrence)
    .bind(expense.recurrence_end)
    .bind(&expense.series_id)
    .bind(&expense.notes)
    .bind(expense.created_at)
    .bind(expense.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{d, db};
    use shopkeep_core::DEFAULT_STORE_ID;

    fn expense(description: &str, due: &str, recurrence: Recurrence) -> Expense {
        let now = Utc::now();
        Expense {
            id: generate_id(),
            store_id: DEFAULT_STORE_ID.to_string(),
            description: description.to_string(),
            category: "Aluguel".to_string(),
            amount_cents: 150_000,
            due_date: d(due),
            paid_on: None,
            recurrence,
            recurrence_end: None,
            series_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_generate_recurring_clamps_and_is_idempotent() {
        let db = db().await;
        let repo = db.expenses();
        let rent = repo
            .insert(&expense("Aluguel da loja", "2026-01-31", Recurrence::Monthly))
            .await
            .unwrap();

        let created = repo.generate_recurring(d("2026-04-30")).await.unwrap();
        let dates: Vec<NaiveDate> = created.iter().map(|e| e.due_date).collect();
        assert_eq!(dates, vec![d("2026-02-28"), d("2026-03-31"), d("2026-04-30")]);
        assert!(created.iter().all(|e| e.series_id.as_deref() == Some(rent.id.as_str())));
        assert!(created.iter().all(|e| e.recurrence == Recurrence::None));

        assert!(repo.generate_recurring(d("2026-04-30")).await.unwrap().is_empty());

        let more = repo.generate_recurring(d("2026-05-31")).await.unwrap();
        assert_eq!(more.len(), 1);
        assert_eq!(more[0].due_date, d("2026-05-31"));

        assert_eq!(repo.list(&ExpenseFilter::default()).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_generate_respects_recurrence_end() {
        let db = db().await;
        let repo = db.expenses();
        let mut internet = expense("Internet", "2026-01-10", Recurrence::Weekly);
        internet.recurrence_end = Some(d("2026-01-31"));
        repo.insert(&internet).await.unwrap();
        repo.insert(&expense("Compra avulsa", "2026-01-05", Recurrence::None))
            .await
            .unwrap();

        let created = repo.generate_recurring(d("2026-12-31")).await.unwrap();
        let dates: Vec<NaiveDate> = created.iter().map(|e| e.due_date).collect();
        assert_eq!(dates, vec![d("2026-01-17"), d("2026-01-24"), d("2026-01-31")]);
    }

    #[tokio::test]
    async fn test_pay_once() {
        let db = db().await;
        let repo = db.expenses();
        let bill = repo
            .insert(&expense("Energia", "2026-03-15", Recurrence::None))
            .await
            .unwrap();

        let paid = repo.pay(&bill.id, d("2026-03-14")).await.unwrap();
        assert_eq!(paid.paid_on, Some(d("2026-03-14")));

        assert!(matches!(
            repo.pay(&bill.id, d("2026-03-16")).await,
            Err(DbError::Business(CoreError::InvalidStatus { .. }))
        ));
        assert!(matches!(
            repo.pay("missing", d("2026-03-16")).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let db = db().await;
        let repo = db.expenses();
        let march = repo
            .insert(&expense("Energia", "2026-03-15", Recurrence::None))
            .await
            .unwrap();
        let mut april = expense("Embalagens", "2026-04-02", Recurrence::None);
        april.category = "Insumos".to_string();
        repo.insert(&april).await.unwrap();
        repo.pay(&march.id, d("2026-03-15")).await.unwrap();

        let unpaid = ExpenseFilter {
            paid: Some(false),
            ..ExpenseFilter::default()
        };
        let listed = repo.list(&unpaid).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].description, "Embalagens");

        let by_category = ExpenseFilter {
            category: Some("Aluguel".to_string()),
            ..ExpenseFilter::default()
        };
        assert_eq!(repo.list(&by_category).await.unwrap().len(), 1);

        let range = DateRange::new(d("2026-04-01"), d("2026-04-30")).unwrap();
        assert_eq!(repo.in_range(&range).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_validation_and_delete() {
        let db = db().await;
        let repo = db.expenses();
        let bill = repo
            .insert(&expense("Energia", "2026-03-15", Recurrence::None))
            .await
            .unwrap();

        let mut bad = bill.clone();
        bad.recurrence_end = Some(d("2026-12-31"));
        assert!(repo.update(&bad).await.is_err());

        let mut changed = bill.clone();
        changed.amount_cents = 18_990;
        assert_eq!(repo.update(&changed).await.unwrap().amount_cents, 18_990);

        repo.delete(&bill.id).await.unwrap();
        assert!(repo.get_by_id(&bill.id).await.unwrap().is_none());
        assert!(matches!(repo.delete(&bill.id).await, Err(DbError::NotFound { .. })));
    }
}
