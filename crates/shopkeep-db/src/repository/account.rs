//! # Account Repository
//!
//! Accounts payable and receivable.
//!
//! Status (open / overdue / settled) is never stored. Filters that need it
//! take the reference day as a parameter so results stay deterministic.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use shopkeep_core::accounts::{AccountStatus, AccountsSummary};
use shopkeep_core::validation::validate_account;
use shopkeep_core::{Account, AccountKind, CoreError};

use super::page_limit;
use crate::error::{DbError, DbResult};

/// Query parameters for account listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccountFilter {
    pub kind: Option<AccountKind>,
    pub status: Option<AccountStatus>,
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

/// Repository for account database operations.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
    store_id: String,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool, store_id: String) -> Self {
        AccountRepository { pool, store_id }
    }

    /// Lists accounts by due date. `today` decides open vs overdue.
    pub async fn list(&self, filter: &AccountFilter, today: NaiveDate) -> DbResult<Vec<Account>> {
        let status = filter.status.map(|s| s.as_str());
        debug!(kind = ?filter.kind, ?status, %today, "Listing accounts");

        let accounts = sqlx::query_as::<_, Account>(
            r#"
            SELECT * FROM accounts
            WHERE store_id = ?1
              AND (?2 IS NULL OR kind = ?2)
              AND (?3 IS NULL OR customer_id = ?3)
              AND (
                  ?4 IS NULL
                  OR (?4 = 'settled' AND settled_on IS NOT NULL)
                  OR (?4 = 'open' AND settled_on IS NULL AND due_date >= ?5)
                  OR (?4 = 'overdue' AND settled_on IS NULL AND due_date < ?5)
              )
            ORDER BY due_date, counterparty COLLATE NOCASE
            LIMIT ?6
            "#,
        )
        .bind(&self.store_id)
        .bind(filter.kind)
        .bind(&filter.customer_id)
        .bind(status)
        .bind(today)
        .bind(page_limit(filter.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Every unsettled account, soonest due first.
    pub async fn unsettled(&self) -> DbResult<Vec<Account>> {
        let accounts = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE store_id = ?1 AND settled_on IS NULL ORDER BY due_date",
        )
        .bind(&self.store_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(accounts)
    }

    /// Open and overdue totals as of `today`.
    pub async fn summary(&self, today: NaiveDate) -> DbResult<AccountsSummary> {
        let accounts = self.unsettled().await?;
        Ok(AccountsSummary::build(&accounts, today))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE id = ?1 AND store_id = ?2",
        )
        .bind(id)
        .bind(&self.store_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    pub async fn require(&self, id: &str) -> DbResult<Account> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Account", id))
    }

    pub async fn insert(&self, account: &Account) -> DbResult<Account> {
        validate_account(account)?;
        debug!(kind = %account.kind, counterparty = %account.counterparty, "Inserting account");

        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, store_id, kind, counterparty, description, amount_cents,
                due_date, settled_on, customer_id, notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&account.id)
        .bind(&self.store_id)
        .bind(account.kind)
        .bind(account.counterparty.trim())
        .bind(account.description.trim())
        .bind(account.amount_cents)
        .bind(account.due_date)
        .bind(account.settled_on)
        .bind(&account.customer_id)
        .bind(&account.notes)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        info!(id = %account.id, kind = %account.kind, amount = account.amount_cents, "Account created");
        self.require(&account.id).await
    }

    pub async fn update(&self, account: &Account) -> DbResult<Account> {
        validate_account(account)?;
        debug!(id = %account.id, "Updating account");

        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                kind = ?3,
                counterparty = ?4,
                description = ?5,
                amount_cents = ?6,
                due_date = ?7,
                settled_on = ?8,
                customer_id = ?9,
                notes = ?10,
                updated_at = ?11
            WHERE id = ?1 AND store_id = ?2
            "#,
        )
        .bind(&account.id)
        .bind(&self.store_id)
        .bind(account.kind)
        .bind(account.counterparty.trim())
        .bind(account.description.trim())
        .bind(account.amount_cents)
        .bind(account.due_date)
        .bind(account.settled_on)
        .bind(&account.customer_id)
        .bind(&account.notes)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", &account.id));
        }

        self.require(&account.id).await
    }

    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM accounts WHERE id = ?1 AND store_id = ?2")
            .bind(id)
            .bind(&self.store_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        info!(id = %id, "Account deleted");
        Ok(())
    }

    /// Settles an open account on `settled_on`.
    pub async fn settle(&self, id: &str, settled_on: NaiveDate) -> DbResult<Account> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET settled_on = ?3, updated_at = ?4
            WHERE id = ?1 AND store_id = ?2 AND settled_on IS NULL
            "#,
        )
        .bind(id)
        .bind(&self.store_id)
        .bind(settled_on)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            self.require(id).await?;
            return Err(CoreError::InvalidStatus {
                entity: "Account".to_string(),
                id: id.to_string(),
                status: AccountStatus::Settled.as_str().to_string(),
            }
            .into());
        }

        info!(id = %id, %settled_on, "Account settled");
        self.require(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::generate_id;
    use crate::repository::test_support::{d, db};
    use shopkeep_core::{Money, DEFAULT_STORE_ID};

    fn account(kind: AccountKind, amount_cents: i64, due: &str) -> Account {
        let now = Utc::now();
        Account {
            id: generate_id(),
            store_id: DEFAULT_STORE_ID.to_string(),
            kind,
            counterparty: "Distribuidora Sol".to_string(),
            description: "Boleto".to_string(),
            amount_cents,
            due_date: d(due),
            settled_on: None,
            customer_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_status_filters_follow_today() {
        let db = db().await;
        let repo = db.accounts();
        let today = d("2026-06-15");

        let late = repo.insert(&account(AccountKind::Payable, 10_000, "2026-06-01")).await.unwrap();
        repo.insert(&account(AccountKind::Payable, 20_000, "2026-06-20")).await.unwrap();
        let paid = repo.insert(&account(AccountKind::Receivable, 5_000, "2026-06-10")).await.unwrap();
        repo.settle(&paid.id, d("2026-06-09")).await.unwrap();

        let overdue = AccountFilter {
            status: Some(AccountStatus::Overdue),
            ..AccountFilter::default()
        };
        let listed = repo.list(&overdue, today).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, late.id);

        let open = AccountFilter {
            status: Some(AccountStatus::Open),
            ..AccountFilter::default()
        };
        assert_eq!(repo.list(&open, today).await.unwrap().len(), 1);

        let receivables = AccountFilter {
            kind: Some(AccountKind::Receivable),
            ..AccountFilter::default()
        };
        assert_eq!(repo.list(&receivables, today).await.unwrap().len(), 1);
        assert_eq!(repo.list(&AccountFilter::default(), today).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_summary() {
        let db = db().await;
        let repo = db.accounts();
        repo.insert(&account(AccountKind::Payable, 10_000, "2026-06-01")).await.unwrap();
        repo.insert(&account(AccountKind::Payable, 20_000, "2026-06-20")).await.unwrap();
        repo.insert(&account(AccountKind::Receivable, 45_000, "2026-06-30")).await.unwrap();

        let summary = repo.summary(d("2026-06-15")).await.unwrap();
        assert_eq!(summary.payable_open, Money::from_cents(30_000));
        assert_eq!(summary.payable_overdue_count, 1);
        assert_eq!(summary.receivable_open, Money::from_cents(45_000));
        assert_eq!(summary.balance, Money::from_cents(15_000));
    }

    #[tokio::test]
    async fn test_settle_once() {
        let db = db().await;
        let repo = db.accounts();
        let bill = repo.insert(&account(AccountKind::Payable, 10_000, "2026-06-01")).await.unwrap();

        let settled = repo.settle(&bill.id, d("2026-06-02")).await.unwrap();
        assert_eq!(settled.settled_on, Some(d("2026-06-02")));
        assert!(matches!(
            repo.settle(&bill.id, d("2026-06-03")).await,
            Err(DbError::Business(CoreError::InvalidStatus { .. }))
        ));
        assert!(matches!(
            repo.settle("missing", d("2026-06-03")).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_fk_and_delete() {
        let db = db().await;
        let repo = db.accounts();

        assert!(repo.insert(&account(AccountKind::Payable, 0, "2026-06-01")).await.is_err());

        let mut unknown_customer = account(AccountKind::Receivable, 1_000, "2026-06-01");
        unknown_customer.customer_id = Some("missing".to_string());
        assert!(matches!(
            repo.insert(&unknown_customer).await,
            Err(DbError::ForeignKeyViolation { .. })
        ));

        let bill = repo.insert(&account(AccountKind::Payable, 1_000, "2026-06-01")).await.unwrap();
        let mut changed = bill.clone();
        changed.counterparty = "Atacado Norte".to_string();
        assert_eq!(repo.update(&changed).await.unwrap().counterparty, "Atacado Norte");

        repo.delete(&bill.id).await.unwrap();
        assert!(repo.get_by_id(&bill.id).await.unwrap().is_none());
    }
}
