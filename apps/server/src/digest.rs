//! # Daily Digest
//!
//! Collects the day's numbers, renders them with
//! [`shopkeep_core::digest`] and emails them to the store owner.
//!
//! ```text
//! ┌──────────────┐  sleep until hour_utc  ┌──────────────┐  POST /emails  ┌─────────┐
//! │ run_scheduler│ ─────────────────────► │ send_digest  │ ─────────────► │ Mailer  │
//! └──────────────┘                        └──────┬───────┘                └─────────┘
//!                                                │ build_digest
//!                                                ▼
//!                                   sales, expenses, low stock, accounts
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::watch;
use tracing::{debug, error, info};

use shopkeep_core::accounts::{due_within, AccountView};
use shopkeep_core::digest::{DigestData, LowStockLine, DUE_SOON_DAYS};
use shopkeep_core::report::TOP_PRODUCTS_LIMIT;
use shopkeep_core::settings::split_recipients;
use shopkeep_core::DateRange;
use shopkeep_db::repository::today;
use shopkeep_db::{Database, DbResult};

use crate::error::ApiResult;
use crate::mailer::MailError;
use crate::routes::reports::load_dashboard;
use crate::AppState;

/// Gathers the digest for `day`.
pub async fn build_digest(db: &Database, day: NaiveDate) -> DbResult<DigestData> {
    let profile = db.settings().profile().await?;
    let dashboard = load_dashboard(db, DateRange::single_day(day)).await?;
    let low_stock = db.products().low_stock().await?;
    let unsettled = db.accounts().unsettled().await?;

    let accounts_due = due_within(&unsettled, day, DUE_SOON_DAYS)
        .into_iter()
        .map(|account| AccountView::new(account.clone(), day))
        .collect();

    Ok(DigestData {
        store_name: profile.name,
        date: day,
        summary: dashboard.summary,
        top_products: dashboard.top_products.into_iter().take(TOP_PRODUCTS_LIMIT).collect(),
        low_stock: low_stock.iter().map(LowStockLine::from).collect(),
        accounts_due,
    })
}

/// Recipients from the store settings, or the configured fallback.
pub async fn recipients(state: &AppState) -> DbResult<Vec<String>> {
    let profile = state.db.settings().profile().await?;
    if !profile.digest_recipients.is_empty() {
        return Ok(profile.digest_recipients);
    }
    Ok(split_recipients(&state.config.digest.recipients))
}

/// Builds and emails the digest for `day`. Returns the recipients.
pub async fn send_digest(state: &AppState, day: NaiveDate) -> ApiResult<Vec<String>> {
    if !state.mailer.is_configured() {
        return Err(MailError::NotConfigured.into());
    }
    let to = recipients(state).await?;
    if to.is_empty() {
        return Err(MailError::NoRecipients.into());
    }

    let data = build_digest(&state.db, day).await?;
    let currency = state.db.settings().profile().await?.currency;
    state
        .mailer
        .send(&to, &data.subject(), &data.render_html(&currency))
        .await?;

    info!(date = %day, recipients = to.len(), "Digest sent");
    Ok(to)
}

/// Next time the digest is due strictly after `now`.
pub fn next_run(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let today_at = now
        .date_naive()
        .and_hms_opt(hour_utc.min(23), 0, 0)
        .map(|t| t.and_utc())
        .unwrap_or(now);
    if today_at > now {
        today_at
    } else {
        today_at + Duration::days(1)
    }
}

/// Sends the digest once a day until `shutdown` flips to `true`.
pub async fn run_scheduler(state: AppState, mut shutdown: watch::Receiver<bool>) {
    let hour = state.config.digest.hour_utc;
    info!(hour_utc = hour, "Digest scheduler started");

    loop {
        let now = Utc::now();
        let at = next_run(now, hour);
        let wait = (at - now).to_std().unwrap_or_default();
        debug!(next = %at, "Digest scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                if let Err(e) = send_digest(&state, today()).await {
                    error!(code = ?e.code, "Digest failed: {}", e.message);
                }
            }
            _ = shutdown.changed() => {
                info!("Digest scheduler shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shopkeep_core::{Account, AccountKind};
    use shopkeep_db::repository::generate_id;
    use shopkeep_db::{DbConfig, NewSale, SaleLineInput};

    use crate::test_support::{insert_product, state};

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_next_run_same_day_or_tomorrow() {
        let morning = Utc.with_ymd_and_hms(2025, 3, 10, 8, 30, 0).unwrap();
        assert_eq!(next_run(morning, 21), Utc.with_ymd_and_hms(2025, 3, 10, 21, 0, 0).unwrap());

        let night = Utc.with_ymd_and_hms(2025, 3, 10, 21, 0, 0).unwrap();
        assert_eq!(next_run(night, 21), Utc.with_ymd_and_hms(2025, 3, 11, 21, 0, 0).unwrap());

        let new_year = Utc.with_ymd_and_hms(2025, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(next_run(new_year, 6), Utc.with_ymd_and_hms(2026, 1, 1, 6, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_build_digest_collects_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let day = today();

        let coffee = insert_product(&db, "CAFE", 1000, 2000, 3, 2).await;
        db.sales()
            .create(
                &NewSale {
                    lines: vec![SaleLineInput {
                        product_id: coffee.id.clone(),
                        quantity: 1,
                    }],
                    sold_on: Some(day),
                    ..NewSale::default()
                },
                0,
            )
            .await
            .unwrap();

        let now = Utc::now();
        let mut bill = Account {
            id: generate_id(),
            store_id: db.store_id().to_string(),
            kind: AccountKind::Payable,
            counterparty: "Fornecedor".to_string(),
            description: "Boleto".to_string(),
            amount_cents: 5000,
            due_date: day + Duration::days(3),
            settled_on: None,
            customer_id: None,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        db.accounts().insert(&bill).await.unwrap();
        bill.id = generate_id();
        bill.due_date = day + Duration::days(30);
        db.accounts().insert(&bill).await.unwrap();

        let digest = build_digest(&db, day).await.unwrap();
        assert_eq!(digest.date, day);
        assert_eq!(digest.summary.net_revenue.cents(), 2000);
        assert_eq!(digest.top_products.len(), 1);
        assert_eq!(digest.low_stock.len(), 1);
        assert_eq!(digest.low_stock[0].sku, "CAFE");
        assert_eq!(digest.accounts_due.len(), 1);
        assert!(digest.render_html(&Default::default()).contains("Fornecedor"));
    }

    #[tokio::test]
    async fn test_send_requires_configuration() {
        let (state, _dir) = state().await;
        let err = send_digest(&state, d("2025-03-10")).await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::BusinessLogic);
    }

    #[tokio::test]
    async fn test_recipients_fall_back_to_config() {
        let (mut state, _dir) = state().await;
        let mut config = (*state.config).clone();
        config.digest.recipients = "dona@example.com; caixa@example.com".to_string();
        state.config = std::sync::Arc::new(config);

        assert_eq!(recipients(&state).await.unwrap().len(), 2);

        let mut profile = state.db.settings().profile().await.unwrap();
        profile.digest_recipients = vec!["outra@example.com".to_string()];
        state.db.settings().save_profile(&profile).await.unwrap();
        assert_eq!(recipients(&state).await.unwrap(), vec!["outra@example.com".to_string()]);
    }
}
