//! # Accounts Module
//!
//! Status derivation and summaries for accounts payable and receivable.
//!
//! Status is never stored; it follows from `settled_on`, `due_date` and the
//! day the question is asked.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{Account, AccountKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum AccountStatus {
    Open,
    Overdue,
    Settled,
}

impl AccountStatus {
    /// ```rust
    /// use chrono::NaiveDate;
    /// use shopkeep_core::accounts::AccountStatus;
    ///
    /// let due = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
    /// let today = NaiveDate::from_ymd_opt(2026, 3, 11).unwrap();
    /// assert_eq!(AccountStatus::derive(None, due, today), AccountStatus::Overdue);
    /// assert_eq!(AccountStatus::derive(None, due, due), AccountStatus::Open);
    /// ```
    pub fn derive(settled_on: Option<NaiveDate>, due_date: NaiveDate, today: NaiveDate) -> Self {
        match settled_on {
            Some(_) => AccountStatus::Settled,
            None if due_date < today => AccountStatus::Overdue,
            None => AccountStatus::Open,
        }
    }

    pub fn of(account: &Account, today: NaiveDate) -> Self {
        Self::derive(account.settled_on, account.due_date, today)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Open => "open",
            AccountStatus::Overdue => "overdue",
            AccountStatus::Settled => "settled",
        }
    }
}

/// An account together with its derived status, as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub status: AccountStatus,
}

impl AccountView {
    pub fn new(account: Account, today: NaiveDate) -> Self {
        let status = AccountStatus::of(&account, today);
        AccountView { account, status }
    }
}

/// Totals over a set of accounts as of a given day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AccountsSummary {
    /// Unsettled payables (open + overdue).
    pub payable_open: Money,
    pub payable_open_count: i64,
    pub payable_overdue: Money,
    pub payable_overdue_count: i64,
    /// Unsettled receivables (open + overdue).
    pub receivable_open: Money,
    pub receivable_open_count: i64,
    pub receivable_overdue: Money,
    pub receivable_overdue_count: i64,
    /// `receivable_open - payable_open`.
    pub balance: Money,
}

impl AccountsSummary {
    pub fn build<'a>(accounts: impl IntoIterator<Item = &'a Account>, today: NaiveDate) -> Self {
        let mut summary = AccountsSummary::default();

        for account in accounts {
            let status = AccountStatus::of(account, today);
            if status == AccountStatus::Settled {
                continue;
            }
            let amount = Money::from_cents(account.amount_cents);
            let overdue = status == AccountStatus::Overdue;

            match account.kind {
                AccountKind::Payable => {
                    summary.payable_open += amount;
                    summary.payable_open_count += 1;
                    if overdue {
                        summary.payable_overdue += amount;
                        summary.payable_overdue_count += 1;
                    }
                }
                AccountKind::Receivable => {
                    summary.receivable_open += amount;
                    summary.receivable_open_count += 1;
                    if overdue {
                        summary.receivable_overdue += amount;
                        summary.receivable_overdue_count += 1;
                    }
                }
            }
        }

        summary.balance = summary.receivable_open - summary.payable_open;
        summary
    }
}

/// Unsettled accounts due on or before `today + days`, soonest first.
pub fn due_within(accounts: &[Account], today: NaiveDate, days: i64) -> Vec<&Account> {
    let horizon = today + chrono::Duration::days(days);
    let mut due: Vec<&Account> = accounts
        .iter()
        .filter(|a| a.settled_on.is_none() && a.due_date <= horizon)
        .collect();
    due.sort_by_key(|a| a.due_date);
    due
}

// =============================================================================
// Unit Tests
// =============================================================================
