//! # Recurrence Module
//!
//! Due-date generation for recurring expenses.
//!
//! A recurring expense is a template. Occurrences are separate expense rows
//! pointing back at it through `series_id`. Dates are always computed from the
//! template's own due date (the anchor), never from the previous occurrence,
//! so a month-end anchor survives short months:
//!
//! ```text
//! anchor 2026-01-31, monthly
//!   n=1 → 2026-02-28   (clamped)
//!   n=2 → 2026-03-31   (back to the anchor day)
//!   n=3 → 2026-04-30   (clamped)
//! ```

use std::collections::HashSet;

use chrono::{Duration, Months, NaiveDate};

use crate::types::{Expense, Recurrence};

/// Hard stop on generated occurrences per call (about 19 years of weekly dates).
pub const MAX_OCCURRENCES: u32 = 1000;

/// The `n`-th occurrence after `anchor` (n = 0 is the anchor itself).
///
/// Returns `None` for `Recurrence::None` with `n > 0` or on date overflow.
///
/// ```rust
/// use chrono::NaiveDate;
/// use shopkeep_core::recurrence::nth_occurrence;
/// use shopkeep_core::Recurrence;
///
/// let anchor = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
/// assert_eq!(
///     nth_occurrence(anchor, Recurrence::Monthly, 1),
///     NaiveDate::from_ymd_opt(2024, 2, 29)
/// );
/// ```
pub fn nth_occurrence(anchor: NaiveDate, recurrence: Recurrence, n: u32) -> Option<NaiveDate> {
    if n == 0 {
        return Some(anchor);
    }
    match recurrence {
        Recurrence::None => None,
        Recurrence::Weekly => anchor.checked_add_signed(Duration::weeks(i64::from(n))),
        // chrono clamps to the last day of the target month
        Recurrence::Monthly => anchor.checked_add_months(Months::new(n)),
        Recurrence::Yearly => anchor.checked_add_months(Months::new(n.checked_mul(12)?)),
    }
}

/// Occurrence dates strictly after `after` and up to `until` (inclusive),
/// stopping at `end` when the series has one.
pub fn occurrences(
    anchor: NaiveDate,
    recurrence: Recurrence,
    after: NaiveDate,
    until: NaiveDate,
    end: Option<NaiveDate>,
) -> Vec<NaiveDate> {
    if recurrence == Recurrence::None {
        return Vec::new();
    }

    let limit = match end {
        Some(end) => until.min(end),
        None => until,
    };

    let mut dates = Vec::new();
    for n in 1..=MAX_OCCURRENCES {
        let Some(date) = nth_occurrence(anchor, recurrence, n) else {
            break;
        };
        if date > limit {
            break;
        }
        if date > after {
            dates.push(date);
        }
    }
    dates
}

/// Dates a recurring template still needs occurrences for, up to `until`.
///
/// Dates already present in `existing` are skipped, so calling this again
/// after the occurrences were created yields nothing new.
pub fn pending_occurrences(
    template: &Expense,
    existing: &[NaiveDate],
    until: NaiveDate,
) -> Vec<NaiveDate> {
    if !template.is_recurring_template() {
        return Vec::new();
    }

    let existing: HashSet<&NaiveDate> = existing.iter().collect();
    occurrences(
        template.due_date,
        template.recurrence,
        template.due_date,
        until,
        template.recurrence_end,
    )
    .into_iter()
    .filter(|date| !existing.contains(date))
    .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
