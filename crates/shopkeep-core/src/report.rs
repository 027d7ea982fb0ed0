//! # Report Module
//!
//! Dashboard aggregation over a date range.
//!
//! The database layer loads the raw rows for the range (sales, their items and
//! expenses); everything here is pure so the numbers can be tested without a
//! database.
//!
//! ## What Counts
//! ```text
//! ┌───────────────────────┬──────────┬──────────┬───────────────┐
//! │ record                │ revenue  │ COGS     │ donation cost │
//! ├───────────────────────┼──────────┼──────────┼───────────────┤
//! │ completed sale        │   yes    │   yes    │      -        │
//! │ completed donation    │   no     │   no     │     yes       │
//! │ cancelled (any)       │   no     │   no     │      no       │
//! └───────────────────────┴──────────┴──────────┴───────────────┘
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::{DateRange, Expense, PaymentMethod, RecordType, Sale, SaleItem, SaleStatus};

/// How many products the ranking keeps.
pub const TOP_PRODUCTS_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardSummary {
    /// Σ subtotal of completed sales.
    pub gross_revenue: Money,
    pub discounts: Money,
    /// Σ total of completed sales.
    pub net_revenue: Money,
    pub cost_of_goods: Money,
    /// `net_revenue - cost_of_goods`.
    pub gross_profit: Money,
    /// Σ expenses due in range.
    pub expenses: Money,
    /// `gross_profit - expenses - donation_cost`.
    pub net_profit: Money,
    pub sale_count: i64,
    pub average_ticket: Money,
    pub donation_count: i64,
    pub donation_cost: Money,
    pub cancelled_count: i64,
}

/// One day of the chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailyPoint {
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub revenue: Money,
    pub cost: Money,
    pub expenses: Money,
    pub sale_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub payment_method: PaymentMethod,
    pub count: i64,
    pub total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductRanking {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub revenue: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CategoryTotal {
    pub category: String,
    pub total: Money,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dashboard {
    pub range: DateRange,
    pub summary: DashboardSummary,
    /// One point per day in the range, zero-filled.
    pub daily: Vec<DailyPoint>,
    pub payment_methods: Vec<PaymentBreakdown>,
    pub top_products: Vec<ProductRanking>,
    pub expenses_by_category: Vec<CategoryTotal>,
}

/// Builds the dashboard for `range`.
///
/// Rows outside the range are ignored, so callers may pass a superset.
/// `items` may contain lines of any sale; only lines of completed sales in
/// range feed the product ranking.
pub fn build_dashboard(
    range: DateRange,
    sales: &[Sale],
    items: &[SaleItem],
    expenses: &[Expense],
) -> Dashboard {
    let mut summary = DashboardSummary::default();
    let mut daily: BTreeMap<NaiveDate, DailyPoint> = range
        .days()
        .map(|date| {
            (
                date,
                DailyPoint {
                    date,
                    revenue: Money::zero(),
                    cost: Money::zero(),
                    expenses: Money::zero(),
                    sale_count: 0,
                },
            )
        })
        .collect();
    let mut by_method: HashMap<PaymentMethod, PaymentBreakdown> = HashMap::new();
    let mut revenue_sales: HashSet<&str> = HashSet::new();

    for sale in sales.iter().filter(|s| range.contains(s.sold_on)) {
        if sale.status == SaleStatus::Cancelled {
            summary.cancelled_count += 1;
            continue;
        }

        let cost = Money::from_cents(sale.cost_total_cents);
        match sale.record_type {
            RecordType::Donation => {
                summary.donation_count += 1;
                summary.donation_cost += cost;
            }
            RecordType::Sale => {
                let total = Money::from_cents(sale.total_cents);
                summary.gross_revenue += Money::from_cents(sale.subtotal_cents);
                summary.discounts += Money::from_cents(sale.discount_cents);
                summary.net_revenue += total;
                summary.cost_of_goods += cost;
                summary.sale_count += 1;
                revenue_sales.insert(sale.id.as_str());

                if let Some(point) = daily.get_mut(&sale.sold_on) {
                    point.revenue += total;
                    point.cost += cost;
                    point.sale_count += 1;
                }

                let entry = by_method
                    .entry(sale.payment_method)
                    .or_insert(PaymentBreakdown {
                        payment_method: sale.payment_method,
                        count: 0,
                        total: Money::zero(),
                    });
                entry.count += 1;
                entry.total += total;
            }
        }
    }

    let mut by_category: BTreeMap<String, CategoryTotal> = BTreeMap::new();
    for expense in expenses.iter().filter(|e| range.contains(e.due_date)) {
        let amount = Money::from_cents(expense.amount_cents);
        summary.expenses += amount;
        if let Some(point) = daily.get_mut(&expense.due_date) {
            point.expenses += amount;
        }
        let entry = by_category
            .entry(expense.category.clone())
            .or_insert_with(|| CategoryTotal {
                category: expense.category.clone(),
                total: Money::zero(),
                count: 0,
            });
        entry.total += amount;
        entry.count += 1;
    }

    summary.gross_profit = summary.net_revenue - summary.cost_of_goods;
    summary.net_profit = summary.gross_profit - summary.expenses - summary.donation_cost;
    if summary.sale_count > 0 {
        summary.average_ticket = Money::from_cents(summary.net_revenue.cents() / summary.sale_count);
    }

    let mut payment_methods: Vec<PaymentBreakdown> = by_method.into_values().collect();
    payment_methods.sort_by(|a, b| b.total.cmp(&a.total).then(a.payment_method.as_str().cmp(b.payment_method.as_str())));

    let mut expenses_by_category: Vec<CategoryTotal> = by_category.into_values().collect();
    expenses_by_category.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.category.cmp(&b.category)));

    Dashboard {
        range,
        summary,
        daily: daily.into_values().collect(),
        payment_methods,
        top_products: rank_products(items, &revenue_sales, TOP_PRODUCTS_LIMIT),
        expenses_by_category,
    }
}

/// Products ranked by quantity sold, then revenue, over the given sales.
pub fn rank_products(items: &[SaleItem], sale_ids: &HashSet<&str>, limit: usize) -> Vec<ProductRanking> {
    let mut by_product: HashMap<&str, ProductRanking> = HashMap::new();

    for item in items.iter().filter(|i| sale_ids.contains(i.sale_id.as_str())) {
        let entry = by_product
            .entry(item.product_id.as_str())
            .or_insert_with(|| ProductRanking {
                product_id: item.product_id.clone(),
                name: item.name_snapshot.clone(),
                quantity: 0,
                revenue: Money::zero(),
            });
        entry.quantity += item.quantity;
        entry.revenue += Money::from_cents(item.line_total_cents);
    }

    let mut ranking: Vec<ProductRanking> = by_product.into_values().collect();
    ranking.sort_by(|a, b| {
        b.quantity
            .cmp(&a.quantity)
            .then(b.revenue.cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    ranking.truncate(limit);
    ranking
}

// =============================================================================
// Unit Tests
// =============================================================================
