//! # Digest Module
//!
//! HTML rendering of the daily store digest email.
//!
//! Data gathering lives in the server (it needs the database); this module only
//! turns a [`DigestData`] into a subject line and an HTML body. All
//! interpolated text is HTML-escaped.

use std::fmt::Write as _;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::accounts::{AccountStatus, AccountView};
use crate::money::{CurrencyFormat, Money};
use crate::report::{DashboardSummary, ProductRanking};
use crate::types::{AccountKind, Product};

/// Accounts due within this many days appear in the digest.
pub const DUE_SOON_DAYS: i64 = 7;

/// A product at or under its low-stock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockLine {
    pub sku: String,
    pub name: String,
    pub sellable_stock: i64,
    pub min_stock: i64,
}

impl From<&Product> for LowStockLine {
    fn from(product: &Product) -> Self {
        LowStockLine {
            sku: product.sku.clone(),
            name: product.name.clone(),
            sellable_stock: product.sellable_stock(),
            min_stock: product.min_stock,
        }
    }
}

/// Everything the digest shows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DigestData {
    pub store_name: String,
    #[ts(as = "String")]
    pub date: NaiveDate,
    pub summary: DashboardSummary,
    pub top_products: Vec<ProductRanking>,
    pub low_stock: Vec<LowStockLine>,
    pub accounts_due: Vec<AccountView>,
}

impl DigestData {
    pub fn subject(&self) -> String {
        format!(
            "{}: resumo de {}",
            self.store_name,
            self.date.format("%d/%m/%Y")
        )
    }

    /// Renders the email body.
    pub fn render_html(&self, currency: &CurrencyFormat) -> String {
        let money = |m: Money| escape_html(&currency.format(m));
        let s = &self.summary;
        let mut html = String::with_capacity(4096);

        let _ = write!(
            html,
            "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#222\">\
             <h2>{}</h2><p>Resumo do dia {}</p>",
            escape_html(&self.store_name),
            self.date.format("%d/%m/%Y")
        );

        html.push_str("<h3>Vendas</h3><table cellpadding=\"4\">");
        for (label, value) in [
            ("Faturamento", money(s.net_revenue)),
            ("Descontos", money(s.discounts)),
            ("Custo", money(s.cost_of_goods)),
            ("Lucro bruto", money(s.gross_profit)),
            ("Despesas", money(s.expenses)),
            ("Lucro líquido", money(s.net_profit)),
            ("Vendas", s.sale_count.to_string()),
            ("Ticket médio", money(s.average_ticket)),
            ("Doações", s.donation_count.to_string()),
        ] {
            let _ = write!(html, "<tr><td>{}</td><td align=\"right\"><b>{}</b></td></tr>", label, value);
        }
        html.push_str("</table>");

        if !self.top_products.is_empty() {
            html.push_str("<h3>Mais vendidos</h3><ol>");
            for p in &self.top_products {
                let _ = write!(
                    html,
                    "<li>{} ({} un, {})</li>",
                    escape_html(&p.name),
                    p.quantity,
                    money(p.revenue)
                );
            }
            html.push_str("</ol>");
        }

        if !self.low_stock.is_empty() {
            html.push_str("<h3>Estoque baixo</h3><ul>");
            for p in &self.low_stock {
                let _ = write!(
                    html,
                    "<li>{} [{}]: {} (mínimo {})</li>",
                    escape_html(&p.name),
                    escape_html(&p.sku),
                    p.sellable_stock,
                    p.min_stock
                );
            }
            html.push_str("</ul>");
        }

        if !self.accounts_due.is_empty() {
            html.push_str("<h3>Contas a vencer</h3><ul>");
            for view in &self.accounts_due {
                let a = &view.account;
                let kind = match a.kind {
                    AccountKind::Payable => "Pagar",
                    AccountKind::Receivable => "Receber",
                };
                let overdue = if view.status == AccountStatus::Overdue {
                    " <b style=\"color:#b00\">(vencida)</b>"
                } else {
                    ""
                };
                let _ = write!(
                    html,
                    "<li>{} {}: {} {}, vence {}{}</li>",
                    kind,
                    escape_html(&a.counterparty),
                    escape_html(&a.description),
                    money(Money::from_cents(a.amount_cents)),
                    a.due_date.format("%d/%m/%Y"),
                    overdue
                );
            }
            html.push_str("</ul>");
        }

        html.push_str("</body></html>");
        html
    }
}

/// Escapes `& < > " '` for HTML text and attribute content.
pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{account, d};

    fn data() -> DigestData {
        DigestData {
            store_name: "Café & Cia".to_string(),
            date: d("2026-05-10"),
            summary: DashboardSummary {
                net_revenue: Money::from_cents(123456),
                sale_count: 12,
                ..DashboardSummary::default()
            },
            top_products: vec![ProductRanking {
                product_id: "p1".to_string(),
                name: "Cesta <Luxo>".to_string(),
                quantity: 5,
                revenue: Money::from_cents(50000),
            }],
            low_stock: vec![LowStockLine {
                sku: "CAFE-1".to_string(),
                name: "Café".to_string(),
                sellable_stock: 1,
                min_stock: 5,
            }],
            accounts_due: vec![AccountView::new(
                account(AccountKind::Payable, 9900, "2026-05-09", None),
                d("2026-05-10"),
            )],
        }
    }

    #[test]
    fn test_subject() {
        assert_eq!(data().subject(), "Café & Cia: resumo de 10/05/2026");
    }

    #[test]
    fn test_render_html_sections_and_escaping() {
        let html = data().render_html(&CurrencyFormat::default());

        assert!(html.contains("<h2>Café &amp; Cia</h2>"));
        assert!(html.contains("R$ 1.234,56"));
        assert!(html.contains("Cesta &lt;Luxo&gt; (5 un, R$ 500,00)"));
        assert!(html.contains("Café [CAFE-1]: 1 (mínimo 5)"));
        assert!(html.contains("(vencida)"));
        assert!(!html.contains("<Luxo>"));
    }

    #[test]
    fn test_empty_sections_omitted() {
        let mut empty = data();
        empty.top_products.clear();
        empty.low_stock.clear();
        empty.accounts_due.clear();

        let html = empty.render_html(&CurrencyFormat::default());
        assert!(!html.contains("Mais vendidos"));
        assert!(!html.contains("Estoque baixo"));
        assert!(!html.contains("Contas a vencer"));
        assert!(html.ends_with("</body></html>"));
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
    }
}
