//! KPI Aggregator: pure reduction of a (filtered) transaction table into the
//! dashboard's headline metrics. Zero-row input is a defined state — averages
//! come back as "not applicable" markers, never as a division error.

use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal::{Decimal, MathematicalOps};
use serde::{Deserialize, Serialize};

use crate::customers::derive_customers;
use crate::loader::TransactionTable;
use crate::types::{with_metadata, ComputationOutput, Money};

/// Headline metrics over a transaction table.
///
/// `None` serialises as `null` and renders as "not applicable" downstream;
/// the marker stays visible rather than being dropped from the output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiSummary {
    pub total_revenue: Money,
    pub total_customers: u64,
    pub total_invoices: u64,
    /// Mean revenue per invoice.
    pub avg_order_value: Option<Money>,
    /// Sample standard deviation of invoice revenue.
    pub aov_std_dev: Option<Money>,
    /// Mean per-customer historical spend.
    pub avg_clv: Option<Money>,
    pub max_clv: Option<Money>,
}

/// Compute the KPI summary for a transaction table.
pub fn summarize(table: &TransactionTable) -> ComputationOutput<KpiSummary> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if table.is_empty() {
        warnings.push("Input table has no rows; averages reported as not applicable".to_string());
    }

    // Revenue per invoice, not per line item.
    let mut invoice_revenue: BTreeMap<&str, Money> = BTreeMap::new();
    for tx in &table.rows {
        *invoice_revenue.entry(tx.invoice_id.as_str()).or_default() += tx.revenue();
    }

    let total_revenue = table.total_revenue();
    let total_invoices = invoice_revenue.len() as u64;
    let avg_order_value = mean(invoice_revenue.values());
    let aov_std_dev = sample_std_dev(invoice_revenue.values(), avg_order_value);

    let customers = derive_customers(table);
    let avg_clv = mean(customers.iter().map(|c| &c.total_spend));
    let max_clv = customers.iter().map(|c| c.total_spend).max();

    let output = KpiSummary {
        total_revenue,
        total_customers: customers.len() as u64,
        total_invoices,
        avg_order_value,
        aov_std_dev,
        avg_clv,
        max_clv,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Descriptive KPI aggregation over invoice-level revenue",
        &serde_json::json!({ "rows": table.len() }),
        warnings,
        elapsed,
        output,
    )
}

fn mean<'a>(values: impl Iterator<Item = &'a Money>) -> Option<Money> {
    let mut sum = Money::ZERO;
    let mut count: u64 = 0;
    for v in values {
        sum += *v;
        count += 1;
    }
    (count > 0).then(|| sum / Decimal::from(count))
}

fn sample_std_dev<'a>(
    values: impl Iterator<Item = &'a Money>,
    mean: Option<Money>,
) -> Option<Money> {
    let mean = mean?;
    let mut sum_sq = Decimal::ZERO;
    let mut count: u64 = 0;
    for v in values {
        let d = *v - mean;
        sum_sq += d * d;
        count += 1;
    }
    if count < 2 {
        return None;
    }
    (sum_sq / Decimal::from(count - 1)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: u32, amount: Money) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "22423".into(),
            description: "REGENCY CAKESTAND 3 TIER".into(),
            quantity: 1,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, 5, 10)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    #[test]
    fn test_kpis_over_small_table() {
        let table = TransactionTable::new(vec![
            tx("A1", 17850, dec!(10.00)),
            tx("A1", 17850, dec!(20.00)),
            tx("B1", 13047, dec!(30.00)),
        ]);

        let out = summarize(&table);
        let kpis = &out.result;

        assert_eq!(kpis.total_revenue, dec!(60.00));
        assert_eq!(kpis.total_customers, 2);
        assert_eq!(kpis.total_invoices, 2);
        // Invoices: A1 = 30, B1 = 30.
        assert_eq!(kpis.avg_order_value, Some(dec!(30.00)));
        assert_eq!(kpis.aov_std_dev, Some(dec!(0.00)));
        assert_eq!(kpis.avg_clv, Some(dec!(30.00)));
        assert_eq!(kpis.max_clv, Some(dec!(30.00)));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_empty_table_yields_not_applicable_markers() {
        let out = summarize(&TransactionTable::default());
        let kpis = &out.result;

        assert_eq!(kpis.total_revenue, Decimal::ZERO);
        assert_eq!(kpis.total_customers, 0);
        assert_eq!(kpis.total_invoices, 0);
        assert_eq!(kpis.avg_order_value, None);
        assert_eq!(kpis.aov_std_dev, None);
        assert_eq!(kpis.avg_clv, None);
        assert_eq!(kpis.max_clv, None);
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_single_invoice_has_no_std_dev() {
        let table = TransactionTable::new(vec![tx("A1", 17850, dec!(10.00))]);
        let out = summarize(&table);
        assert_eq!(out.result.avg_order_value, Some(dec!(10.00)));
        assert_eq!(out.result.aov_std_dev, None);
    }
}
