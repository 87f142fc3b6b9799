use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::customers::derive_customers;
use crate::loader::TransactionTable;
use crate::types::{with_metadata, ComputationOutput, CustomerId, Money};

/// Historical lifetime value of one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerClv {
    pub customer_id: CustomerId,
    /// Total historical revenue.
    pub historical: Money,
    /// Historical revenue scaled to a 365-day tenure.
    pub annualized: Money,
    pub tenure_days: i64,
}

/// Empirical CLV per customer: the revenue actually observed, with an
/// annualised variant for comparing customers of different tenure. Tenure is
/// floored at one day so single-visit customers do not divide by zero.
pub fn empirical_clv(table: &TransactionTable) -> ComputationOutput<Vec<CustomerClv>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if table.is_empty() {
        warnings.push("Input table has no rows; CLV distribution is empty".to_string());
    }

    let values: Vec<CustomerClv> = derive_customers(table)
        .into_iter()
        .map(|c| {
            let tenure_days = c.tenure_days();
            CustomerClv {
                customer_id: c.customer_id,
                historical: c.total_spend,
                annualized: c.total_spend * Decimal::from(365) / Decimal::from(tenure_days),
                tenure_days,
            }
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Empirical CLV from historical revenue, annualised by tenure",
        &serde_json::json!({ "customers": values.len() }),
        warnings,
        elapsed,
        values,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: CustomerId, month: u32, day: u32, amount: Money) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "47566".into(),
            description: "PARTY BUNTING".into(),
            quantity: 1,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, month, day)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    #[test]
    fn test_historical_clv_is_total_revenue() {
        let table = TransactionTable::new(vec![
            tx("A1", 17850, 1, 1, dec!(40.00)),
            tx("A2", 17850, 12, 31, dec!(60.00)),
        ]);

        let clv = empirical_clv(&table).result;
        assert_eq!(clv.len(), 1);
        assert_eq!(clv[0].historical, dec!(100.00));
        // 2011-01-01 to 2011-12-31 is 364 days.
        assert_eq!(clv[0].tenure_days, 364);
        assert_eq!(
            clv[0].annualized,
            dec!(100.00) * Decimal::from(365) / Decimal::from(364)
        );
    }

    #[test]
    fn test_single_visit_customer_annualises_over_one_day() {
        let table = TransactionTable::new(vec![tx("B1", 13047, 6, 15, dec!(12.00))]);
        let clv = empirical_clv(&table).result;
        assert_eq!(clv[0].tenure_days, 1);
        assert_eq!(clv[0].annualized, dec!(12.00) * Decimal::from(365));
    }

    #[test]
    fn test_empty_table_yields_empty_distribution() {
        let out = empirical_clv(&TransactionTable::default());
        assert!(out.result.is_empty());
        assert!(!out.warnings.is_empty());
    }
}
