//! Customer-level aggregation of the transaction table. Recomputed whenever
//! the active filter changes so every downstream analytic sees a consistent
//! population.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::loader::TransactionTable;
use crate::types::{CustomerId, Money};

/// Per-customer purchase profile derived from transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_id: CustomerId,
    pub first_purchase: NaiveDateTime,
    pub last_purchase: NaiveDateTime,
    pub total_spend: Money,
    /// Distinct invoices.
    pub order_count: u64,
    pub avg_order_value: Money,
    /// Country of the customer's earliest transaction.
    pub country: String,
}

impl CustomerSummary {
    /// Observed tenure in whole days, floored at one.
    pub fn tenure_days(&self) -> i64 {
        (self.last_purchase.date() - self.first_purchase.date())
            .num_days()
            .max(1)
    }
}

struct Accumulator {
    first: NaiveDateTime,
    last: NaiveDateTime,
    spend: Money,
    invoices: BTreeSet<String>,
    country: String,
}

/// Aggregate transactions into per-customer summaries, sorted by customer id.
pub fn derive_customers(table: &TransactionTable) -> Vec<CustomerSummary> {
    let mut accumulators: BTreeMap<CustomerId, Accumulator> = BTreeMap::new();

    for tx in &table.rows {
        let acc = accumulators
            .entry(tx.customer_id)
            .or_insert_with(|| Accumulator {
                first: tx.invoice_date,
                last: tx.invoice_date,
                spend: Money::ZERO,
                invoices: BTreeSet::new(),
                country: tx.country.clone(),
            });

        if tx.invoice_date < acc.first {
            acc.first = tx.invoice_date;
            acc.country = tx.country.clone();
        }
        if tx.invoice_date > acc.last {
            acc.last = tx.invoice_date;
        }
        acc.spend += tx.revenue();
        acc.invoices.insert(tx.invoice_id.clone());
    }

    accumulators
        .into_iter()
        .map(|(customer_id, acc)| {
            let order_count = acc.invoices.len() as u64;
            let avg_order_value = if order_count == 0 {
                Money::ZERO
            } else {
                acc.spend / Money::from(order_count)
            };
            CustomerSummary {
                customer_id,
                first_purchase: acc.first,
                last_purchase: acc.last,
                total_spend: acc.spend,
                order_count,
                avg_order_value,
                country: acc.country,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: CustomerId, day: u32, amount: Money) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "21730".into(),
            description: "GLASS STAR FROSTED T-LIGHT HOLDER".into(),
            quantity: 1,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, 3, day)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    #[test]
    fn test_customers_aggregate_spend_and_orders() {
        let table = TransactionTable::new(vec![
            tx("A1", 17850, 1, dec!(10.00)),
            tx("A1", 17850, 1, dec!(5.00)),
            tx("A2", 17850, 20, dec!(25.00)),
            tx("B1", 13047, 5, dec!(7.50)),
        ]);

        let customers = derive_customers(&table);
        assert_eq!(customers.len(), 2);

        let first = &customers[0];
        assert_eq!(first.customer_id, 13047);
        assert_eq!(first.order_count, 1);
        assert_eq!(first.total_spend, dec!(7.50));

        let second = &customers[1];
        assert_eq!(second.customer_id, 17850);
        // Two line items on invoice A1 count as one order.
        assert_eq!(second.order_count, 2);
        assert_eq!(second.total_spend, dec!(40.00));
        assert_eq!(second.avg_order_value, dec!(20.00));
        assert_eq!(second.tenure_days(), 19);
    }

    #[test]
    fn test_country_follows_earliest_transaction() {
        let mut early = tx("C1", 14606, 2, dec!(3.00));
        early.country = "Germany".into();
        let late = tx("C2", 14606, 28, dec!(4.00));

        let table = TransactionTable::new(vec![late, early]);
        let customers = derive_customers(&table);
        assert_eq!(customers[0].country, "Germany");
    }

    #[test]
    fn test_empty_table_yields_no_customers() {
        let customers = derive_customers(&TransactionTable::default());
        assert!(customers.is_empty());
    }
}
