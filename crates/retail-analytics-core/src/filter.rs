//! Filter Engine: applies date-range, country, customer-type and
//! minimum-order-value predicates to a transaction table, producing a new
//! table. Filtering is pure — the base table is never mutated — and an empty
//! intersection is a valid result, not an error.

use std::collections::{BTreeSet, HashMap, HashSet};

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::loader::TransactionTable;
use crate::types::{CustomerId, DateRange, Money};

/// Customer clientele classification, derived from purchase volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerType {
    #[default]
    All,
    Retail,
    Wholesale,
}

/// Units-per-invoice level at or above which a customer counts as wholesale.
pub const DEFAULT_WHOLESALE_THRESHOLD: Decimal = dec!(100);

/// Conjunction of row predicates. The default filter is the identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    /// None means "all countries"; an empty set matches nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countries: Option<BTreeSet<String>>,
    #[serde(default)]
    pub customer_type: CustomerType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_order_value: Option<Money>,
    #[serde(default = "default_wholesale_threshold")]
    pub wholesale_threshold: Decimal,
}

fn default_wholesale_threshold() -> Decimal {
    DEFAULT_WHOLESALE_THRESHOLD
}

impl Default for TransactionFilter {
    fn default() -> Self {
        TransactionFilter {
            date_range: None,
            countries: None,
            customer_type: CustomerType::All,
            min_order_value: None,
            wholesale_threshold: DEFAULT_WHOLESALE_THRESHOLD,
        }
    }
}

impl TransactionFilter {
    /// Apply all predicates (logical AND) and return the surviving rows as a
    /// new table.
    pub fn apply(&self, table: &TransactionTable) -> TransactionTable {
        let wholesale_ids = match self.customer_type {
            CustomerType::All => None,
            CustomerType::Retail | CustomerType::Wholesale => {
                Some(wholesale_customers(table, self.wholesale_threshold))
            }
        };

        let rows = table
            .rows
            .iter()
            .filter(|tx| {
                if let Some(range) = &self.date_range {
                    if !range.contains(tx.invoice_date.date()) {
                        return false;
                    }
                }
                if let Some(countries) = &self.countries {
                    if !countries.contains(&tx.country) {
                        return false;
                    }
                }
                if let Some(min) = self.min_order_value {
                    if tx.revenue() < min {
                        return false;
                    }
                }
                match (&self.customer_type, &wholesale_ids) {
                    (CustomerType::Retail, Some(ids)) => !ids.contains(&tx.customer_id),
                    (CustomerType::Wholesale, Some(ids)) => ids.contains(&tx.customer_id),
                    _ => true,
                }
            })
            .cloned()
            .collect();

        TransactionTable::new(rows)
    }
}

/// Customers whose mean units per invoice meet the wholesale threshold.
///
/// Classification runs over the base table, not the filtered view, so a
/// customer's type does not flip when a date or country filter narrows
/// their history.
fn wholesale_customers(table: &TransactionTable, threshold: Decimal) -> HashSet<CustomerId> {
    let mut units: HashMap<CustomerId, i64> = HashMap::new();
    let mut invoices: HashMap<CustomerId, BTreeSet<&str>> = HashMap::new();

    for tx in &table.rows {
        *units.entry(tx.customer_id).or_default() += tx.quantity;
        invoices
            .entry(tx.customer_id)
            .or_default()
            .insert(tx.invoice_id.as_str());
    }

    units
        .into_iter()
        .filter(|(id, total_units)| {
            let invoice_count = invoices.get(id).map(|s| s.len()).unwrap_or(0);
            if invoice_count == 0 {
                return false;
            }
            Decimal::from(*total_units) / Decimal::from(invoice_count as i64) >= threshold
        })
        .map(|(id, _)| id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(
        invoice: &str,
        customer: CustomerId,
        quantity: i64,
        price: Decimal,
        date: (i32, u32, u32),
        country: &str,
    ) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "85123A".into(),
            description: "TEST ITEM".into(),
            quantity,
            unit_price: price,
            invoice_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: country.into(),
        }
    }

    fn sample_table() -> TransactionTable {
        let mut rows = Vec::new();
        // 100 UK rows across two retail customers.
        for i in 0..100 {
            let invoice = format!("5{i:05}");
            let customer = if i % 2 == 0 { 17850 } else { 13047 };
            rows.push(tx(
                &invoice,
                customer,
                2,
                dec!(4.25),
                (2011, 1 + (i % 12) as u32, 15),
                "United Kingdom",
            ));
        }
        // 20 rows outside the UK, single bulk buyer.
        for i in 0..20 {
            let invoice = format!("6{i:05}");
            rows.push(tx(&invoice, 12583, 240, dec!(1.45), (2011, 6, 10), "France"));
        }
        TransactionTable::new(rows)
    }

    #[test]
    fn test_full_range_no_restriction_is_identity() {
        let table = sample_table();
        let span = table.date_span().unwrap();
        let filter = TransactionFilter {
            date_range: Some(span),
            ..TransactionFilter::default()
        };

        let filtered = filter.apply(&table);
        assert_eq!(filtered.len(), table.len());
    }

    #[test]
    fn test_country_filter_keeps_only_matching_rows() {
        let table = sample_table();
        let filter = TransactionFilter {
            countries: Some(["United Kingdom".to_string()].into_iter().collect()),
            ..TransactionFilter::default()
        };

        let filtered = filter.apply(&table);
        assert_eq!(filtered.len(), 100);
        assert!(filtered.distinct_customers() <= 100);
        assert_eq!(filtered.countries(), vec!["United Kingdom"]);
    }

    #[test]
    fn test_empty_intersection_is_valid_output() {
        let table = sample_table();
        let filter = TransactionFilter {
            countries: Some(["Japan".to_string()].into_iter().collect()),
            ..TransactionFilter::default()
        };

        let filtered = filter.apply(&table);
        assert!(filtered.is_empty());
    }

    #[test]
    fn test_filtering_does_not_mutate_base_table() {
        let table = sample_table();
        let before = table.len();
        let filter = TransactionFilter {
            countries: Some(["France".to_string()].into_iter().collect()),
            ..TransactionFilter::default()
        };

        let _ = filter.apply(&table);
        assert_eq!(table.len(), before);
    }

    #[test]
    fn test_date_range_bounds_are_inclusive() {
        let table = sample_table();
        let filter = TransactionFilter {
            date_range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2011, 6, 10).unwrap(),
                NaiveDate::from_ymd_opt(2011, 6, 10).unwrap(),
            )),
            ..TransactionFilter::default()
        };

        let filtered = filter.apply(&table);
        assert!(filtered.rows.iter().all(|t| t.invoice_date.date()
            == NaiveDate::from_ymd_opt(2011, 6, 10).unwrap()));
        assert!(!filtered.is_empty());
    }

    #[test]
    fn test_wholesale_split_by_units_per_invoice() {
        let table = sample_table();

        let wholesale = TransactionFilter {
            customer_type: CustomerType::Wholesale,
            ..TransactionFilter::default()
        }
        .apply(&table);
        assert_eq!(wholesale.distinct_customers(), 1);
        assert!(wholesale.rows.iter().all(|t| t.customer_id == 12583));

        let retail = TransactionFilter {
            customer_type: CustomerType::Retail,
            ..TransactionFilter::default()
        }
        .apply(&table);
        assert_eq!(retail.len() + wholesale.len(), table.len());
    }

    #[test]
    fn test_min_order_value_drops_small_lines() {
        let table = sample_table();
        let filter = TransactionFilter {
            min_order_value: Some(dec!(100)),
            ..TransactionFilter::default()
        };

        let filtered = filter.apply(&table);
        // Only the 240-unit bulk lines (348.00 each) clear the threshold.
        assert_eq!(filtered.len(), 20);
    }

    #[test]
    fn test_predicates_combine_as_logical_and() {
        let table = sample_table();
        let filter = TransactionFilter {
            countries: Some(["France".to_string()].into_iter().collect()),
            date_range: Some(DateRange::new(
                NaiveDate::from_ymd_opt(2011, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2011, 5, 31).unwrap(),
            )),
            ..TransactionFilter::default()
        };

        // France rows all fall in June, outside the range.
        assert!(filter.apply(&table).is_empty());
    }
}
