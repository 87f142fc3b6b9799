use std::collections::HashMap;
use std::time::Instant;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::customers::derive_customers;
use crate::loader::TransactionTable;
use crate::rfm::segments::{classify, Segment};
use crate::types::{with_metadata, ComputationOutput, CustomerId, Money};

/// A customer's raw RFM measures, quintile scores and segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmScore {
    pub customer_id: CustomerId,
    /// Days between the last transaction and the analysis reference date.
    pub recency_days: i64,
    /// Distinct invoices.
    pub frequency: u64,
    /// Total revenue.
    pub monetary: Money,
    /// Quintile scores, 1 = worst, 5 = best.
    pub r: u8,
    pub f: u8,
    pub m: u8,
    pub segment: Segment,
}

/// Score every customer in the table.
///
/// The reference date defaults to the day after the latest transaction.
/// Quintile boundaries are computed over the full customer population by
/// rank-based binning: customers are ordered by the raw measure with ties
/// broken by customer id, and rank k of n lands in bin k·5/n. Recency is
/// inverted so that fewer days since the last purchase scores higher.
pub fn score_customers(
    table: &TransactionTable,
    reference_date: Option<NaiveDate>,
) -> ComputationOutput<Vec<RfmScore>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let customers = derive_customers(table);
    if customers.is_empty() {
        warnings.push("Input table has no rows; no customers to score".to_string());
    }

    let reference = reference_date.or_else(|| {
        table
            .date_span()
            .map(|span| span.end.checked_add_days(Days::new(1)).unwrap_or(span.end))
    });

    let recency: Vec<(CustomerId, i64)> = customers
        .iter()
        .map(|c| {
            let days = reference
                .map(|r| (r - c.last_purchase.date()).num_days())
                .unwrap_or(0);
            (c.customer_id, days)
        })
        .collect();
    let frequency: Vec<(CustomerId, u64)> = customers
        .iter()
        .map(|c| (c.customer_id, c.order_count))
        .collect();
    let monetary: Vec<(CustomerId, Money)> = customers
        .iter()
        .map(|c| (c.customer_id, c.total_spend))
        .collect();

    let r_scores = quintile_scores(recency.clone(), true);
    let f_scores = quintile_scores(frequency, false);
    let m_scores = quintile_scores(monetary, false);
    let recency_by_id: HashMap<CustomerId, i64> = recency.into_iter().collect();

    let scores = customers
        .iter()
        .map(|c| {
            let r = r_scores[&c.customer_id];
            let f = f_scores[&c.customer_id];
            let m = m_scores[&c.customer_id];
            RfmScore {
                customer_id: c.customer_id,
                recency_days: recency_by_id[&c.customer_id],
                frequency: c.order_count,
                monetary: c.total_spend,
                r,
                f,
                m,
                segment: classify(r, f, m),
            }
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Rank-based RFM quintile scoring with rule-table segmentation",
        &serde_json::json!({
            "reference_date": reference.map(|d| d.to_string()),
            "population": customers.len(),
        }),
        warnings,
        elapsed,
        scores,
    )
}

/// Rank-based quintile assignment over the full population.
///
/// Ties are broken by the stable sort on (value, customer id), so equal raw
/// measures bin deterministically. With `invert`, low raw values score 5.
fn quintile_scores<K: Ord>(mut values: Vec<(CustomerId, K)>, invert: bool) -> HashMap<CustomerId, u8> {
    values.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    let n = values.len();
    values
        .into_iter()
        .enumerate()
        .map(|(rank, (customer, _))| {
            let bin = (rank * 5 / n.max(1)) as u8;
            let score = if invert { 5 - bin } else { bin + 1 };
            (customer, score)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfm::segments::segment_summary;
    use crate::types::Transaction;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: CustomerId, month: u32, day: u32, amount: Money) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "23084".into(),
            description: "RABBIT NIGHT LIGHT".into(),
            quantity: 1,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, month, day)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    /// Ten customers with strictly increasing activity on every measure:
    /// customer 100+i places i+1 orders of 10.00 each, the later joiners
    /// buying more recently.
    fn graded_table() -> TransactionTable {
        let mut rows = Vec::new();
        for i in 0..10u32 {
            for order in 0..=i {
                rows.push(tx(
                    &format!("I{i}{order}"),
                    100 + i,
                    1 + (i + order) % 12,
                    1 + i,
                    dec!(10.00),
                ));
            }
        }
        TransactionTable::new(rows)
    }

    #[test]
    fn test_quintiles_split_ranked_population_evenly() {
        let values: Vec<(CustomerId, u64)> = (0..10).map(|i| (100 + i, i as u64)).collect();
        let scores = quintile_scores(values, false);

        assert_eq!(scores[&100], 1);
        assert_eq!(scores[&101], 1);
        assert_eq!(scores[&104], 3);
        assert_eq!(scores[&108], 5);
        assert_eq!(scores[&109], 5);
    }

    #[test]
    fn test_inverted_quintiles_for_recency() {
        let values: Vec<(CustomerId, i64)> = (0..10).map(|i| (100 + i, i as i64)).collect();
        let scores = quintile_scores(values, true);

        // Fewest days since last purchase scores best.
        assert_eq!(scores[&100], 5);
        assert_eq!(scores[&109], 1);
    }

    #[test]
    fn test_ties_bin_deterministically_by_customer_id() {
        let values: Vec<(CustomerId, u64)> = (0..10).map(|i| (100 + i, 7)).collect();
        let first = quintile_scores(values.clone(), false);
        let second = quintile_scores(values, false);

        assert_eq!(first, second);
        // All raw values equal: the id order decides the bins.
        assert_eq!(first[&100], 1);
        assert_eq!(first[&109], 5);
    }

    #[test]
    fn test_scores_stay_in_range_and_segments_assigned() {
        let out = score_customers(&graded_table(), None);
        let scores = out.result;

        assert_eq!(scores.len(), 10);
        for score in &scores {
            assert!((1..=5).contains(&score.r));
            assert!((1..=5).contains(&score.f));
            assert!((1..=5).contains(&score.m));
            assert!(Segment::ALL.contains(&score.segment));
        }
    }

    #[test]
    fn test_default_reference_is_day_after_last_transaction() {
        let table = TransactionTable::new(vec![tx("A1", 17850, 6, 15, dec!(20.00))]);
        let out = score_customers(&table, None);
        assert_eq!(out.result[0].recency_days, 1);
    }

    #[test]
    fn test_explicit_reference_date() {
        let table = TransactionTable::new(vec![tx("A1", 17850, 6, 15, dec!(20.00))]);
        let reference = NaiveDate::from_ymd_opt(2011, 6, 25).unwrap();
        let out = score_customers(&table, Some(reference));
        assert_eq!(out.result[0].recency_days, 10);
    }

    #[test]
    fn test_empty_population_scores_nothing() {
        let out = score_customers(&TransactionTable::default(), None);
        assert!(out.result.is_empty());
        assert!(!out.warnings.is_empty());
    }

    #[test]
    fn test_segment_summary_shares_sum_to_one() {
        let out = score_customers(&graded_table(), None);
        let summary = segment_summary(&out.result).result;

        let total_customers: u64 = summary.iter().map(|s| s.customers).sum();
        assert_eq!(total_customers, 10);

        let share_sum: rust_decimal::Decimal = summary.iter().map(|s| s.share).sum();
        assert_eq!(share_sum, dec!(1));

        // Ordered by activation priority.
        for pair in summary.windows(2) {
            assert!(pair[0].priority <= pair[1].priority);
        }
    }
}
