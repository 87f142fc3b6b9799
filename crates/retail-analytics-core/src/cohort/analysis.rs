use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Instant;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::loader::TransactionTable;
use crate::types::{with_metadata, ComputationOutput, CustomerId, MonthKey, Rate};

/// Cohort assignments and the sparse retention matrix.
///
/// The matrix is sparse on purpose: an absent (cohort, offset) cell means no
/// activity was observed there, which also covers offsets beyond the
/// observation horizon. "Not yet observable" is never reported as a zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortAnalysis {
    /// Each customer's acquisition month.
    pub assignments: BTreeMap<CustomerId, MonthKey>,
    /// Cohort → member count (equals the offset-0 cell by construction).
    pub sizes: BTreeMap<MonthKey, u64>,
    /// Cohort → month offset → distinct active customers.
    pub counts: BTreeMap<MonthKey, BTreeMap<u32, u64>>,
}

impl CohortAnalysis {
    pub fn cohorts(&self) -> Vec<MonthKey> {
        self.sizes.keys().copied().collect()
    }

    /// Largest observed offset across all cohorts.
    pub fn max_offset(&self) -> u32 {
        self.counts
            .values()
            .flat_map(|offsets| offsets.keys().copied())
            .max()
            .unwrap_or(0)
    }

    /// Distinct active customers for a cell, None outside the horizon.
    pub fn count(&self, cohort: MonthKey, offset: u32) -> Option<u64> {
        self.counts.get(&cohort)?.get(&offset).copied()
    }

    /// Retention rate for a cell: count(cohort, k) / count(cohort, 0).
    pub fn retention_rate(&self, cohort: MonthKey, offset: u32) -> Option<Rate> {
        let size = *self.sizes.get(&cohort)?;
        if size == 0 {
            return None;
        }
        let active = self.count(cohort, offset)?;
        Some(Decimal::from(active) / Decimal::from(size))
    }

    /// The full retention-rate matrix, as sparse as `counts`.
    pub fn retention_rates(&self) -> BTreeMap<MonthKey, BTreeMap<u32, Rate>> {
        self.counts
            .iter()
            .map(|(cohort, offsets)| {
                let rates = offsets
                    .keys()
                    .filter_map(|&k| self.retention_rate(*cohort, k).map(|r| (k, r)))
                    .collect();
                (*cohort, rates)
            })
            .collect()
    }

    /// Retention at a fixed offset across cohorts, skipping cohorts whose
    /// horizon does not reach it.
    pub fn retention_at(&self, offset: u32) -> BTreeMap<MonthKey, Rate> {
        self.cohorts()
            .into_iter()
            .filter_map(|c| self.retention_rate(c, offset).map(|r| (c, r)))
            .collect()
    }
}

/// Build acquisition cohorts and the retention matrix from transactions.
///
/// Cohort = floor-to-month of the customer's earliest transaction; offset =
/// month difference between an invoice month and the cohort month. A customer
/// with several invoices in the same month counts once in that cell.
pub fn analyze_cohorts(table: &TransactionTable) -> ComputationOutput<CohortAnalysis> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if table.is_empty() {
        warnings.push("Input table has no rows; cohort matrix is empty".to_string());
    }

    // First pass: acquisition month per customer.
    let mut assignments: BTreeMap<CustomerId, MonthKey> = BTreeMap::new();
    let mut firsts: HashMap<CustomerId, chrono::NaiveDateTime> = HashMap::new();
    for tx in &table.rows {
        let earliest = firsts
            .entry(tx.customer_id)
            .or_insert(tx.invoice_date);
        if tx.invoice_date < *earliest {
            *earliest = tx.invoice_date;
        }
    }
    for (customer, first) in &firsts {
        assignments.insert(*customer, MonthKey::from_datetime(*first));
    }

    // Second pass: deduplicated (cohort, offset, customer) activity.
    let mut active: BTreeSet<(MonthKey, u32, CustomerId)> = BTreeSet::new();
    for tx in &table.rows {
        let cohort = assignments[&tx.customer_id];
        let offset = tx.invoice_month().months_since(cohort);
        debug_assert!(offset >= 0, "invoice precedes its customer's cohort");
        active.insert((cohort, offset as u32, tx.customer_id));
    }

    let mut counts: BTreeMap<MonthKey, BTreeMap<u32, u64>> = BTreeMap::new();
    for (cohort, offset, _customer) in &active {
        *counts
            .entry(*cohort)
            .or_default()
            .entry(*offset)
            .or_default() += 1;
    }

    let mut sizes: BTreeMap<MonthKey, u64> = BTreeMap::new();
    for cohort in assignments.values() {
        *sizes.entry(*cohort).or_default() += 1;
    }

    let analysis = CohortAnalysis {
        assignments,
        sizes,
        counts,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Acquisition-month cohorts with distinct-customer retention counts",
        &serde_json::json!({
            "customers": analysis.assignments.len(),
            "cohorts": analysis.sizes.len(),
        }),
        warnings,
        elapsed,
        analysis,
    )
}
