use std::collections::BTreeMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cohort::CohortAnalysis;
use crate::loader::TransactionTable;
use crate::types::{with_metadata, ComputationOutput, Money, MonthKey};

/// Revenue of one cohort at one month offset, with the running total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenuePoint {
    pub offset: u32,
    pub revenue: Money,
    pub cumulative: Money,
}

/// Per-cohort revenue curves by cohort age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortRevenue {
    pub curves: BTreeMap<MonthKey, Vec<RevenuePoint>>,
}

/// Sum revenue per (cohort, offset) and accumulate it along each curve.
pub fn revenue_curves(
    table: &TransactionTable,
    analysis: &CohortAnalysis,
) -> ComputationOutput<CohortRevenue> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if table.is_empty() {
        warnings.push("Input table has no rows; revenue curves are empty".to_string());
    }

    let mut by_cell: BTreeMap<MonthKey, BTreeMap<u32, Money>> = BTreeMap::new();
    for tx in &table.rows {
        let Some(cohort) = analysis.assignments.get(&tx.customer_id).copied() else {
            continue;
        };
        let offset = tx.invoice_month().months_since(cohort);
        if offset < 0 {
            continue;
        }
        *by_cell
            .entry(cohort)
            .or_default()
            .entry(offset as u32)
            .or_default() += tx.revenue();
    }

    let curves = by_cell
        .into_iter()
        .map(|(cohort, offsets)| {
            let mut running = Money::ZERO;
            let points = offsets
                .into_iter()
                .map(|(offset, revenue)| {
                    running += revenue;
                    RevenuePoint {
                        offset,
                        revenue,
                        cumulative: running,
                    }
                })
                .collect();
            (cohort, points)
        })
        .collect();

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Cohort revenue by age with cumulative totals",
        &serde_json::json!({ "cohorts": analysis.sizes.len() }),
        warnings,
        elapsed,
        CohortRevenue { curves },
    )
}
