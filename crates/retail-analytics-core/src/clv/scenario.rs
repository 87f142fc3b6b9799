use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::cohort::CohortAnalysis;
use crate::customers::derive_customers;
use crate::error::AnalyticsError;
use crate::loader::TransactionTable;
use crate::types::{with_metadata, ComputationOutput, CustomerId, Money, MonthKey, Rate};
use crate::AnalyticsResult;

/// Ceiling for effective retention; the geometric projection diverges as
/// retention approaches 1.
pub const MAX_EFFECTIVE_RETENTION: Rate = dec!(0.99);

/// Baseline monthly retention assumed when the observation window is too
/// short to measure one.
const FALLBACK_BASELINE_RETENTION: Rate = dec!(0.75);

/// User-supplied what-if adjustments, as rates (0.05 = +5%).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ScenarioDeltas {
    #[serde(default)]
    pub retention: Rate,
    #[serde(default)]
    pub frequency: Rate,
    #[serde(default)]
    pub monetary: Rate,
}

/// Scenario parameters. Ephemeral: built per interaction, never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioInput {
    #[serde(default)]
    pub deltas: ScenarioDeltas,
    /// Override for the empirically derived baseline monthly retention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline_retention: Option<Rate>,
}

/// Baseline and projected CLV for one customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProjection {
    pub customer_id: CustomerId,
    pub avg_order_value: Money,
    /// Orders per month of observed tenure.
    pub monthly_frequency: Decimal,
    pub baseline_clv: Money,
    pub scenario_clv: Money,
    pub uplift: Money,
}

/// Side-by-side baseline and scenario CLV distributions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutput {
    pub baseline_retention: Rate,
    pub effective_retention: Rate,
    pub customers: Vec<CustomerProjection>,
    pub baseline_total: Money,
    pub scenario_total: Money,
    /// Σ scenario − Σ baseline.
    pub aggregate_impact: Money,
    /// Not applicable (null) when no customers survive the filter.
    pub baseline_mean: Option<Money>,
    pub scenario_mean: Option<Money>,
    pub customers_affected: u64,
}

/// Project CLV under scenario deltas against the empirical baseline.
///
/// Per customer: CLV = M·(1+Δm) · F·(1+Δf) · R′/(1−R′), where M is the
/// average order value, F the monthly purchase frequency, and
/// R′ = clamp(R·(1+Δr), 0, 0.99). The baseline distribution is the same
/// formula with all deltas at zero, so a zero-delta scenario reproduces it
/// exactly. Out-of-range retention is clamped with a warning; only deltas
/// below −100% are rejected outright.
pub fn simulate_scenario(
    table: &TransactionTable,
    analysis: &CohortAnalysis,
    input: &ScenarioInput,
) -> AnalyticsResult<ComputationOutput<ScenarioOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_delta("retention delta", input.deltas.retention)?;
    validate_delta("frequency delta", input.deltas.frequency)?;
    validate_delta("monetary delta", input.deltas.monetary)?;

    if table.is_empty() {
        warnings.push("Input table has no rows; scenario distribution is empty".to_string());
    }

    let baseline_retention = match input.baseline_retention {
        Some(rate) => {
            if rate < Decimal::ZERO || rate > Decimal::ONE {
                return Err(AnalyticsError::InvalidInput {
                    field: "baseline_retention".into(),
                    reason: format!("must lie in [0, 1], got {rate}"),
                });
            }
            rate
        }
        None => derive_baseline_retention(table, analysis, &mut warnings),
    };

    let r_base = clamp_retention(baseline_retention, "baseline retention", &mut warnings);
    let scenario_retention = baseline_retention * (Decimal::ONE + input.deltas.retention);
    let r_eff = clamp_retention(scenario_retention, "effective retention", &mut warnings);

    let baseline_horizon = r_base / (Decimal::ONE - r_base);
    let scenario_horizon = r_eff / (Decimal::ONE - r_eff);
    let m_factor = Decimal::ONE + input.deltas.monetary;
    let f_factor = Decimal::ONE + input.deltas.frequency;

    let mut customers = Vec::new();
    let mut baseline_total = Money::ZERO;
    let mut scenario_total = Money::ZERO;

    for customer in derive_customers(table) {
        let tenure_months = MonthKey::from_datetime(customer.last_purchase)
            .months_since(MonthKey::from_datetime(customer.first_purchase))
            + 1;
        let monthly_frequency =
            Decimal::from(customer.order_count) / Decimal::from(tenure_months.max(1));

        let per_month = customer.avg_order_value * monthly_frequency;
        let baseline_clv = per_month * baseline_horizon;
        let scenario_clv = per_month * m_factor * f_factor * scenario_horizon;

        baseline_total += baseline_clv;
        scenario_total += scenario_clv;
        customers.push(CustomerProjection {
            customer_id: customer.customer_id,
            avg_order_value: customer.avg_order_value,
            monthly_frequency,
            baseline_clv,
            scenario_clv,
            uplift: scenario_clv - baseline_clv,
        });
    }

    let count = customers.len() as u64;
    let output = ScenarioOutput {
        baseline_retention: r_base,
        effective_retention: r_eff,
        baseline_total,
        scenario_total,
        aggregate_impact: scenario_total - baseline_total,
        baseline_mean: (count > 0).then(|| baseline_total / Decimal::from(count)),
        scenario_mean: (count > 0).then(|| scenario_total / Decimal::from(count)),
        customers_affected: count,
        customers,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Closed-form geometric CLV projection under scenario deltas",
        &serde_json::json!({
            "deltas": input.deltas,
            "baseline_retention_source": if input.baseline_retention.is_some() {
                "override"
            } else {
                "empirical month-1 cohort retention"
            },
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn validate_delta(field: &str, delta: Rate) -> AnalyticsResult<()> {
    if delta < dec!(-1) {
        return Err(AnalyticsError::InvalidInput {
            field: field.to_string(),
            reason: format!("cannot fall below -100%, got {delta}"),
        });
    }
    Ok(())
}

fn clamp_retention(rate: Rate, label: &str, warnings: &mut Vec<String>) -> Rate {
    if rate >= MAX_EFFECTIVE_RETENTION {
        warnings.push(format!(
            "{label} of {rate} clamped to {MAX_EFFECTIVE_RETENTION} to keep the projection finite"
        ));
        return MAX_EFFECTIVE_RETENTION;
    }
    if rate < Decimal::ZERO {
        warnings.push(format!("{label} of {rate} clamped to 0"));
        return Decimal::ZERO;
    }
    rate
}

/// Size-weighted month-1 retention across cohorts old enough to observe it.
fn derive_baseline_retention(
    table: &TransactionTable,
    analysis: &CohortAnalysis,
    warnings: &mut Vec<String>,
) -> Rate {
    let Some(span) = table.date_span() else {
        warnings.push(format!(
            "No observations to derive baseline retention; assuming {FALLBACK_BASELINE_RETENTION}"
        ));
        return FALLBACK_BASELINE_RETENTION;
    };
    let last_month = MonthKey::from_date(span.end);

    let mut retained = Decimal::ZERO;
    let mut population = Decimal::ZERO;
    for (cohort, size) in &analysis.sizes {
        // A cohort only enters the estimate once month 1 is observable.
        if last_month.months_since(*cohort) < 1 {
            continue;
        }
        retained += Decimal::from(analysis.count(*cohort, 1).unwrap_or(0));
        population += Decimal::from(*size);
    }

    if population.is_zero() {
        warnings.push(format!(
            "Observation window shorter than one month; assuming baseline retention {FALLBACK_BASELINE_RETENTION}"
        ));
        return FALLBACK_BASELINE_RETENTION;
    }
    retained / population
}
