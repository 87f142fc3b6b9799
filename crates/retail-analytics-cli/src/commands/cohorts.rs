use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use retail_analytics_core::cohort::{self, CohortAnalysis};
use retail_analytics_core::types::{MonthKey, Rate};

use crate::commands::{DataArgs, FilterArgs};

/// Arguments for cohort analysis
#[derive(Args)]
pub struct CohortsArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Also report retention at this fixed month offset across cohorts
    #[arg(long)]
    pub retention_at: Option<u32>,

    /// Include per-cohort revenue curves
    #[arg(long)]
    pub revenue: bool,
}

#[derive(Serialize)]
struct CohortReport {
    sizes: BTreeMap<MonthKey, u64>,
    counts: BTreeMap<MonthKey, BTreeMap<u32, u64>>,
    retention_rates: BTreeMap<MonthKey, BTreeMap<u32, Rate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retention_at: Option<BTreeMap<MonthKey, Rate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    revenue_curves: Option<Value>,
}

pub fn run_cohorts(args: CohortsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);

    let output = cohort::analyze_cohorts(&filtered);
    let analysis: &CohortAnalysis = &output.result;

    let revenue_curves = if args.revenue {
        let curves = cohort::revenue_curves(&filtered, analysis);
        Some(serde_json::to_value(curves.result)?)
    } else {
        None
    };

    let report = CohortReport {
        sizes: analysis.sizes.clone(),
        counts: analysis.counts.clone(),
        retention_rates: analysis.retention_rates(),
        retention_at: args.retention_at.map(|k| analysis.retention_at(k)),
        revenue_curves,
    };

    let mut value = serde_json::to_value(&output)?;
    value["result"] = serde_json::to_value(report)?;
    Ok(value)
}
