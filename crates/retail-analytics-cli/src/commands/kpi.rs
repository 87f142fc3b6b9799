use clap::Args;
use serde_json::Value;

use retail_analytics_core::kpi;

use crate::commands::{DataArgs, FilterArgs};

/// Arguments for the KPI summary
#[derive(Args)]
pub struct KpiArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,
}

pub fn run_kpi(args: KpiArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);
    let result = kpi::summarize(&filtered);
    Ok(serde_json::to_value(result)?)
}
