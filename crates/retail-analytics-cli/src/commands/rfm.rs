use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use retail_analytics_core::rfm;

use crate::commands::{DataArgs, FilterArgs};

/// Arguments for RFM scoring and segmentation
#[derive(Args)]
pub struct RfmArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Analysis reference date (defaults to the day after the last
    /// transaction)
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,

    /// Report per-segment statistics instead of per-customer scores
    #[arg(long)]
    pub summary: bool,
}

pub fn run_rfm(args: RfmArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);

    let scored = rfm::score_customers(&filtered, args.reference_date);
    if args.summary {
        let summary = rfm::segment_summary(&scored.result);
        return Ok(serde_json::to_value(summary)?);
    }
    Ok(serde_json::to_value(scored)?)
}
