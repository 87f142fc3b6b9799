use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use retail_analytics_core::clv::{self, ScenarioDeltas, ScenarioInput};
use retail_analytics_core::cohort;

use crate::commands::{DataArgs, FilterArgs};
use crate::input;

/// Arguments for empirical CLV
#[derive(Args)]
pub struct ClvArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Keep only the top N customers by historical value
    #[arg(long)]
    pub top: Option<usize>,
}

/// Arguments for the what-if CLV scenario
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScenarioArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Retention change in percent (5 means +5%)
    #[arg(long, default_value = "0")]
    pub retention_delta: Decimal,

    /// Purchase-frequency change in percent
    #[arg(long, default_value = "0")]
    pub frequency_delta: Decimal,

    /// Average-order-value change in percent
    #[arg(long, default_value = "0")]
    pub monetary_delta: Decimal,

    /// Override the empirically derived baseline monthly retention (a rate,
    /// e.g. 0.75)
    #[arg(long)]
    pub baseline_retention: Option<Decimal>,

    /// Path to a JSON or YAML scenario file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_clv(args: ClvArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);

    let mut output = clv::empirical_clv(&filtered);
    if let Some(top) = args.top {
        output
            .result
            .sort_by(|a, b| b.historical.cmp(&a.historical));
        output.result.truncate(top);
    }
    Ok(serde_json::to_value(output)?)
}

pub fn run_scenario(args: ScenarioArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario: ScenarioInput = if let Some(ref path) = args.input {
        input::file::read_structured(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        // Slider-style flags arrive as percentages.
        let percent = dec!(100);
        ScenarioInput {
            deltas: ScenarioDeltas {
                retention: args.retention_delta / percent,
                frequency: args.frequency_delta / percent,
                monetary: args.monetary_delta / percent,
            },
            baseline_retention: args.baseline_retention,
        }
    };

    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);
    let analysis = cohort::analyze_cohorts(&filtered).result;

    let output = clv::simulate_scenario(&filtered, &analysis, &scenario)?;
    Ok(serde_json::to_value(output)?)
}
