use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use retail_analytics_core::clv::{self, ScenarioDeltas, ScenarioInput};
use retail_analytics_core::cohort;
use retail_analytics_core::rfm;
use retail_analytics_core::types::MonthKey;
use retail_analytics_core::viz;

use crate::commands::{DataArgs, FilterArgs};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChartKind {
    /// Cohort retention-rate heatmap
    CohortHeatmap,
    /// Cohort active-customer-count heatmap
    CohortCounts,
    /// Retention curves for selected cohorts
    RetentionCurves,
    /// Customers per acquisition cohort
    CohortSizes,
    /// Monthly revenue trend
    RevenueTrend,
    /// Top countries by revenue
    TopCountries,
    /// Order value distribution
    OrderValues,
    /// Customers per RFM segment
    SegmentDistribution,
    /// Segment treemap sized by customers, coloured by revenue
    SegmentTreemap,
    /// Three-dimensional RFM scatter
    RfmScatter,
    /// Baseline vs scenario CLV histograms
    ClvComparison,
}

/// Arguments for chart-specification building
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ChartArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Which chart to build
    #[arg(long, value_enum)]
    pub chart: ChartKind,

    /// Cohorts for the retention curves (YYYY-MM, repeatable; defaults to
    /// every cohort)
    #[arg(long = "cohort")]
    pub cohorts: Vec<String>,

    /// Country count for the top-countries chart
    #[arg(long, default_value = "10")]
    pub limit: usize,

    /// Retention change in percent, for the CLV comparison
    #[arg(long, default_value = "0")]
    pub retention_delta: Decimal,

    /// Frequency change in percent, for the CLV comparison
    #[arg(long, default_value = "0")]
    pub frequency_delta: Decimal,

    /// Monetary change in percent, for the CLV comparison
    #[arg(long, default_value = "0")]
    pub monetary_delta: Decimal,
}

pub fn run_chart(args: ChartArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);

    let spec = match args.chart {
        ChartKind::CohortHeatmap => {
            viz::cohort_retention_heatmap(&cohort::analyze_cohorts(&filtered).result)
        }
        ChartKind::CohortCounts => {
            viz::cohort_count_heatmap(&cohort::analyze_cohorts(&filtered).result)
        }
        ChartKind::RetentionCurves => {
            let analysis = cohort::analyze_cohorts(&filtered).result;
            let selected: Vec<MonthKey> = if args.cohorts.is_empty() {
                analysis.cohorts()
            } else {
                args.cohorts
                    .iter()
                    .map(|s| s.parse())
                    .collect::<Result<_, _>>()?
            };
            viz::retention_curves(&analysis, &selected)
        }
        ChartKind::CohortSizes => viz::cohort_sizes(&cohort::analyze_cohorts(&filtered).result),
        ChartKind::RevenueTrend => viz::monthly_revenue_trend(&filtered),
        ChartKind::TopCountries => viz::top_countries(&filtered, args.limit),
        ChartKind::OrderValues => viz::order_value_histogram(&filtered),
        ChartKind::SegmentDistribution => {
            let scores = rfm::score_customers(&filtered, None).result;
            viz::segment_distribution(&rfm::segment_summary(&scores).result)
        }
        ChartKind::SegmentTreemap => {
            let scores = rfm::score_customers(&filtered, None).result;
            viz::segment_treemap(&rfm::segment_summary(&scores).result)
        }
        ChartKind::RfmScatter => {
            viz::rfm_scatter(&rfm::score_customers(&filtered, None).result)
        }
        ChartKind::ClvComparison => {
            let percent = dec!(100);
            let scenario = ScenarioInput {
                deltas: ScenarioDeltas {
                    retention: args.retention_delta / percent,
                    frequency: args.frequency_delta / percent,
                    monetary: args.monetary_delta / percent,
                },
                baseline_retention: None,
            };
            let analysis = cohort::analyze_cohorts(&filtered).result;
            let output = clv::simulate_scenario(&filtered, &analysis, &scenario)?;
            viz::clv_comparison(&output.result)
        }
    };

    Ok(serde_json::json!({
        "no_data": spec.is_empty(),
        "spec": spec,
    }))
}
