use std::path::PathBuf;

use clap::{Args, ValueEnum};
use serde_json::Value;

use retail_analytics_core::clv;
use retail_analytics_core::cohort;
use retail_analytics_core::export::{
    self, ExportContext, ExportDataset, ExportFormat, ExportOutcome,
};
use retail_analytics_core::kpi;
use retail_analytics_core::rfm;

use crate::commands::{DataArgs, FilterArgs};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DatasetArg {
    Transactions,
    RfmSegments,
    CohortCounts,
    CohortRetention,
    ClvMetrics,
    Kpis,
}

impl From<DatasetArg> for ExportDataset {
    fn from(arg: DatasetArg) -> Self {
        match arg {
            DatasetArg::Transactions => ExportDataset::Transactions,
            DatasetArg::RfmSegments => ExportDataset::RfmSegments,
            DatasetArg::CohortCounts => ExportDataset::CohortCounts,
            DatasetArg::CohortRetention => ExportDataset::CohortRetention,
            DatasetArg::ClvMetrics => ExportDataset::ClvMetrics,
            DatasetArg::Kpis => ExportDataset::Kpis,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Spreadsheet workbook, one sheet per dataset
    Workbook,
    Csv,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Workbook => ExportFormat::Workbook,
            FormatArg::Csv => ExportFormat::Csv,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

/// Arguments for dataset export
#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub filter: FilterArgs,

    /// Datasets to export (repeatable)
    #[arg(long = "dataset", value_enum)]
    pub datasets: Vec<DatasetArg>,

    /// Export every dataset
    #[arg(long)]
    pub all: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    pub format: FormatArg,

    /// Destination directory
    #[arg(long, default_value = "exports")]
    pub out_dir: PathBuf,

    /// Also write the narrative executive report
    #[arg(long)]
    pub report: bool,
}

pub fn run_export(args: ExportArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let datasets: Vec<ExportDataset> = if args.all || args.datasets.is_empty() {
        ExportDataset::ALL.to_vec()
    } else {
        args.datasets.iter().map(|&d| d.into()).collect()
    };

    let bundle = args.data.load()?;
    let filtered = args.filter.filtered(&bundle);

    let analysis = cohort::analyze_cohorts(&filtered).result;
    let scores = rfm::score_customers(&filtered, None).result;
    let clv_values = clv::empirical_clv(&filtered).result;
    let kpis = kpi::summarize(&filtered).result;
    let segments = rfm::segment_summary(&scores).result;

    let ctx = ExportContext {
        transactions: &filtered,
        scores: &scores,
        cohorts: &analysis,
        clv: &clv_values,
        kpis: &kpis,
    };

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut outcomes = export::export_batch(&ctx, &datasets, args.format.into(), &args.out_dir, &stamp);

    if args.report {
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        let contents = export::executive_report(&kpis, &segments, &generated_at);
        outcomes.push(match export::write_report(&contents, &args.out_dir, &stamp) {
            Ok(path) => ExportOutcome {
                dataset: "Executive report".to_string(),
                path: Some(path),
                error: None,
            },
            Err(e) => ExportOutcome {
                dataset: "Executive report".to_string(),
                path: None,
                error: Some(e.to_string()),
            },
        });
    }

    if outcomes.iter().all(|o| o.error.is_some()) {
        return Err("every export in the batch failed".into());
    }
    Ok(serde_json::json!({ "outcomes": outcomes }))
}
