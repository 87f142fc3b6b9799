mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::chart::ChartArgs;
use commands::clv::{ClvArgs, ScenarioArgs};
use commands::cohorts::CohortsArgs;
use commands::export::ExportArgs;
use commands::kpi::KpiArgs;
use commands::rfm::RfmArgs;

/// Retail customer analytics over the processed Online Retail II tables
#[derive(Parser)]
#[command(
    name = "mka",
    version,
    about = "Retail customer analytics: cohorts, RFM segments and CLV scenarios",
    long_about = "Computes marketing analytics over a processed retail transaction \
                  dataset: headline KPIs, acquisition-cohort retention, RFM \
                  segmentation, empirical CLV and what-if CLV scenarios, chart \
                  specifications for the dashboard front-end, and dataset exports."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Headline KPIs over the filtered transactions
    Kpi(KpiArgs),
    /// Acquisition-cohort retention analysis
    Cohorts(CohortsArgs),
    /// RFM scoring and segmentation
    Rfm(RfmArgs),
    /// Empirical customer lifetime value
    Clv(ClvArgs),
    /// What-if CLV scenario against the empirical baseline
    Scenario(ScenarioArgs),
    /// Build a chart specification for the dashboard front-end
    Chart(ChartArgs),
    /// Export selected datasets to workbook, CSV or JSON
    Export(ExportArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Kpi(args) => commands::kpi::run_kpi(args),
        Commands::Cohorts(args) => commands::cohorts::run_cohorts(args),
        Commands::Rfm(args) => commands::rfm::run_rfm(args),
        Commands::Clv(args) => commands::clv::run_clv(args),
        Commands::Scenario(args) => commands::clv::run_scenario(args),
        Commands::Chart(args) => commands::chart::run_chart(args),
        Commands::Export(args) => commands::export::run_export(args),
        Commands::Version => {
            println!("mka {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
