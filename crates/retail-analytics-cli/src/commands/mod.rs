pub mod chart;
pub mod clv;
pub mod cohorts;
pub mod export;
pub mod kpi;
pub mod rfm;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;

use retail_analytics_core::filter::{CustomerType, TransactionFilter};
use retail_analytics_core::loader::{DashboardBundle, DataCache, DataPaths, TransactionTable};
use retail_analytics_core::types::DateRange;

/// Where the processed tables live.
#[derive(Args)]
pub struct DataArgs {
    /// Directory containing the processed CSV tables
    #[arg(long, default_value = "data/processed")]
    pub data_dir: PathBuf,
}

impl DataArgs {
    /// Load and validate all four tables. The cache is per-invocation here;
    /// long-lived hosts (the bindings layer) hold one across calls.
    pub fn load(&self) -> Result<Arc<DashboardBundle>, Box<dyn std::error::Error>> {
        let mut cache = DataCache::new();
        Ok(cache.load(&DataPaths::from_dir(&self.data_dir))?)
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CustomerTypeArg {
    All,
    Retail,
    Wholesale,
}

impl From<CustomerTypeArg> for CustomerType {
    fn from(arg: CustomerTypeArg) -> Self {
        match arg {
            CustomerTypeArg::All => CustomerType::All,
            CustomerTypeArg::Retail => CustomerType::Retail,
            CustomerTypeArg::Wholesale => CustomerType::Wholesale,
        }
    }
}

/// Filter flags shared by every analytic subcommand.
#[derive(Args)]
pub struct FilterArgs {
    /// Start of the analysis window (YYYY-MM-DD, defaults to the first
    /// observed transaction)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// End of the analysis window (YYYY-MM-DD, defaults to the last
    /// observed transaction)
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Restrict to these countries (repeatable)
    #[arg(long = "country")]
    pub countries: Vec<String>,

    /// Restrict to retail or wholesale customers
    #[arg(long, value_enum, default_value = "all")]
    pub customer_type: CustomerTypeArg,

    /// Drop transaction lines below this revenue
    #[arg(long)]
    pub min_order_value: Option<Decimal>,
}

impl FilterArgs {
    /// Resolve the flags into a filter, defaulting open date bounds to the
    /// table's observed span.
    pub fn to_filter(&self, table: &TransactionTable) -> TransactionFilter {
        let date_range = match (self.from, self.to, table.date_span()) {
            (None, None, _) => None,
            (from, to, Some(span)) => Some(DateRange::new(
                from.unwrap_or(span.start),
                to.unwrap_or(span.end),
            )),
            (Some(from), to, None) => Some(DateRange::new(from, to.unwrap_or(from))),
            (None, Some(to), None) => Some(DateRange::new(to, to)),
        };

        TransactionFilter {
            date_range,
            countries: if self.countries.is_empty() {
                None
            } else {
                Some(self.countries.iter().cloned().collect())
            },
            customer_type: self.customer_type.into(),
            min_order_value: self.min_order_value,
            ..TransactionFilter::default()
        }
    }

    /// The filtered view every analytic consumes.
    pub fn filtered(&self, bundle: &DashboardBundle) -> TransactionTable {
        self.to_filter(&bundle.transactions).apply(&bundle.transactions)
    }
}
