use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};

use napi::Result as NapiResult;
use napi_derive::napi;

use retail_analytics_core::clv::{self, ScenarioInput};
use retail_analytics_core::cohort;
use retail_analytics_core::filter::TransactionFilter;
use retail_analytics_core::kpi;
use retail_analytics_core::loader::{DashboardBundle, DataCache, DataPaths, TransactionTable};
use retail_analytics_core::rfm;
use retail_analytics_core::viz;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// The napi module is the dashboard's composition root, so it owns the
// process-wide load cache.
static CACHE: OnceLock<Mutex<DataCache>> = OnceLock::new();

fn load_bundle(data_dir: &str) -> NapiResult<Arc<DashboardBundle>> {
    let cache = CACHE.get_or_init(|| Mutex::new(DataCache::new()));
    let mut guard = cache.lock().map_err(to_napi_error)?;
    guard
        .load(&DataPaths::from_dir(Path::new(data_dir)))
        .map_err(to_napi_error)
}

fn parse_filter(filter_json: &str) -> NapiResult<TransactionFilter> {
    if filter_json.trim().is_empty() {
        return Ok(TransactionFilter::default());
    }
    serde_json::from_str(filter_json).map_err(to_napi_error)
}

fn filtered_table(data_dir: &str, filter_json: &str) -> NapiResult<TransactionTable> {
    let bundle = load_bundle(data_dir)?;
    let filter = parse_filter(filter_json)?;
    Ok(filter.apply(&bundle.transactions))
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Validate the processed tables and report their shapes.
#[napi]
pub fn load_summary(data_dir: String) -> NapiResult<String> {
    let bundle = load_bundle(&data_dir)?;
    let summary = serde_json::json!({
        "transactions": bundle.transactions.len(),
        "customers": bundle.transactions.distinct_customers(),
        "rfm_records": bundle.rfm.records.len(),
        "customer_stats": bundle.customer_stats.rows.len(),
        "cohort_assignments": bundle.cohorts.assignments.len(),
        "countries": bundle.transactions.countries(),
        "date_span": bundle.transactions.date_span(),
    });
    serde_json::to_string(&summary).map_err(to_napi_error)
}

/// Drop the cached tables (the explicit-refresh action in the dashboard).
#[napi]
pub fn invalidate_cache(data_dir: String) -> NapiResult<()> {
    if let Some(cache) = CACHE.get() {
        let mut guard = cache.lock().map_err(to_napi_error)?;
        guard.invalidate(&DataPaths::from_dir(Path::new(&data_dir)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

#[napi]
pub fn kpi_summary(data_dir: String, filter_json: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let output = kpi::summarize(&table);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn cohort_analysis(data_dir: String, filter_json: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let output = cohort::analyze_cohorts(&table);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn rfm_segments(data_dir: String, filter_json: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let output = rfm::score_customers(&table, None);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn segment_statistics(data_dir: String, filter_json: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let scores = rfm::score_customers(&table, None).result;
    let output = rfm::segment_summary(&scores);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn empirical_clv(data_dir: String, filter_json: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let output = clv::empirical_clv(&table);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn clv_scenario(
    data_dir: String,
    filter_json: String,
    scenario_json: String,
) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;
    let scenario: ScenarioInput = serde_json::from_str(&scenario_json).map_err(to_napi_error)?;
    let analysis = cohort::analyze_cohorts(&table).result;
    let output = clv::simulate_scenario(&table, &analysis, &scenario).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Charts
// ---------------------------------------------------------------------------

/// Build a chart specification for the front-end renderer. `kind` selects
/// the chart; empty-data specs come back flagged as `no_data`.
#[napi]
pub fn chart_spec(data_dir: String, filter_json: String, kind: String) -> NapiResult<String> {
    let table = filtered_table(&data_dir, &filter_json)?;

    let spec = match kind.as_str() {
        "cohort_heatmap" => {
            viz::cohort_retention_heatmap(&cohort::analyze_cohorts(&table).result)
        }
        "cohort_counts" => viz::cohort_count_heatmap(&cohort::analyze_cohorts(&table).result),
        "cohort_sizes" => viz::cohort_sizes(&cohort::analyze_cohorts(&table).result),
        "retention_curves" => {
            let analysis = cohort::analyze_cohorts(&table).result;
            let cohorts = analysis.cohorts();
            viz::retention_curves(&analysis, &cohorts)
        }
        "revenue_trend" => viz::monthly_revenue_trend(&table),
        "top_countries" => viz::top_countries(&table, 10),
        "order_values" => viz::order_value_histogram(&table),
        "segment_distribution" => {
            let scores = rfm::score_customers(&table, None).result;
            viz::segment_distribution(&rfm::segment_summary(&scores).result)
        }
        "segment_treemap" => {
            let scores = rfm::score_customers(&table, None).result;
            viz::segment_treemap(&rfm::segment_summary(&scores).result)
        }
        "rfm_scatter" => viz::rfm_scatter(&rfm::score_customers(&table, None).result),
        other => {
            return Err(napi::Error::from_reason(format!(
                "unknown chart kind '{other}'"
            )))
        }
    };

    let wrapped = serde_json::json!({
        "no_data": spec.is_empty(),
        "spec": spec,
    });
    serde_json::to_string(&wrapped).map_err(to_napi_error)
}
