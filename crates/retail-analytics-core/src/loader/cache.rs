use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::AnalyticsError;
use crate::loader::tables::{
    CohortAssignmentsTable, CustomerStatsTable, DashboardBundle, RfmMetricsTable, TransactionTable,
};
use crate::AnalyticsResult;

/// Locations of the four processed input tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPaths {
    pub transactions: PathBuf,
    pub rfm_metrics: PathBuf,
    pub customer_stats: PathBuf,
    pub cohorts: PathBuf,
}

impl DataPaths {
    /// Conventional file names inside a processed-data directory.
    pub fn from_dir(dir: &Path) -> Self {
        DataPaths {
            transactions: dir.join("online_retail_clean.csv"),
            rfm_metrics: dir.join("rfm_metrics.csv"),
            customer_stats: dir.join("customer_stats.csv"),
            cohorts: dir.join("customer_cohorts.csv"),
        }
    }

    fn all(&self) -> [&Path; 4] {
        [
            &self.transactions,
            &self.rfm_metrics,
            &self.customer_stats,
            &self.cohorts,
        ]
    }
}

struct CacheEntry {
    modified: [SystemTime; 4],
    bundle: Arc<DashboardBundle>,
}

/// Session-wide load cache, keyed by file paths and modification times.
///
/// Owned by the composition root (CLI, bindings layer) rather than living as
/// a module-level singleton. An entry is reused only while none of the four
/// underlying files has changed on disk; `invalidate` and `clear` cover the
/// explicit-refresh user action.
#[derive(Default)]
pub struct DataCache {
    entries: HashMap<DataPaths, CacheEntry>,
}

impl DataCache {
    pub fn new() -> Self {
        DataCache::default()
    }

    /// Load the bundle, reusing the cached copy when files are unchanged.
    pub fn load(&mut self, paths: &DataPaths) -> AnalyticsResult<Arc<DashboardBundle>> {
        let modified = stat_all(paths)?;

        if let Some(entry) = self.entries.get(paths) {
            if entry.modified == modified {
                log::debug!("data cache hit for {}", paths.transactions.display());
                return Ok(Arc::clone(&entry.bundle));
            }
            log::debug!(
                "data cache stale for {} (file changed on disk)",
                paths.transactions.display()
            );
        }

        let bundle = Arc::new(read_bundle(paths)?);
        self.entries.insert(
            paths.clone(),
            CacheEntry {
                modified,
                bundle: Arc::clone(&bundle),
            },
        );
        Ok(bundle)
    }

    /// Drop the cached entry for one path set.
    pub fn invalidate(&mut self, paths: &DataPaths) {
        self.entries.remove(paths);
    }

    /// Drop everything (the explicit-refresh action).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn read_bundle(paths: &DataPaths) -> AnalyticsResult<DashboardBundle> {
    Ok(DashboardBundle {
        transactions: TransactionTable::read_csv(&paths.transactions)?,
        rfm: RfmMetricsTable::read_csv(&paths.rfm_metrics)?,
        customer_stats: CustomerStatsTable::read_csv(&paths.customer_stats)?,
        cohorts: CohortAssignmentsTable::read_csv(&paths.cohorts)?,
    })
}

fn stat_all(paths: &DataPaths) -> AnalyticsResult<[SystemTime; 4]> {
    let mut times = [SystemTime::UNIX_EPOCH; 4];
    for (slot, path) in times.iter_mut().zip(paths.all()) {
        let meta = std::fs::metadata(path).map_err(|e| AnalyticsError::DataMissing {
            table: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            reason: format!("cannot stat '{}': {e}", path.display()),
        })?;
        *slot = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    }
    Ok(times)
}
