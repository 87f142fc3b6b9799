//! Data Loader: reads the four processed tables produced by the upstream
//! cleaning pipeline into typed in-memory tables, validating presence and
//! shape. A missing or empty file is a blocking `DataMissing` condition —
//! there is no partial dashboard state.

pub mod cache;
pub mod tables;

pub use cache::{DataCache, DataPaths};
pub use tables::{
    CohortAssignmentsTable, CustomerStatsTable, DashboardBundle, RfmMetricsRecord,
    RfmMetricsTable, TransactionTable,
};
