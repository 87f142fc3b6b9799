pub mod error;
pub mod types;

pub mod loader;

pub mod filter;

pub mod customers;

pub mod kpi;

pub mod cohort;

pub mod rfm;

pub mod clv;

#[cfg(feature = "viz")]
pub mod viz;

#[cfg(feature = "export")]
pub mod export;

pub use error::AnalyticsError;
pub use types::*;

/// Standard result type for all analytics operations
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
