use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Missing data: {table} — {reason}")]
    DataMissing { table: String, reason: String },

    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Malformed record in {table} at line {line}: {reason}")]
    MalformedRecord {
        table: String,
        line: u64,
        reason: String,
    },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Export of '{dataset}' failed: {reason}")]
    ExportFailure { dataset: String, reason: String },

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for AnalyticsError {
    fn from(e: serde_json::Error) -> Self {
        AnalyticsError::SerializationError(e.to_string())
    }
}
