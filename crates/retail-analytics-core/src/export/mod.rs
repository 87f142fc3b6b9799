//! Export Manager: serialises selected analytic datasets to spreadsheet,
//! delimited-text and structured-text files, plus a narrative executive
//! report. One failed dataset never aborts the rest of a batch.

pub mod dataset;
pub mod report;
pub mod writers;

pub use dataset::{build_table, CellValue, ExportContext, ExportDataset, ExportTable};
pub use report::executive_report;
pub use writers::{export_batch, write_report, ExportFormat, ExportOutcome};
