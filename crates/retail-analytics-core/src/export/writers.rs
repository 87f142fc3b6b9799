use std::path::{Path, PathBuf};

use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::export::dataset::{build_table, CellValue, ExportContext, ExportDataset, ExportTable};
use crate::AnalyticsResult;

/// Output formats for dataset exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// One workbook, one sheet per dataset.
    Workbook,
    /// One delimited-text file per dataset.
    Csv,
    /// One structured-text (records) file per dataset.
    Json,
}

/// Result of exporting one dataset within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutcome {
    pub dataset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportOutcome {
    fn ok(dataset: ExportDataset, path: PathBuf) -> Self {
        ExportOutcome {
            dataset: dataset.label().to_string(),
            path: Some(path),
            error: None,
        }
    }

    fn failed(dataset: ExportDataset, error: &AnalyticsError) -> Self {
        ExportOutcome {
            dataset: dataset.label().to_string(),
            path: None,
            error: Some(error.to_string()),
        }
    }
}

/// Export the selected datasets. Failures are reported per dataset; the rest
/// of the batch still proceeds. Filenames carry the caller's timestamp stamp.
pub fn export_batch(
    ctx: &ExportContext<'_>,
    datasets: &[ExportDataset],
    format: ExportFormat,
    out_dir: &Path,
    stamp: &str,
) -> Vec<ExportOutcome> {
    if let Err(e) = std::fs::create_dir_all(out_dir) {
        let error = AnalyticsError::ExportFailure {
            dataset: "all".to_string(),
            reason: format!("cannot create '{}': {e}", out_dir.display()),
        };
        return datasets
            .iter()
            .map(|&d| ExportOutcome::failed(d, &error))
            .collect();
    }

    match format {
        ExportFormat::Workbook => export_workbook(ctx, datasets, out_dir, stamp),
        ExportFormat::Csv | ExportFormat::Json => datasets
            .iter()
            .map(|&dataset| {
                let table = build_table(dataset, ctx);
                let result = match format {
                    ExportFormat::Csv => {
                        let path = out_dir.join(format!("{}_{stamp}.csv", dataset.slug()));
                        write_csv(&table, &path).map(|()| path)
                    }
                    ExportFormat::Json => {
                        let path = out_dir.join(format!("{}_{stamp}.json", dataset.slug()));
                        write_json(&table, &path).map(|()| path)
                    }
                    ExportFormat::Workbook => unreachable!(),
                };
                match result {
                    Ok(path) => {
                        log::info!("exported {} to {}", dataset.label(), path.display());
                        ExportOutcome::ok(dataset, path)
                    }
                    Err(e) => {
                        log::warn!("export of {} failed: {e}", dataset.label());
                        ExportOutcome::failed(dataset, &e)
                    }
                }
            })
            .collect(),
    }
}

fn export_workbook(
    ctx: &ExportContext<'_>,
    datasets: &[ExportDataset],
    out_dir: &Path,
    stamp: &str,
) -> Vec<ExportOutcome> {
    let path = out_dir.join(format!("analytics_export_{stamp}.xlsx"));
    let tables: Vec<(ExportDataset, ExportTable)> = datasets
        .iter()
        .map(|&d| (d, build_table(d, ctx)))
        .collect();

    match write_workbook(tables.iter().map(|(_, t)| t), &path) {
        Ok(()) => {
            log::info!("exported workbook to {}", path.display());
            tables
                .iter()
                .map(|(d, _)| ExportOutcome::ok(*d, path.clone()))
                .collect()
        }
        Err(e) => {
            log::warn!("workbook export failed: {e}");
            tables.iter().map(|(d, _)| ExportOutcome::failed(*d, &e)).collect()
        }
    }
}

/// Write one table as delimited text.
pub fn write_csv(table: &ExportTable, path: &Path) -> AnalyticsResult<()> {
    let fail = |reason: String| AnalyticsError::ExportFailure {
        dataset: table.name.clone(),
        reason,
    };

    let mut writer = csv::Writer::from_path(path).map_err(|e| fail(e.to_string()))?;
    writer
        .write_record(&table.headers)
        .map_err(|e| fail(e.to_string()))?;
    for row in &table.rows {
        let record: Vec<String> = row.iter().map(CellValue::to_field).collect();
        writer.write_record(&record).map_err(|e| fail(e.to_string()))?;
    }
    writer.flush().map_err(|e| fail(e.to_string()))
}

/// Write one table as an array of header-keyed records.
pub fn write_json(table: &ExportTable, path: &Path) -> AnalyticsResult<()> {
    let fail = |reason: String| AnalyticsError::ExportFailure {
        dataset: table.name.clone(),
        reason,
    };

    let records: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), cell.to_json()))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    let contents =
        serde_json::to_string_pretty(&records).map_err(|e| fail(e.to_string()))?;
    std::fs::write(path, contents).map_err(|e| fail(e.to_string()))
}

/// Write every table into one workbook, one sheet each. The spreadsheet
/// boundary is f64; Decimal values convert lossily there and nowhere else.
pub fn write_workbook<'a>(
    tables: impl Iterator<Item = &'a ExportTable>,
    path: &Path,
) -> AnalyticsResult<()> {
    let fail = |reason: String| AnalyticsError::ExportFailure {
        dataset: "workbook".to_string(),
        reason,
    };

    let mut workbook = rust_xlsxwriter::Workbook::new();
    for table in tables {
        let sheet = workbook.add_worksheet();
        // Sheet names are capped at 31 characters by the format.
        let name: String = table.name.chars().take(31).collect();
        sheet.set_name(&name).map_err(|e| fail(e.to_string()))?;

        for (col, header) in table.headers.iter().enumerate() {
            sheet
                .write_string(0, col as u16, header.as_str())
                .map_err(|e| fail(e.to_string()))?;
        }
        for (r, row) in table.rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (row_idx, col_idx) = ((r + 1) as u32, c as u16);
                match cell {
                    CellValue::Text(s) => {
                        sheet
                            .write_string(row_idx, col_idx, s.as_str())
                            .map_err(|e| fail(e.to_string()))?;
                    }
                    CellValue::Int(n) => {
                        sheet
                            .write_number(row_idx, col_idx, *n as f64)
                            .map_err(|e| fail(e.to_string()))?;
                    }
                    CellValue::Number(d) => {
                        sheet
                            .write_number(row_idx, col_idx, d.to_f64().unwrap_or(0.0))
                            .map_err(|e| fail(e.to_string()))?;
                    }
                    CellValue::Empty => {}
                }
            }
        }
    }

    workbook.save(path).map_err(|e| fail(e.to_string()))
}

/// Write the narrative executive report next to the other exports.
pub fn write_report(contents: &str, out_dir: &Path, stamp: &str) -> AnalyticsResult<PathBuf> {
    std::fs::create_dir_all(out_dir).map_err(|e| AnalyticsError::ExportFailure {
        dataset: "executive report".to_string(),
        reason: format!("cannot create '{}': {e}", out_dir.display()),
    })?;
    let path = out_dir.join(format!("executive_report_{stamp}.md"));
    std::fs::write(&path, contents).map_err(|e| AnalyticsError::ExportFailure {
        dataset: "executive report".to_string(),
        reason: e.to_string(),
    })?;
    Ok(path)
}
