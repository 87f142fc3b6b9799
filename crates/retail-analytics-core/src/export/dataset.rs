use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::clv::CustomerClv;
use crate::cohort::CohortAnalysis;
use crate::kpi::KpiSummary;
use crate::loader::TransactionTable;
use crate::rfm::RfmScore;

/// Datasets a user can select for export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportDataset {
    Transactions,
    RfmSegments,
    CohortCounts,
    CohortRetention,
    ClvMetrics,
    Kpis,
}

impl ExportDataset {
    pub const ALL: [ExportDataset; 6] = [
        ExportDataset::Transactions,
        ExportDataset::RfmSegments,
        ExportDataset::CohortCounts,
        ExportDataset::CohortRetention,
        ExportDataset::ClvMetrics,
        ExportDataset::Kpis,
    ];

    /// File-name stem for per-dataset exports.
    pub fn slug(&self) -> &'static str {
        match self {
            ExportDataset::Transactions => "transactions",
            ExportDataset::RfmSegments => "rfm_segments",
            ExportDataset::CohortCounts => "cohort_counts",
            ExportDataset::CohortRetention => "cohort_retention",
            ExportDataset::ClvMetrics => "clv_metrics",
            ExportDataset::Kpis => "kpis",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExportDataset::Transactions => "Cleaned transactions",
            ExportDataset::RfmSegments => "RFM segments",
            ExportDataset::CohortCounts => "Cohort sizes by age",
            ExportDataset::CohortRetention => "Cohort retention rates",
            ExportDataset::ClvMetrics => "CLV metrics",
            ExportDataset::Kpis => "Consolidated KPIs",
        }
    }
}

/// A typed cell in an export table.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Number(Decimal),
    /// Outside the observation horizon or not applicable.
    Empty,
}

impl CellValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Int(n) => serde_json::Value::from(*n),
            CellValue::Number(d) => serde_json::Value::String(d.to_string()),
            CellValue::Empty => serde_json::Value::Null,
        }
    }

    pub fn to_field(&self) -> String {
        match self {
            CellValue::Text(s) => s.clone(),
            CellValue::Int(n) => n.to_string(),
            CellValue::Number(d) => d.to_string(),
            CellValue::Empty => String::new(),
        }
    }
}

/// A presentation-ready table: headers plus typed rows.
#[derive(Debug, Clone)]
pub struct ExportTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Everything the Export Manager draws from, computed once by the caller.
pub struct ExportContext<'a> {
    pub transactions: &'a TransactionTable,
    pub scores: &'a [RfmScore],
    pub cohorts: &'a CohortAnalysis,
    pub clv: &'a [CustomerClv],
    pub kpis: &'a KpiSummary,
}

/// Materialise one dataset as an export table.
pub fn build_table(dataset: ExportDataset, ctx: &ExportContext<'_>) -> ExportTable {
    match dataset {
        ExportDataset::Transactions => transactions_table(ctx),
        ExportDataset::RfmSegments => rfm_table(ctx),
        ExportDataset::CohortCounts => cohort_table(ctx, false),
        ExportDataset::CohortRetention => cohort_table(ctx, true),
        ExportDataset::ClvMetrics => clv_table(ctx),
        ExportDataset::Kpis => kpi_table(ctx),
    }
}

fn transactions_table(ctx: &ExportContext<'_>) -> ExportTable {
    let headers = [
        "Invoice",
        "StockCode",
        "Description",
        "Quantity",
        "InvoiceDate",
        "Price",
        "Customer ID",
        "Country",
        "Revenue",
    ];
    let rows = ctx
        .transactions
        .rows
        .iter()
        .map(|tx| {
            vec![
                CellValue::Text(tx.invoice_id.clone()),
                CellValue::Text(tx.stock_code.clone()),
                CellValue::Text(tx.description.clone()),
                CellValue::Int(tx.quantity),
                CellValue::Text(tx.invoice_date.format("%Y-%m-%d %H:%M:%S").to_string()),
                CellValue::Number(tx.unit_price),
                CellValue::Int(tx.customer_id as i64),
                CellValue::Text(tx.country.clone()),
                CellValue::Number(tx.revenue()),
            ]
        })
        .collect();

    ExportTable {
        name: ExportDataset::Transactions.label().to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

fn rfm_table(ctx: &ExportContext<'_>) -> ExportTable {
    let headers = [
        "Customer ID",
        "Recency",
        "Frequency",
        "Monetary",
        "R",
        "F",
        "M",
        "Segment",
    ];
    let rows = ctx
        .scores
        .iter()
        .map(|s| {
            vec![
                CellValue::Int(s.customer_id as i64),
                CellValue::Int(s.recency_days),
                CellValue::Int(s.frequency as i64),
                CellValue::Number(s.monetary),
                CellValue::Int(s.r as i64),
                CellValue::Int(s.f as i64),
                CellValue::Int(s.m as i64),
                CellValue::Text(s.segment.label().to_string()),
            ]
        })
        .collect();

    ExportTable {
        name: ExportDataset::RfmSegments.label().to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

fn cohort_table(ctx: &ExportContext<'_>, rates: bool) -> ExportTable {
    let analysis = ctx.cohorts;
    let max_offset = analysis.max_offset();

    let mut headers = vec!["Cohort".to_string()];
    headers.extend((0..=max_offset).map(|k| format!("M+{k}")));

    let rows = analysis
        .cohorts()
        .into_iter()
        .map(|cohort| {
            let mut row = vec![CellValue::Text(cohort.to_string())];
            for offset in 0..=max_offset {
                let cell = if rates {
                    analysis.retention_rate(cohort, offset)
                } else {
                    analysis.count(cohort, offset).map(Decimal::from)
                };
                row.push(cell.map_or(CellValue::Empty, CellValue::Number));
            }
            row
        })
        .collect();

    let dataset = if rates {
        ExportDataset::CohortRetention
    } else {
        ExportDataset::CohortCounts
    };
    ExportTable {
        name: dataset.label().to_string(),
        headers,
        rows,
    }
}

fn clv_table(ctx: &ExportContext<'_>) -> ExportTable {
    let headers = ["Customer ID", "Historical CLV", "Annualized CLV", "Tenure Days"];
    let rows = ctx
        .clv
        .iter()
        .map(|c| {
            vec![
                CellValue::Int(c.customer_id as i64),
                CellValue::Number(c.historical),
                CellValue::Number(c.annualized.round_dp(2)),
                CellValue::Int(c.tenure_days),
            ]
        })
        .collect();

    ExportTable {
        name: ExportDataset::ClvMetrics.label().to_string(),
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

fn kpi_table(ctx: &ExportContext<'_>) -> ExportTable {
    let kpis = ctx.kpis;
    let not_applicable = |v: Option<Decimal>| v.map_or(CellValue::Empty, CellValue::Number);

    let rows = vec![
        vec![
            CellValue::Text("Total revenue".into()),
            CellValue::Number(kpis.total_revenue),
        ],
        vec![
            CellValue::Text("Total customers".into()),
            CellValue::Int(kpis.total_customers as i64),
        ],
        vec![
            CellValue::Text("Total invoices".into()),
            CellValue::Int(kpis.total_invoices as i64),
        ],
        vec![
            CellValue::Text("Average order value".into()),
            not_applicable(kpis.avg_order_value.map(|v| v.round_dp(2))),
        ],
        vec![
            CellValue::Text("Average CLV".into()),
            not_applicable(kpis.avg_clv.map(|v| v.round_dp(2))),
        ],
        vec![
            CellValue::Text("Maximum CLV".into()),
            not_applicable(kpis.max_clv),
        ],
    ];

    ExportTable {
        name: ExportDataset::Kpis.label().to_string(),
        headers: vec!["Metric".to_string(), "Value".to_string()],
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clv::empirical_clv;
    use crate::cohort::analyze_cohorts;
    use crate::kpi::summarize;
    use crate::rfm::score_customers;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: u32, month: u32, amount: Decimal) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "21212".into(),
            description: "PACK OF 72 RETROSPOT CAKE CASES".into(),
            quantity: 3,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, month, 12)
                .unwrap()
                .and_hms_opt(13, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    #[test]
    fn test_tables_cover_every_dataset() {
        let table = TransactionTable::new(vec![
            tx("A1", 17850, 1, dec!(1.25)),
            tx("A2", 17850, 3, dec!(2.10)),
            tx("B1", 13047, 2, dec!(0.85)),
        ]);
        let analysis = analyze_cohorts(&table).result;
        let scores = score_customers(&table, None).result;
        let clv = empirical_clv(&table).result;
        let kpis = summarize(&table).result;
        let ctx = ExportContext {
            transactions: &table,
            scores: &scores,
            cohorts: &analysis,
            clv: &clv,
            kpis: &kpis,
        };

        for dataset in ExportDataset::ALL {
            let built = build_table(dataset, &ctx);
            assert!(!built.headers.is_empty(), "{dataset:?} lost its headers");
            assert!(!built.rows.is_empty(), "{dataset:?} built no rows");
            for row in &built.rows {
                assert_eq!(row.len(), built.headers.len(), "{dataset:?} row width");
            }
        }
    }

    #[test]
    fn test_cohort_retention_marks_horizon_cells_empty() {
        // Activity at offsets 0 and 2; offset 1 must export as blank.
        let table = TransactionTable::new(vec![
            tx("A1", 17850, 1, dec!(1.25)),
            tx("A2", 17850, 3, dec!(2.10)),
        ]);
        let analysis = analyze_cohorts(&table).result;
        let scores = score_customers(&table, None).result;
        let clv = empirical_clv(&table).result;
        let kpis = summarize(&table).result;
        let ctx = ExportContext {
            transactions: &table,
            scores: &scores,
            cohorts: &analysis,
            clv: &clv,
            kpis: &kpis,
        };

        let built = build_table(ExportDataset::CohortRetention, &ctx);
        assert_eq!(built.headers, vec!["Cohort", "M+0", "M+1", "M+2"]);
        assert_eq!(built.rows[0][2], CellValue::Empty);
    }

    #[test]
    fn test_kpi_table_uses_empty_cells_for_not_applicable() {
        let table = TransactionTable::default();
        let analysis = analyze_cohorts(&table).result;
        let scores = score_customers(&table, None).result;
        let clv = empirical_clv(&table).result;
        let kpis = summarize(&table).result;
        let ctx = ExportContext {
            transactions: &table,
            scores: &scores,
            cohorts: &analysis,
            clv: &clv,
            kpis: &kpis,
        };

        let built = build_table(ExportDataset::Kpis, &ctx);
        let aov_row = built
            .rows
            .iter()
            .find(|r| r[0] == CellValue::Text("Average order value".into()))
            .unwrap();
        assert_eq!(aov_row[1], CellValue::Empty);
    }
}
