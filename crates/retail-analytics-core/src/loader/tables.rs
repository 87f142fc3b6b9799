use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;
use crate::types::{CustomerId, DateRange, Money, MonthKey, Transaction};
use crate::AnalyticsResult;

/// The main cleaned transaction table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionTable {
    pub rows: Vec<Transaction>,
}

impl TransactionTable {
    pub fn new(rows: Vec<Transaction>) -> Self {
        TransactionTable { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inclusive span of invoice dates, or None for an empty table.
    pub fn date_span(&self) -> Option<DateRange> {
        let first = self.rows.iter().map(|t| t.invoice_date.date()).min()?;
        let last = self.rows.iter().map(|t| t.invoice_date.date()).max()?;
        Some(DateRange::new(first, last))
    }

    pub fn distinct_customers(&self) -> u64 {
        let mut ids: Vec<CustomerId> = self.rows.iter().map(|t| t.customer_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len() as u64
    }

    pub fn distinct_invoices(&self) -> u64 {
        let mut ids: Vec<&str> = self.rows.iter().map(|t| t.invoice_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len() as u64
    }

    pub fn countries(&self) -> Vec<String> {
        let mut countries: Vec<String> = self.rows.iter().map(|t| t.country.clone()).collect();
        countries.sort();
        countries.dedup();
        countries
    }

    pub fn total_revenue(&self) -> Money {
        self.rows.iter().map(|t| t.revenue()).sum()
    }

    /// Load from a delimited-text file with the cleaned Online Retail II layout.
    pub fn read_csv(path: &Path) -> AnalyticsResult<Self> {
        const TABLE: &str = "transactions";
        let mut reader = open_reader(path, TABLE)?;
        let columns = Columns::resolve(&mut reader, TABLE)?;

        let invoice = columns.require("invoice id", &["Invoice", "InvoiceNo", "Invoice ID"])?;
        let stock = columns.require("stock code", &["StockCode", "Stock Code"])?;
        let description = columns.require("description", &["Description"])?;
        let quantity = columns.require("quantity", &["Quantity"])?;
        let date = columns.require("invoice date", &["InvoiceDate", "Invoice Date"])?;
        let price = columns.require("unit price", &["Price", "UnitPrice", "Unit Price"])?;
        let customer = columns.require("customer id", &["Customer ID", "CustomerID"])?;
        let country = columns.require("country", &["Country"])?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| malformed(TABLE, 0, e.to_string()))?;
            let line = record_line(&record);
            rows.push(Transaction {
                invoice_id: field(&record, invoice).to_string(),
                stock_code: field(&record, stock).to_string(),
                description: field(&record, description).to_string(),
                quantity: parse_i64(field(&record, quantity), TABLE, line)?,
                unit_price: parse_decimal(field(&record, price), TABLE, line)?,
                invoice_date: parse_datetime(field(&record, date), TABLE, line)?,
                customer_id: parse_customer_id(field(&record, customer), TABLE, line)?,
                country: field(&record, country).to_string(),
            });
        }

        require_rows(TABLE, rows.len())?;
        log::debug!("loaded {} transaction rows from {}", rows.len(), path.display());
        Ok(TransactionTable { rows })
    }
}

/// One row of the upstream per-customer RFM metrics extract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmMetricsRecord {
    pub customer_id: CustomerId,
    pub recency_days: i64,
    pub frequency: u64,
    pub monetary: Money,
}

/// Pre-computed RFM metrics from the upstream pipeline. The segmenter
/// recomputes scores from transactions when a filter is active; this table is
/// the unfiltered reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfmMetricsTable {
    pub records: Vec<RfmMetricsRecord>,
}

impl RfmMetricsTable {
    pub fn read_csv(path: &Path) -> AnalyticsResult<Self> {
        const TABLE: &str = "rfm_metrics";
        let mut reader = open_reader(path, TABLE)?;
        let columns = Columns::resolve(&mut reader, TABLE)?;

        // The upstream export writes the customer id as an unnamed index column.
        let customer = columns.require("customer id", &["Customer ID", "CustomerID", ""])?;
        let recency = columns.require("recency", &["Recency"])?;
        let frequency = columns.require("frequency", &["Frequency"])?;
        let monetary = columns.require("monetary", &["Monetary"])?;

        let mut records = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| malformed(TABLE, 0, e.to_string()))?;
            let line = record_line(&record);
            records.push(RfmMetricsRecord {
                customer_id: parse_customer_id(field(&record, customer), TABLE, line)?,
                recency_days: parse_i64(field(&record, recency), TABLE, line)?,
                frequency: parse_i64(field(&record, frequency), TABLE, line)?.max(0) as u64,
                monetary: parse_decimal(field(&record, monetary), TABLE, line)?,
            });
        }

        require_rows(TABLE, records.len())?;
        Ok(RfmMetricsTable { records })
    }
}

/// Upstream per-customer descriptive statistics. Carried through for display;
/// every analytic in this crate recomputes its own aggregates from the
/// transaction table so filters apply consistently.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerStatsTable {
    pub headers: Vec<String>,
    pub rows: Vec<(CustomerId, Vec<String>)>,
}

impl CustomerStatsTable {
    pub fn read_csv(path: &Path) -> AnalyticsResult<Self> {
        const TABLE: &str = "customer_stats";
        let mut reader = open_reader(path, TABLE)?;
        let columns = Columns::resolve(&mut reader, TABLE)?;
        let customer = columns.require("customer id", &["Customer ID", "CustomerID", ""])?;

        let headers = columns.names.clone();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| malformed(TABLE, 0, e.to_string()))?;
            let line = record_line(&record);
            let id = parse_customer_id(field(&record, customer), TABLE, line)?;
            rows.push((id, record.iter().map(str::to_string).collect()));
        }

        require_rows(TABLE, rows.len())?;
        Ok(CustomerStatsTable { headers, rows })
    }
}

/// Upstream cohort assignments: each customer's acquisition month.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohortAssignmentsTable {
    pub assignments: BTreeMap<CustomerId, MonthKey>,
}

impl CohortAssignmentsTable {
    pub fn read_csv(path: &Path) -> AnalyticsResult<Self> {
        const TABLE: &str = "customer_cohorts";
        let mut reader = open_reader(path, TABLE)?;
        let columns = Columns::resolve(&mut reader, TABLE)?;
        let customer = columns.require("customer id", &["Customer ID", "CustomerID"])?;
        let cohort = columns.require("cohort month", &["CohortMonth", "Cohort Month"])?;

        let mut assignments = BTreeMap::new();
        for record in reader.records() {
            let record = record.map_err(|e| malformed(TABLE, 0, e.to_string()))?;
            let line = record_line(&record);
            let id = parse_customer_id(field(&record, customer), TABLE, line)?;
            let month: MonthKey = field(&record, cohort)
                .parse()
                .map_err(|e: AnalyticsError| malformed(TABLE, line, e.to_string()))?;
            assignments.insert(id, month);
        }

        require_rows(TABLE, assignments.len())?;
        Ok(CohortAssignmentsTable { assignments })
    }
}

/// Everything the dashboard needs, loaded and validated as a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardBundle {
    pub transactions: TransactionTable,
    pub rfm: RfmMetricsTable,
    pub customer_stats: CustomerStatsTable,
    pub cohorts: CohortAssignmentsTable,
}

// ---------------------------------------------------------------------------
// CSV plumbing
// ---------------------------------------------------------------------------

struct Columns {
    names: Vec<String>,
    table: String,
}

impl Columns {
    fn resolve(reader: &mut csv::Reader<File>, table: &str) -> AnalyticsResult<Self> {
        let headers = reader.headers().map_err(|e| AnalyticsError::DataMissing {
            table: table.to_string(),
            reason: format!("cannot read header row: {e}"),
        })?;
        Ok(Columns {
            names: headers.iter().map(|h| h.trim().to_string()).collect(),
            table: table.to_string(),
        })
    }

    /// Find a column by any of its accepted header spellings.
    fn require(&self, label: &str, aliases: &[&str]) -> AnalyticsResult<usize> {
        self.names
            .iter()
            .position(|name| aliases.iter().any(|a| a.eq_ignore_ascii_case(name)))
            .ok_or_else(|| AnalyticsError::MissingColumn {
                table: self.table.clone(),
                column: label.to_string(),
            })
    }
}

fn open_reader(path: &Path, table: &str) -> AnalyticsResult<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| AnalyticsError::DataMissing {
        table: table.to_string(),
        reason: format!("cannot open '{}': {e}", path.display()),
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(file))
}

fn require_rows(table: &str, count: usize) -> AnalyticsResult<()> {
    if count == 0 {
        return Err(AnalyticsError::DataMissing {
            table: table.to_string(),
            reason: "file contains no data rows".to_string(),
        });
    }
    Ok(())
}

fn field<'a>(record: &'a csv::StringRecord, index: usize) -> &'a str {
    record.get(index).unwrap_or("")
}

fn record_line(record: &csv::StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

fn malformed(table: &str, line: u64, reason: String) -> AnalyticsError {
    AnalyticsError::MalformedRecord {
        table: table.to_string(),
        line,
        reason,
    }
}

fn parse_decimal(value: &str, table: &str, line: u64) -> AnalyticsResult<Decimal> {
    value
        .parse::<Decimal>()
        .map_err(|_| malformed(table, line, format!("'{value}' is not a decimal number")))
}

fn parse_i64(value: &str, table: &str, line: u64) -> AnalyticsResult<i64> {
    // Upstream exports sometimes carry an integral float ("3.0").
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    parse_decimal(value, table, line)?
        .trunc()
        .to_i64()
        .ok_or_else(|| malformed(table, line, format!("'{value}' is not an integer")))
}

fn parse_customer_id(value: &str, table: &str, line: u64) -> AnalyticsResult<CustomerId> {
    // Customer ids round-trip through pandas as floats ("17850.0").
    parse_decimal(value, table, line)?
        .trunc()
        .to_u32()
        .ok_or_else(|| malformed(table, line, format!("'{value}' is not a customer id")))
}

fn parse_datetime(value: &str, table: &str, line: u64) -> AnalyticsResult<NaiveDateTime> {
    const FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%m/%d/%Y %H:%M"];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }
    // Date-only values are floored to midnight.
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(malformed(
        table,
        line,
        format!("'{value}' is not a recognised timestamp"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    const TX_CSV: &str = "\
Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country
536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01 08:26:00,2.55,17850.0,United Kingdom
536366,71053,WHITE METAL LANTERN,6,2010-12-01 08:28:00,3.39,17850.0,United Kingdom
536367,84406B,CREAM CUPID HEARTS COAT HANGER,8,2010-12-01 08:34:00,2.75,13047.0,France
";

    #[test]
    fn test_transactions_load_and_aggregate() {
        let path = write_temp("mka_tx_ok.csv", TX_CSV);
        let table = TransactionTable::read_csv(&path).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.distinct_customers(), 2);
        assert_eq!(table.distinct_invoices(), 3);
        assert_eq!(table.countries(), vec!["France", "United Kingdom"]);
        assert_eq!(table.rows[0].customer_id, 17850);
        assert_eq!(table.rows[0].quantity, 6);
    }

    #[test]
    fn test_header_aliases_accepted() {
        let aliased = TX_CSV
            .replace("Invoice,", "InvoiceNo,")
            .replace(",Price,", ",UnitPrice,")
            .replace("Customer ID", "CustomerID");
        let path = write_temp("mka_tx_alias.csv", &aliased);
        let table = TransactionTable::read_csv(&path).unwrap();
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_missing_column_is_reported_by_name() {
        let headerless = TX_CSV.replace(",Country", ",Region");
        let path = write_temp("mka_tx_nocountry.csv", &headerless);
        match TransactionTable::read_csv(&path) {
            Err(AnalyticsError::MissingColumn { table, column }) => {
                assert_eq!(table, "transactions");
                assert_eq!(column, "country");
            }
            other => panic!("expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file_is_data_missing() {
        let path = write_temp(
            "mka_tx_empty.csv",
            "Invoice,StockCode,Description,Quantity,InvoiceDate,Price,Customer ID,Country\n",
        );
        match TransactionTable::read_csv(&path) {
            Err(AnalyticsError::DataMissing { table, .. }) => assert_eq!(table, "transactions"),
            other => panic!("expected DataMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_file_is_data_missing() {
        let path = std::env::temp_dir().join("mka_does_not_exist.csv");
        assert!(matches!(
            TransactionTable::read_csv(&path),
            Err(AnalyticsError::DataMissing { .. })
        ));
    }

    #[test]
    fn test_malformed_quantity_carries_line_number() {
        let bad = TX_CSV.replace(
            "536366,71053,WHITE METAL LANTERN,6,",
            "536366,71053,WHITE METAL LANTERN,six,",
        );
        let path = write_temp("mka_tx_badqty.csv", &bad);
        match TransactionTable::read_csv(&path) {
            Err(AnalyticsError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected MalformedRecord, got {other:?}"),
        }
    }

    #[test]
    fn test_rfm_metrics_with_unnamed_index_column() {
        let csv = "\
,Recency,Frequency,Monetary
17850.0,2,34,5288.63
13047.0,31,10,3079.10
";
        let path = write_temp("mka_rfm.csv", csv);
        let table = RfmMetricsTable::read_csv(&path).unwrap();
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0].customer_id, 17850);
        assert_eq!(table.records[0].recency_days, 2);
    }

    #[test]
    fn test_cohort_assignments_parse_month_keys() {
        let csv = "\
Customer ID,CohortMonth
17850.0,2010-12-01
13047.0,2011-01-01
";
        let path = write_temp("mka_cohorts.csv", csv);
        let table = CohortAssignmentsTable::read_csv(&path).unwrap();
        assert_eq!(
            table.assignments.get(&17850),
            Some(&MonthKey::new(2010, 12))
        );
        assert_eq!(table.assignments.get(&13047), Some(&MonthKey::new(2011, 1)));
    }
}
