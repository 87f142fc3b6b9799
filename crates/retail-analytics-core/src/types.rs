use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AnalyticsError;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Customer identifiers as they appear in the Online Retail II extracts.
pub type CustomerId = u32;

/// A calendar month used as a cohort bucket.
///
/// Ordered chronologically; serialised as "YYYY-MM" so it can key JSON maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    /// 1-based month (1 = January)
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        MonthKey { year, month }
    }

    /// Floor a calendar date to its month bucket.
    pub fn from_date(date: NaiveDate) -> Self {
        MonthKey {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self::from_date(dt.date())
    }

    /// Whole months elapsed since `earlier`. Negative if `earlier` is later.
    pub fn months_since(&self, earlier: MonthKey) -> i64 {
        (self.year as i64 - earlier.year as i64) * 12 + (self.month as i64 - earlier.month as i64)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AnalyticsError::DateError(format!("Invalid month key '{s}'"));
        let (y, m) = s.split_once('-').ok_or_else(invalid)?;
        // Tolerate a trailing day component ("2010-12-01").
        let m = m.split('-').next().unwrap_or(m);
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(MonthKey { year, month })
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MonthKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// A single transaction line item. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub invoice_id: String,
    pub stock_code: String,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub invoice_date: NaiveDateTime,
    pub customer_id: CustomerId,
    pub country: String,
}

impl Transaction {
    /// Line revenue: quantity × unit price.
    pub fn revenue(&self) -> Money {
        Decimal::from(self.quantity) * self.unit_price
    }

    pub fn invoice_month(&self) -> MonthKey {
        MonthKey::from_datetime(self.invoice_date)
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_month_key_ordering_is_chronological() {
        let dec_2010 = MonthKey::new(2010, 12);
        let jan_2011 = MonthKey::new(2011, 1);
        assert!(dec_2010 < jan_2011);
    }

    #[test]
    fn test_months_since_crosses_year_boundary() {
        let cohort = MonthKey::new(2010, 12);
        let later = MonthKey::new(2011, 3);
        assert_eq!(later.months_since(cohort), 3);
        assert_eq!(cohort.months_since(later), -3);
        assert_eq!(cohort.months_since(cohort), 0);
    }

    #[test]
    fn test_month_key_parses_with_and_without_day() {
        let expected = MonthKey::new(2010, 12);
        assert_eq!("2010-12".parse::<MonthKey>().unwrap(), expected);
        assert_eq!("2010-12-01".parse::<MonthKey>().unwrap(), expected);
        assert!("2010-13".parse::<MonthKey>().is_err());
        assert!("december".parse::<MonthKey>().is_err());
    }

    #[test]
    fn test_month_key_display_round_trip() {
        let key = MonthKey::new(2011, 3);
        assert_eq!(key.to_string(), "2011-03");
        assert_eq!(key.to_string().parse::<MonthKey>().unwrap(), key);
    }

    #[test]
    fn test_transaction_revenue() {
        use rust_decimal_macros::dec;

        let tx = Transaction {
            invoice_id: "536365".into(),
            stock_code: "85123A".into(),
            description: "WHITE HANGING HEART T-LIGHT HOLDER".into(),
            quantity: 6,
            unit_price: dec!(2.55),
            invoice_date: NaiveDate::from_ymd_opt(2010, 12, 1)
                .unwrap()
                .and_hms_opt(8, 26, 0)
                .unwrap(),
            customer_id: 17850,
            country: "United Kingdom".into(),
        };
        assert_eq!(tx.revenue(), dec!(15.30));
        assert_eq!(tx.invoice_month(), MonthKey::new(2010, 12));
    }
}
