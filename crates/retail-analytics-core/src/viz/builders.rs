use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::clv::ScenarioOutput;
use crate::cohort::CohortAnalysis;
use crate::loader::TransactionTable;
use crate::rfm::{RfmScore, SegmentSummary};
use crate::types::{Money, MonthKey};
use crate::viz::spec::*;

/// Cohort retention-rate heatmap: acquisition months down, `M+k` across.
pub fn cohort_retention_heatmap(analysis: &CohortAnalysis) -> ChartSpec {
    cohort_heatmap(
        analysis,
        "Cohort retention by month",
        ValueFormat::Percent,
        |analysis, cohort, offset| analysis.retention_rate(cohort, offset),
    )
}

/// Cohort active-customer-count heatmap.
pub fn cohort_count_heatmap(analysis: &CohortAnalysis) -> ChartSpec {
    cohort_heatmap(
        analysis,
        "Active customers by cohort and month",
        ValueFormat::Count,
        |analysis, cohort, offset| analysis.count(cohort, offset).map(Decimal::from),
    )
}

fn cohort_heatmap(
    analysis: &CohortAnalysis,
    title: &str,
    value_format: ValueFormat,
    cell: impl Fn(&CohortAnalysis, MonthKey, u32) -> Option<Decimal>,
) -> ChartSpec {
    let cohorts = analysis.cohorts();
    let max_offset = analysis.max_offset();

    let rows: Vec<Vec<Option<Decimal>>> = cohorts
        .iter()
        .map(|&cohort| {
            (0..=max_offset)
                .map(|offset| cell(analysis, cohort, offset))
                .collect()
        })
        .collect();

    ChartSpec::Heatmap(HeatmapSpec {
        title: title.to_string(),
        x_title: "Cohort age".to_string(),
        y_title: "Acquisition month".to_string(),
        x_labels: (0..=max_offset).map(|k| format!("M+{k}")).collect(),
        y_labels: cohorts.iter().map(|c| c.to_string()).collect(),
        rows,
        value_format,
    })
}

/// Retention curves for the selected cohorts, one series each.
pub fn retention_curves(analysis: &CohortAnalysis, selected: &[MonthKey]) -> ChartSpec {
    let series = selected
        .iter()
        .filter_map(|&cohort| {
            let offsets = analysis.counts.get(&cohort)?;
            let points = offsets
                .keys()
                .filter_map(|&k| {
                    analysis
                        .retention_rate(cohort, k)
                        .map(|rate| (format!("M+{k}"), rate))
                })
                .collect();
            Some(Series {
                name: format!("Cohort {cohort}"),
                points,
            })
        })
        .collect();

    ChartSpec::Line(LineChartSpec {
        title: "Retention curves by cohort".to_string(),
        x_title: "Months since acquisition".to_string(),
        y_title: "Retention rate".to_string(),
        series,
        value_format: ValueFormat::Percent,
    })
}

/// Monthly revenue trend over the (filtered) transaction table.
pub fn monthly_revenue_trend(table: &TransactionTable) -> ChartSpec {
    let mut by_month: BTreeMap<MonthKey, Money> = BTreeMap::new();
    for tx in &table.rows {
        *by_month.entry(tx.invoice_month()).or_default() += tx.revenue();
    }

    let points = by_month
        .into_iter()
        .map(|(month, revenue)| (month.to_string(), revenue))
        .collect();

    ChartSpec::Line(LineChartSpec {
        title: "Monthly revenue".to_string(),
        x_title: "Month".to_string(),
        y_title: "Revenue".to_string(),
        series: vec![Series {
            name: "Revenue".to_string(),
            points,
        }],
        value_format: ValueFormat::Currency,
    })
}

/// Top countries by revenue, largest first.
pub fn top_countries(table: &TransactionTable, limit: usize) -> ChartSpec {
    let mut by_country: BTreeMap<&str, Money> = BTreeMap::new();
    for tx in &table.rows {
        *by_country.entry(tx.country.as_str()).or_default() += tx.revenue();
    }

    let mut entries: Vec<(&str, Money)> = by_country.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    entries.truncate(limit);

    ChartSpec::Bar(BarChartSpec {
        title: format!("Top {limit} countries by revenue"),
        x_title: "Country".to_string(),
        y_title: "Revenue".to_string(),
        bars: entries
            .into_iter()
            .map(|(country, revenue)| BarDatum {
                label: country.to_string(),
                value: revenue,
            })
            .collect(),
        value_format: ValueFormat::Currency,
    })
}

/// Customer count per segment, ordered by activation priority.
pub fn segment_distribution(summaries: &[SegmentSummary]) -> ChartSpec {
    ChartSpec::Bar(BarChartSpec {
        title: "RFM segment distribution".to_string(),
        x_title: "Segment".to_string(),
        y_title: "Customers".to_string(),
        bars: summaries
            .iter()
            .map(|s| BarDatum {
                label: s.segment.label().to_string(),
                value: Decimal::from(s.customers),
            })
            .collect(),
        value_format: ValueFormat::Count,
    })
}

/// Segment treemap: tile size by customer count, colour by total revenue.
pub fn segment_treemap(summaries: &[SegmentSummary]) -> ChartSpec {
    ChartSpec::Treemap(TreemapSpec {
        title: "Segment share of customer base".to_string(),
        tiles: summaries
            .iter()
            .map(|s| TreemapTile {
                label: s.segment.label().to_string(),
                size: Decimal::from(s.customers),
                color_value: s.total_monetary,
            })
            .collect(),
    })
}

/// Three-dimensional RFM scatter, grouped by segment.
pub fn rfm_scatter(scores: &[RfmScore]) -> ChartSpec {
    ChartSpec::Scatter3d(ScatterSpec {
        title: "RFM segments".to_string(),
        x_title: "Recency (days)".to_string(),
        y_title: "Frequency".to_string(),
        z_title: "Monetary".to_string(),
        points: scores
            .iter()
            .map(|s| ScatterPoint {
                x: Decimal::from(s.recency_days),
                y: Decimal::from(s.frequency),
                z: s.monetary,
                group: s.segment.label().to_string(),
            })
            .collect(),
    })
}

/// Baseline and scenario CLV distributions as overlaid histograms.
pub fn clv_comparison(output: &ScenarioOutput) -> ChartSpec {
    ChartSpec::Histogram(HistogramSpec {
        title: "CLV distribution: baseline vs scenario".to_string(),
        x_title: "CLV".to_string(),
        series: vec![
            HistogramSeries {
                name: "Baseline".to_string(),
                values: output.customers.iter().map(|c| c.baseline_clv).collect(),
            },
            HistogramSeries {
                name: "Scenario".to_string(),
                values: output.customers.iter().map(|c| c.scenario_clv).collect(),
            },
        ],
        suggested_bins: 50,
    })
}

/// Order-value histogram over the (filtered) table.
pub fn order_value_histogram(table: &TransactionTable) -> ChartSpec {
    let mut by_invoice: BTreeMap<&str, Money> = BTreeMap::new();
    for tx in &table.rows {
        *by_invoice.entry(tx.invoice_id.as_str()).or_default() += tx.revenue();
    }

    ChartSpec::Histogram(HistogramSpec {
        title: "Order value distribution".to_string(),
        x_title: "Order value".to_string(),
        series: vec![HistogramSeries {
            name: "Orders".to_string(),
            values: by_invoice.into_values().collect(),
        }],
        suggested_bins: 50,
    })
}

/// Cohort sizes, largest first.
pub fn cohort_sizes(analysis: &CohortAnalysis) -> ChartSpec {
    let mut entries: Vec<(MonthKey, u64)> = analysis
        .sizes
        .iter()
        .map(|(cohort, size)| (*cohort, *size))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ChartSpec::Bar(BarChartSpec {
        title: "Customers per acquisition cohort".to_string(),
        x_title: "Acquisition month".to_string(),
        y_title: "Customers".to_string(),
        bars: entries
            .into_iter()
            .map(|(cohort, size)| BarDatum {
                label: cohort.to_string(),
                value: Decimal::from(size),
            })
            .collect(),
        value_format: ValueFormat::Count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cohort::analyze_cohorts;
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn tx(invoice: &str, customer: u32, month: u32, amount: Money) -> Transaction {
        Transaction {
            invoice_id: invoice.to_string(),
            stock_code: "22086".into(),
            description: "PAPER CHAIN KIT 50'S CHRISTMAS".into(),
            quantity: 1,
            unit_price: amount,
            invoice_date: NaiveDate::from_ymd_opt(2011, month, 5)
                .unwrap()
                .and_hms_opt(16, 0, 0)
                .unwrap(),
            customer_id: customer,
            country: "United Kingdom".into(),
        }
    }

    #[test]
    fn test_heatmap_keeps_horizon_cells_blank() {
        // Activity at offsets 0 and 2 only.
        let table = TransactionTable::new(vec![
            tx("A1", 17850, 1, dec!(10.00)),
            tx("A2", 17850, 3, dec!(10.00)),
        ]);
        let analysis = analyze_cohorts(&table).result;

        let ChartSpec::Heatmap(spec) = cohort_retention_heatmap(&analysis) else {
            panic!("expected a heatmap");
        };
        assert_eq!(spec.x_labels, vec!["M+0", "M+1", "M+2"]);
        assert_eq!(spec.y_labels, vec!["2011-01"]);
        assert_eq!(spec.rows[0][0], Some(Decimal::ONE));
        assert_eq!(spec.rows[0][1], None);
        assert_eq!(spec.rows[0][2], Some(Decimal::ONE));
    }

    #[test]
    fn test_empty_analysis_builds_empty_specs() {
        let table = TransactionTable::default();
        let analysis = analyze_cohorts(&table).result;

        assert!(cohort_retention_heatmap(&analysis).is_empty());
        assert!(retention_curves(&analysis, &[]).is_empty());
        assert!(monthly_revenue_trend(&table).is_empty());
        assert!(top_countries(&table, 10).is_empty());
    }

    #[test]
    fn test_top_countries_sorts_by_revenue() {
        let mut rows = vec![tx("A1", 17850, 1, dec!(10.00))];
        let mut fr = tx("B1", 13047, 1, dec!(99.00));
        fr.country = "France".into();
        rows.push(fr);

        let ChartSpec::Bar(spec) = top_countries(&TransactionTable::new(rows), 10) else {
            panic!("expected a bar chart");
        };
        assert_eq!(spec.bars[0].label, "France");
        assert_eq!(spec.bars[1].label, "United Kingdom");
    }

    #[test]
    fn test_retention_curves_skip_unknown_cohorts() {
        let table = TransactionTable::new(vec![tx("A1", 17850, 1, dec!(10.00))]);
        let analysis = analyze_cohorts(&table).result;

        let ChartSpec::Line(spec) = retention_curves(
            &analysis,
            &[MonthKey::new(2011, 1), MonthKey::new(2019, 1)],
        ) else {
            panic!("expected a line chart");
        };
        assert_eq!(spec.series.len(), 1);
        assert_eq!(spec.series[0].name, "Cohort 2011-01");
    }
}
