use std::fmt::Write;

use rust_decimal::Decimal;

use crate::kpi::KpiSummary;
use crate::rfm::SegmentSummary;

/// Assemble the narrative executive report from KPI values and segment
/// statistics, as Markdown. The caller decides where it goes.
pub fn executive_report(
    kpis: &KpiSummary,
    segments: &[SegmentSummary],
    generated_at: &str,
) -> String {
    let mut report = String::new();

    let _ = writeln!(report, "# Executive Report — Marketing Analytics");
    let _ = writeln!(report, "Generated: {generated_at}");
    let _ = writeln!(report);

    let _ = writeln!(report, "## Key Figures");
    let _ = writeln!(report);
    let _ = writeln!(report, "- Total revenue: {}", money(Some(kpis.total_revenue)));
    let _ = writeln!(report, "- Customers: {}", kpis.total_customers);
    let _ = writeln!(report, "- Invoices: {}", kpis.total_invoices);
    let _ = writeln!(report, "- Average order value: {}", money(kpis.avg_order_value));
    let _ = writeln!(report, "- Average CLV: {}", money(kpis.avg_clv));
    let _ = writeln!(report, "- Maximum CLV: {}", money(kpis.max_clv));
    let _ = writeln!(report);

    let _ = writeln!(report, "## Customer Segmentation");
    let _ = writeln!(report);
    if segments.is_empty() {
        let _ = writeln!(report, "No data for the selected filters.");
    } else {
        let _ = writeln!(report, "| Segment | Customers | Share | Avg CLV | Total revenue |");
        let _ = writeln!(report, "|---|---|---|---|---|");
        for segment in segments {
            let _ = writeln!(
                report,
                "| {} | {} | {}% | {} | {} |",
                segment.segment.label(),
                segment.customers,
                (segment.share * Decimal::from(100)).round_dp(1),
                money(Some(segment.avg_monetary)),
                money(Some(segment.total_monetary)),
            );
        }
    }
    let _ = writeln!(report);

    let _ = writeln!(report, "## Priority Actions");
    let _ = writeln!(report);
    if segments.is_empty() {
        let _ = writeln!(report, "No segments to act on.");
    } else {
        for (rank, segment) in segments.iter().take(4).enumerate() {
            let _ = writeln!(
                report,
                "{}. **{}**: {}",
                rank + 1,
                segment.segment.label(),
                segment.segment.recommended_action(),
            );
        }
    }
    let _ = writeln!(report);
    let _ = writeln!(report, "---");
    let _ = writeln!(report, "Produced by the retail analytics engine.");

    report
}

fn money(value: Option<Decimal>) -> String {
    match value {
        Some(v) => format!("£{}", v.round_dp(2)),
        None => "not applicable".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kpi::summarize;
    use crate::loader::TransactionTable;
    use crate::rfm::{score_customers, segment_summary};
    use crate::types::Transaction;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_report_covers_kpis_and_segments() {
        let table = TransactionTable::new(vec![Transaction {
            invoice_id: "A1".into(),
            stock_code: "22386".into(),
            description: "JUMBO BAG PINK POLKADOT".into(),
            quantity: 4,
            unit_price: dec!(2.08),
            invoice_date: NaiveDate::from_ymd_opt(2011, 7, 3)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            customer_id: 17850,
            country: "United Kingdom".into(),
        }]);
        let kpis = summarize(&table).result;
        let scores = score_customers(&table, None).result;
        let segments = segment_summary(&scores).result;

        let report = executive_report(&kpis, &segments, "2011-12-09 12:00");
        assert!(report.contains("# Executive Report"));
        assert!(report.contains("Total revenue: £8.32"));
        assert!(report.contains("| Segment |"));
        assert!(report.contains("Priority Actions"));
    }

    #[test]
    fn test_empty_population_reports_no_data() {
        let kpis = summarize(&TransactionTable::default()).result;
        let report = executive_report(&kpis, &[], "2011-12-09 12:00");
        assert!(report.contains("not applicable"));
        assert!(report.contains("No data for the selected filters."));
    }
}
