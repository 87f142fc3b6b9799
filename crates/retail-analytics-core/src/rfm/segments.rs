use std::fmt;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::rfm::RfmScore;
use crate::types::{with_metadata, ComputationOutput, Money, Rate};

/// The eleven customer segments of the RFM model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Segment {
    Champions,
    #[serde(rename = "Loyal Customers")]
    LoyalCustomers,
    #[serde(rename = "Potential Loyalists")]
    PotentialLoyalists,
    #[serde(rename = "New Customers")]
    NewCustomers,
    Promising,
    #[serde(rename = "Need Attention")]
    NeedAttention,
    #[serde(rename = "About to Sleep")]
    AboutToSleep,
    #[serde(rename = "At Risk")]
    AtRisk,
    #[serde(rename = "Cannot Lose Them")]
    CannotLoseThem,
    Hibernating,
    Lost,
}

impl Segment {
    pub const ALL: [Segment; 11] = [
        Segment::Champions,
        Segment::LoyalCustomers,
        Segment::PotentialLoyalists,
        Segment::NewCustomers,
        Segment::Promising,
        Segment::NeedAttention,
        Segment::AboutToSleep,
        Segment::AtRisk,
        Segment::CannotLoseThem,
        Segment::Hibernating,
        Segment::Lost,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Segment::Champions => "Champions",
            Segment::LoyalCustomers => "Loyal Customers",
            Segment::PotentialLoyalists => "Potential Loyalists",
            Segment::NewCustomers => "New Customers",
            Segment::Promising => "Promising",
            Segment::NeedAttention => "Need Attention",
            Segment::AboutToSleep => "About to Sleep",
            Segment::AtRisk => "At Risk",
            Segment::CannotLoseThem => "Cannot Lose Them",
            Segment::Hibernating => "Hibernating",
            Segment::Lost => "Lost",
        }
    }

    /// Marketing activation priority, 1 = highest.
    pub fn priority(&self) -> u8 {
        match self {
            Segment::Champions => 1,
            Segment::LoyalCustomers => 2,
            Segment::PotentialLoyalists => 3,
            Segment::NewCustomers => 4,
            Segment::Promising => 5,
            Segment::NeedAttention => 6,
            Segment::AboutToSleep => 7,
            Segment::AtRisk => 8,
            Segment::CannotLoseThem => 9,
            Segment::Hibernating => 10,
            Segment::Lost => 11,
        }
    }

    /// Recommended activation play for the segment.
    pub fn recommended_action(&self) -> &'static str {
        match self {
            Segment::Champions => "Reward loyalty with VIP treatment",
            Segment::LoyalCustomers => "Upsell with personalised offers",
            Segment::PotentialLoyalists => "Promote membership programmes",
            Segment::NewCustomers => "Optimise onboarding",
            Segment::Promising => "Stimulate purchase frequency",
            Segment::NeedAttention => "Run limited-time offers",
            Segment::AboutToSleep => "Send personalised recommendations",
            Segment::AtRisk => "Launch reactivation campaign",
            Segment::CannotLoseThem => "Direct win-back outreach",
            Segment::Hibernating => "Cross-sell other product lines",
            Segment::Lost => "No active outreach",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One guarded rule: inclusive (R, F, M) score ranges mapping to a segment.
struct SegmentRule {
    r: (u8, u8),
    f: (u8, u8),
    m: (u8, u8),
    segment: Segment,
}

impl SegmentRule {
    const fn new(r: (u8, u8), f: (u8, u8), m: (u8, u8), segment: Segment) -> Self {
        SegmentRule { r, f, m, segment }
    }

    fn matches(&self, r: u8, f: u8, m: u8) -> bool {
        self.r.0 <= r && r <= self.r.1
            && self.f.0 <= f && f <= self.f.1
            && self.m.0 <= m && m <= self.m.1
    }
}

/// Classification table, evaluated top to bottom; the first match wins.
/// Ordered by activation priority so overlapping guards resolve to the more
/// valuable segment.
const RULES: [SegmentRule; 11] = [
    SegmentRule::new((4, 5), (4, 5), (4, 5), Segment::Champions),
    SegmentRule::new((3, 5), (2, 4), (3, 5), Segment::LoyalCustomers),
    SegmentRule::new((4, 5), (1, 2), (1, 3), Segment::PotentialLoyalists),
    SegmentRule::new((4, 5), (1, 2), (4, 5), Segment::NewCustomers),
    SegmentRule::new((3, 4), (3, 4), (3, 4), Segment::Promising),
    SegmentRule::new((2, 3), (2, 3), (2, 3), Segment::NeedAttention),
    SegmentRule::new((2, 3), (1, 2), (4, 5), Segment::AboutToSleep),
    SegmentRule::new((1, 2), (4, 5), (4, 5), Segment::AtRisk),
    SegmentRule::new((1, 2), (4, 5), (1, 3), Segment::CannotLoseThem),
    SegmentRule::new((1, 2), (1, 2), (4, 5), Segment::Hibernating),
    SegmentRule::new((1, 2), (1, 2), (1, 2), Segment::Lost),
];

/// Catch-all for score combinations no guarded rule covers, keeping the
/// table total over all 125 (R, F, M) tuples.
pub const DEFAULT_SEGMENT: Segment = Segment::NeedAttention;

/// Map an (R, F, M) score tuple to its segment. Total by construction.
pub fn classify(r: u8, f: u8, m: u8) -> Segment {
    debug_assert!((1..=5).contains(&r) && (1..=5).contains(&f) && (1..=5).contains(&m));
    RULES
        .iter()
        .find(|rule| rule.matches(r, f, m))
        .map(|rule| rule.segment)
        .unwrap_or(DEFAULT_SEGMENT)
}

/// Descriptive statistics for one segment of the scored population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSummary {
    pub segment: Segment,
    pub priority: u8,
    pub customers: u64,
    /// Share of the scored population, as a rate.
    pub share: Rate,
    pub avg_recency_days: Decimal,
    pub avg_frequency: Decimal,
    pub avg_monetary: Money,
    pub total_monetary: Money,
    /// Mean monetary value relative to the best segment, 0–100.
    pub value_score: Decimal,
    /// Customer count relative to the largest segment, 0–100.
    pub size_score: Decimal,
    /// Mean of value and size scores; drives the prioritisation matrix.
    pub priority_score: Decimal,
    pub recommended_action: String,
}

/// Summarise a scored population per segment, ordered by activation priority.
/// Only segments with at least one member appear.
pub fn segment_summary(scores: &[RfmScore]) -> ComputationOutput<Vec<SegmentSummary>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if scores.is_empty() {
        warnings.push("No scored customers; segment summary is empty".to_string());
    }

    let total = Decimal::from(scores.len() as u64);
    let mut summaries: Vec<SegmentSummary> = Vec::new();

    for segment in Segment::ALL {
        let members: Vec<&RfmScore> = scores.iter().filter(|s| s.segment == segment).collect();
        if members.is_empty() {
            continue;
        }
        let count = Decimal::from(members.len() as u64);
        let recency: Decimal = members
            .iter()
            .map(|s| Decimal::from(s.recency_days))
            .sum();
        let frequency: Decimal = members.iter().map(|s| Decimal::from(s.frequency)).sum();
        let monetary: Money = members.iter().map(|s| s.monetary).sum();

        summaries.push(SegmentSummary {
            segment,
            priority: segment.priority(),
            customers: members.len() as u64,
            share: count / total,
            avg_recency_days: recency / count,
            avg_frequency: frequency / count,
            avg_monetary: monetary / count,
            total_monetary: monetary,
            value_score: Decimal::ZERO,
            size_score: Decimal::ZERO,
            priority_score: Decimal::ZERO,
            recommended_action: segment.recommended_action().to_string(),
        });
    }

    // Prioritisation scores are relative to the strongest segment on each axis.
    let max_avg_monetary = summaries
        .iter()
        .map(|s| s.avg_monetary)
        .max()
        .unwrap_or(Decimal::ONE);
    let max_customers = summaries
        .iter()
        .map(|s| Decimal::from(s.customers))
        .max()
        .unwrap_or(Decimal::ONE);
    for summary in &mut summaries {
        if max_avg_monetary > Decimal::ZERO {
            summary.value_score = (summary.avg_monetary / max_avg_monetary * dec!(100)).round();
        }
        if max_customers > Decimal::ZERO {
            summary.size_score = (Decimal::from(summary.customers) / max_customers * dec!(100)).round();
        }
        summary.priority_score = (summary.value_score + summary.size_score) / dec!(2);
    }

    let elapsed = start.elapsed().as_micros() as u64;
    with_metadata(
        "Per-segment descriptive statistics with prioritisation scores",
        &serde_json::json!({ "scored_customers": scores.len() }),
        warnings,
        elapsed,
        summaries,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classification_table_is_total() {
        // Every (R, F, M) combination must resolve to one of the 11 labels.
        for r in 1..=5u8 {
            for f in 1..=5u8 {
                for m in 1..=5u8 {
                    let segment = classify(r, f, m);
                    assert!(
                        Segment::ALL.contains(&segment),
                        "({r},{f},{m}) resolved to unknown segment {segment:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_corner_scores() {
        assert_eq!(classify(5, 5, 5), Segment::Champions);
        assert_eq!(classify(1, 1, 1), Segment::Lost);
        assert_eq!(classify(1, 5, 5), Segment::AtRisk);
        assert_eq!(classify(5, 1, 5), Segment::NewCustomers);
        assert_eq!(classify(5, 1, 1), Segment::PotentialLoyalists);
        assert_eq!(classify(1, 1, 5), Segment::Hibernating);
    }

    #[test]
    fn test_first_match_wins_on_overlap() {
        // (4,4,4) satisfies both the Champions and Loyal Customers guards;
        // the higher-priority rule takes it.
        assert_eq!(classify(4, 4, 4), Segment::Champions);
        // (3,4,4) misses Champions (R too low) and lands on Loyal Customers.
        assert_eq!(classify(3, 4, 4), Segment::LoyalCustomers);
    }

    #[test]
    fn test_gap_combinations_fall_back_to_default() {
        // No guarded rule covers (1,3,1).
        assert_eq!(classify(1, 3, 1), DEFAULT_SEGMENT);
    }

    #[test]
    fn test_labels_round_trip_through_serde() {
        let json = serde_json::to_string(&Segment::LoyalCustomers).unwrap();
        assert_eq!(json, "\"Loyal Customers\"");
        let back: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Segment::LoyalCustomers);
    }
}
