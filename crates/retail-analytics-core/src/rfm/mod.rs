//! RFM Segmenter: recency/frequency/monetary quintile scoring and the
//! priority-ordered segment rule table.

pub mod scoring;
pub mod segments;

pub use scoring::{score_customers, RfmScore};
pub use segments::{classify, segment_summary, Segment, SegmentSummary, DEFAULT_SEGMENT};
