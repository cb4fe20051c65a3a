//! Analytics over recorded query metrics
//!
//! Everything here is a pure function of a metric snapshot: reports,
//! template patterns, and threshold insights.

mod insights;
mod patterns;
mod report;
pub mod stats;

pub use insights::{InsightEngine, InsightThresholds};
pub use patterns::{PatternMiner, CITATION_PLACEHOLDER, LAW_PLACEHOLDER, NUMBER_PLACEHOLDER};
pub use report::ReportBuilder;
