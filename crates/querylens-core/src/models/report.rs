//! Derived analytics models: reports, patterns and insights

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregated statistics for a time window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// Start of the window (inclusive)
    pub period_start: DateTime<Utc>,

    /// End of the window (inclusive)
    pub period_end: DateTime<Utc>,

    // Counters
    /// Queries in the window
    pub total_queries: usize,

    /// Successful queries
    pub successful_queries: usize,

    /// Failed queries
    pub failed_queries: usize,

    // Latency over successful queries
    /// Mean latency in milliseconds
    pub average_latency_ms: f64,

    /// Median latency in milliseconds
    pub median_latency_ms: f64,

    /// 95th percentile latency in milliseconds
    pub p95_latency_ms: f64,

    // Rates, as percentages of all queries
    /// Share of cached answers
    pub cache_hit_rate: f64,

    /// Share of failed queries
    pub error_rate: f64,

    // Quality over successful queries
    /// Mean relevance score
    pub average_relevance: f64,

    /// Mean confidence
    pub average_confidence: f64,

    /// Mean number of returned sources
    pub average_document_count: f64,

    // Feedback
    /// Positive feedback as a percentage of all feedback
    pub user_satisfaction_rate: f64,

    /// Feedback tallies
    pub feedback: FeedbackCounts,

    // Distributions
    /// Queries per legal area
    pub legal_area_distribution: BTreeMap<String, usize>,

    /// Queries per query type
    pub query_type_distribution: BTreeMap<String, usize>,

    /// Queries per complexity bucket
    pub complexity_distribution: ComplexityDistribution,

    /// Queries per UTC hour of day (24 slots)
    pub hourly_distribution: Vec<usize>,

    /// Queries per day (YYYY-MM-DD)
    pub daily_distribution: BTreeMap<String, usize>,

    /// Failures per error kind
    pub error_distribution: BTreeMap<String, usize>,

    /// Most repeated exact queries
    pub popular_queries: Vec<PopularQuery>,
}

impl PerformanceReport {
    /// All-zero report for a window with no data
    pub fn empty(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            period_start,
            period_end,
            total_queries: 0,
            successful_queries: 0,
            failed_queries: 0,
            average_latency_ms: 0.0,
            median_latency_ms: 0.0,
            p95_latency_ms: 0.0,
            cache_hit_rate: 0.0,
            error_rate: 0.0,
            average_relevance: 0.0,
            average_confidence: 0.0,
            average_document_count: 0.0,
            user_satisfaction_rate: 0.0,
            feedback: FeedbackCounts::default(),
            legal_area_distribution: BTreeMap::new(),
            query_type_distribution: BTreeMap::new(),
            complexity_distribution: ComplexityDistribution::default(),
            hourly_distribution: vec![0; 24],
            daily_distribution: BTreeMap::new(),
            error_distribution: BTreeMap::new(),
            popular_queries: Vec::new(),
        }
    }

    /// Whether the window held any queries
    pub fn is_empty(&self) -> bool {
        self.total_queries == 0
    }
}

/// Feedback tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackCounts {
    /// Thumbs up
    pub positive: usize,
    /// Thumbs down
    pub negative: usize,
    /// Neither
    pub neutral: usize,
}

impl FeedbackCounts {
    /// Number of queries with any feedback
    pub fn total(&self) -> usize {
        self.positive + self.negative + self.neutral
    }
}

/// Complexity histogram (low < 0.33 <= medium < 0.66 <= high)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityDistribution {
    /// Complexity below 0.33
    pub low: usize,
    /// Complexity in [0.33, 0.66)
    pub medium: usize,
    /// Complexity of 0.66 or more
    pub high: usize,
}

/// An exact query text repeated in the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularQuery {
    /// Lowercased, trimmed query text
    pub query: String,

    /// Occurrences
    pub count: usize,

    /// Mean latency of the occurrences
    pub average_latency_ms: f64,

    /// Successful occurrences as a percentage
    pub success_rate: f64,
}

/// A cluster of queries sharing a normalized template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    /// Normalized template
    pub template: String,

    /// Number of matching queries
    pub occurrences: usize,

    /// Mean relevance over successful matches
    pub average_relevance: f64,

    /// Mean latency over successful matches
    pub average_latency_ms: f64,

    /// Successful matches as a percentage
    pub success_rate: f64,

    /// Distinct raw queries, newest first
    pub examples: Vec<String>,
}

/// Severity of a generated insight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightKind {
    /// Something to look at
    Warning,
    /// Informational
    Info,
    /// Healthy signal
    Success,
    /// Something is broken
    Error,
}

/// A heuristic finding derived from a report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Severity
    pub kind: InsightKind,

    /// Short headline
    pub title: String,

    /// Human-readable explanation
    pub description: String,

    /// Report field that triggered the insight
    pub metric: String,

    /// Value of that field
    pub value: f64,

    /// Suggested action
    pub recommendation: Option<String>,
}
