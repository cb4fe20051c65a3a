//! Query telemetry data model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Legal area a query was classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegalArea {
    /// Civil law (contracts, torts, property)
    Civil,
    /// Criminal law
    Criminal,
    /// Administrative law
    Administrative,
    /// Constitutional law
    Constitutional,
    /// Labor and employment law
    Labor,
    /// Commercial and corporate law
    Commercial,
    /// Tax law
    Tax,
    /// Family law
    Family,
    /// Anything else
    Other,
}

impl LegalArea {
    /// Stable identifier used in reports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Civil => "civil",
            Self::Criminal => "criminal",
            Self::Administrative => "administrative",
            Self::Constitutional => "constitutional",
            Self::Labor => "labor",
            Self::Commercial => "commercial",
            Self::Tax => "tax",
            Self::Family => "family",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for LegalArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intent a query was classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    /// "What is ..." style questions
    Definition,
    /// How a legal procedure works
    Procedure,
    /// Applying law to a set of facts
    CaseAnalysis,
    /// Comparing provisions or regimes
    Comparison,
    /// Looking up a specific provision
    CitationLookup,
    /// Unclassified
    General,
}

impl QueryType {
    /// Stable identifier used in reports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Definition => "definition",
            Self::Procedure => "procedure",
            Self::CaseAnalysis => "case_analysis",
            Self::Comparison => "comparison",
            Self::CitationLookup => "citation_lookup",
            Self::General => "general",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User feedback on an answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feedback {
    /// Thumbs up
    Positive,
    /// Thumbs down
    Negative,
    /// Explicitly neither
    Neutral,
}

/// One completed live query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMetric {
    /// Unique identifier
    pub id: String,

    /// Raw query text
    pub query: String,

    /// When the query completed
    pub timestamp: DateTime<Utc>,

    /// End-to-end latency in milliseconds
    pub latency_ms: u64,

    /// Whether the query produced an answer
    pub success: bool,

    /// Whether the answer came from cache
    pub cached: bool,

    /// Relevance of the best source, in [0, 1]
    pub relevance_score: f64,

    /// Number of sources returned
    pub document_count: usize,

    /// Answer confidence, in [0, 1]
    pub confidence: f64,

    /// Classified legal area
    pub legal_area: Option<LegalArea>,

    /// Classified query type
    pub query_type: Option<QueryType>,

    /// Estimated query complexity, in [0, 1]
    pub complexity: f64,

    /// Error message (only for failed queries)
    pub error: Option<String>,

    /// Error category (only for failed queries)
    pub error_kind: Option<String>,

    /// Feedback attached after the fact
    pub user_feedback: Option<Feedback>,

    /// Client session
    pub session_id: Option<String>,

    /// Client user agent
    pub user_agent: Option<String>,
}

impl QueryMetric {
    /// Whether the metric falls inside the inclusive window
    pub fn in_window(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.timestamp >= start && self.timestamp <= end
    }
}

/// Input for recording a query metric
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryMetricInput {
    /// Identifier (generated when absent)
    pub id: Option<String>,
    /// Raw query text
    pub query: String,
    /// When the query completed (now when absent)
    pub timestamp: Option<DateTime<Utc>>,
    /// End-to-end latency in milliseconds
    pub latency_ms: u64,
    /// Whether an answer was produced
    pub success: bool,
    /// Whether the answer came from cache
    pub cached: bool,
    /// Relevance of the best source, clamped to [0, 1]
    pub relevance_score: f64,
    /// Number of retrieved documents
    pub document_count: usize,
    /// Answer confidence, clamped to [0, 1]
    pub confidence: f64,
    /// Classified legal area
    pub legal_area: Option<LegalArea>,
    /// Classified query type
    pub query_type: Option<QueryType>,
    /// Complexity override (estimated when absent)
    pub complexity: Option<f64>,
    /// Error message, ignored for successful queries
    pub error: Option<String>,
    /// Error category (classified from the message when absent)
    pub error_kind: Option<String>,
    /// Feedback known at record time
    pub user_feedback: Option<Feedback>,
    /// Client session
    pub session_id: Option<String>,
    /// Client user agent
    pub user_agent: Option<String>,
}

impl QueryMetricInput {
    /// A successful query
    pub fn success(query: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            query: query.into(),
            latency_ms,
            success: true,
            ..Self::default()
        }
    }

    /// A failed query
    pub fn failure(query: impl Into<String>, latency_ms: u64, error: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            latency_ms,
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Set relevance and document count
    pub fn with_relevance(mut self, relevance_score: f64, document_count: usize) -> Self {
        self.relevance_score = relevance_score;
        self.document_count = document_count;
        self
    }

    /// Set confidence
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    /// Mark as cached
    pub fn with_cache(mut self, cached: bool) -> Self {
        self.cached = cached;
        self
    }

    /// Set classification
    pub fn with_classification(
        mut self,
        legal_area: Option<LegalArea>,
        query_type: Option<QueryType>,
    ) -> Self {
        self.legal_area = legal_area;
        self.query_type = query_type;
        self
    }

    /// Set an explicit timestamp
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attach feedback
    pub fn with_feedback(mut self, feedback: Feedback) -> Self {
        self.user_feedback = Some(feedback);
        self
    }

    /// Attach session context
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}
