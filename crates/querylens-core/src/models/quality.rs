//! Quality test data models

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::{LegalArea, QueryType};

/// Fixed set of quality test categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCategory {
    /// Correct citation of provisions
    Citation,
    /// Semantic understanding of the question
    Semantic,
    /// Linking related provisions
    CrossReference,
    /// Handling conflicting rules
    Contradiction,
    /// Latency budgets
    Performance,
}

impl TestCategory {
    /// All categories in catalog order
    pub const ALL: [TestCategory; 5] = [
        Self::Citation,
        Self::Semantic,
        Self::CrossReference,
        Self::Contradiction,
        Self::Performance,
    ];

    /// Stable identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Citation => "citation",
            Self::Semantic => "semantic",
            Self::CrossReference => "cross_reference",
            Self::Contradiction => "contradiction",
            Self::Performance => "performance",
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "citation" => Ok(Self::Citation),
            "semantic" => Ok(Self::Semantic),
            "cross_reference" => Ok(Self::CrossReference),
            "contradiction" => Ok(Self::Contradiction),
            "performance" => Ok(Self::Performance),
            other => Err(format!("unknown test category: {other}")),
        }
    }
}

/// Kind of expectation, used as the key of the scoring table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectationKind {
    /// [`Expectation::ContainsText`]
    ContainsText,
    /// [`Expectation::MinRelevance`]
    MinRelevance,
    /// [`Expectation::MaxLatency`]
    MaxLatency,
    /// [`Expectation::LegalArea`]
    LegalArea,
    /// [`Expectation::QueryType`]
    QueryType,
    /// [`Expectation::DocumentCount`]
    DocumentCount,
    /// [`Expectation::CitationAccuracy`]
    CitationAccuracy,
}

impl ExpectationKind {
    /// Stable identifier
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ContainsText => "contains_text",
            Self::MinRelevance => "min_relevance",
            Self::MaxLatency => "max_latency",
            Self::LegalArea => "legal_area",
            Self::QueryType => "query_type",
            Self::DocumentCount => "document_count",
            Self::CitationAccuracy => "citation_accuracy",
        }
    }
}

/// A typed assertion with its expected value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// Answer contains the text (case-insensitive)
    ContainsText {
        /// Text to look for
        text: String,
    },
    /// Best source relevance reaches the threshold
    MinRelevance {
        /// Minimum top-source relevance
        threshold: f64,
    },
    /// Answer arrives within the threshold
    MaxLatency {
        /// Latency budget in milliseconds
        threshold_ms: u64,
    },
    /// Query classified into the legal area
    LegalArea {
        /// Expected area
        area: LegalArea,
    },
    /// Query classified as the query type
    QueryType {
        /// Expected type
        query_type: QueryType,
    },
    /// At least this many sources (1 when unset)
    DocumentCount {
        /// Minimum number of sources
        min: Option<usize>,
    },
    /// Citation appears in the answer or a source
    CitationAccuracy {
        /// Citation such as "§ 823"
        citation: String,
    },
}

impl Expectation {
    /// Scoring-table key
    pub fn kind(&self) -> ExpectationKind {
        match self {
            Self::ContainsText { .. } => ExpectationKind::ContainsText,
            Self::MinRelevance { .. } => ExpectationKind::MinRelevance,
            Self::MaxLatency { .. } => ExpectationKind::MaxLatency,
            Self::LegalArea { .. } => ExpectationKind::LegalArea,
            Self::QueryType { .. } => ExpectationKind::QueryType,
            Self::DocumentCount { .. } => ExpectationKind::DocumentCount,
            Self::CitationAccuracy { .. } => ExpectationKind::CitationAccuracy,
        }
    }
}

/// An expectation with a human description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestExpectation {
    /// The check to perform
    #[serde(flatten)]
    pub check: Expectation,

    /// What the check is for
    pub description: String,
}

impl TestExpectation {
    /// Create an expectation
    pub fn new(check: Expectation, description: impl Into<String>) -> Self {
        Self {
            check,
            description: description.into(),
        }
    }
}

/// A static catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityTest {
    /// Unique identifier
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Category
    pub category: TestCategory,

    /// Query sent to the answering function
    pub query: String,

    /// Checks, evaluated in order
    pub expectations: Vec<TestExpectation>,

    /// Budget for the answer call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

/// A source returned by the answering function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Document title
    pub title: String,
    /// Retrieved passage
    pub excerpt: String,
    /// Retrieval relevance in [0, 1]
    pub relevance_score: f64,
}

/// Response of the external answering function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Generated answer
    pub answer_text: String,
    /// Retrieved sources, best first
    #[serde(default)]
    pub sources: Vec<SourceRef>,
    /// Legal area the pipeline classified the query into
    pub legal_area: Option<LegalArea>,
    /// Query type the pipeline classified the query as
    pub query_type: Option<QueryType>,
    /// Answer confidence
    #[serde(default)]
    pub confidence: f64,
    /// Whether the answer came from cache
    #[serde(default)]
    pub from_cache: bool,
}

impl QueryResponse {
    /// Relevance of the best source (0 without sources)
    pub fn top_relevance(&self) -> f64 {
        self.sources
            .iter()
            .map(|s| s.relevance_score)
            .fold(0.0, f64::max)
    }
}

/// Execution status of a quality test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Not started yet
    Pending,
    /// Waiting for the answer
    Running,
    /// Every expectation passed
    Passed,
    /// At least one expectation failed
    Failed,
    /// No response to evaluate (timeout or external failure)
    Errored,
}

impl TestStatus {
    /// Whether the test has reached a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Passed | Self::Failed | Self::Errored)
    }
}

/// Outcome of one expectation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectationDetail {
    /// Expectation kind
    pub kind: ExpectationKind,

    /// Expectation description
    pub description: String,

    /// Whether the check passed
    pub passed: bool,

    /// Observed value, rendered as text
    pub actual: String,

    /// Score in [0, 1]
    pub score: f64,

    /// Explanation
    pub message: String,
}

/// Outcome of one quality test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Catalog test id
    pub test_id: String,
    /// Human-readable name
    pub test_name: String,
    /// Test category
    pub category: TestCategory,
    /// Final status
    pub status: TestStatus,

    /// True iff every expectation passed
    pub passed: bool,

    /// Mean expectation score
    pub score: f64,

    /// Wall time spent waiting for the answer
    pub duration_ms: u64,
    /// Per-expectation outcomes (empty when errored)
    pub details: Vec<ExpectationDetail>,
    /// The evaluated response, if one arrived
    pub response: Option<QueryResponse>,
    /// Timeout or provider failure message
    pub error: Option<String>,
    /// When the test finished
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over one run of some or all tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuiteResult {
    /// "All Tests" or "Category: <name>"
    pub suite_name: String,
    /// Number of tests run
    pub total_tests: usize,
    /// Tests that passed
    pub passed_tests: usize,
    /// Tests that failed or errored
    pub failed_tests: usize,
    /// Mean test score (0 for an empty suite)
    pub average_score: f64,
    /// Sum of test durations
    pub total_duration_ms: u64,
    /// Per-test results in execution order
    pub results: Vec<TestResult>,
    /// When the suite finished
    pub timestamp: DateTime<Utc>,
}

impl TestSuiteResult {
    /// Aggregate a list of results
    pub fn from_results(
        suite_name: impl Into<String>,
        results: Vec<TestResult>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.passed).count();
        let average_score = if total_tests == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / total_tests as f64
        };
        let total_duration_ms = results.iter().map(|r| r.duration_ms).sum();

        Self {
            suite_name: suite_name.into(),
            total_tests,
            passed_tests,
            failed_tests: total_tests - passed_tests,
            average_score,
            total_duration_ms,
            results,
            timestamp,
        }
    }

    /// Passed tests as a percentage (0 for an empty suite)
    pub fn pass_rate(&self) -> f64 {
        if self.total_tests == 0 {
            0.0
        } else {
            self.passed_tests as f64 / self.total_tests as f64 * 100.0
        }
    }
}

/// Progress notification emitted during a suite run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SuiteEvent {
    /// Emitted before any test runs
    Started {
        /// Suite being run
        suite_name: String,
        /// Number of tests in the suite
        total_tests: usize,
    },
    /// A test moved to running
    TestStarted {
        /// Test id
        test_id: String,
        /// Position in the suite
        index: usize,
    },
    /// A test reached a terminal status
    TestFinished {
        /// Test id
        test_id: String,
        /// Position in the suite
        index: usize,
        /// Terminal status
        status: TestStatus,
        /// Test score
        score: f64,
    },
    /// Emitted last
    Completed {
        /// Suite that finished
        suite_name: String,
        /// Tests that passed
        passed_tests: usize,
        /// Tests that ran
        total_tests: usize,
    },
}
