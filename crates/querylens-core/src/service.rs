//! Service facade exposing every QueryLens operation
//!
//! [`QueryAnalytics`] owns the metric store, the analytics components and the
//! quality runner. Storage and time are injected, so independent instances
//! can run side by side.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::analytics::{InsightEngine, PatternMiner, ReportBuilder};
use crate::clock::{window_start, Clock};
use crate::config::Config;
use crate::db::{KeyValueStore, MetricStore};
use crate::error::Result;
use crate::models::{
    Feedback, Insight, PerformanceReport, QualityTest, QueryMetric, QueryMetricInput,
    QueryPattern, SuiteEvent, TestResult, TestSuiteResult,
};
use crate::quality::{export, AnswerProvider, QualityRunner, SuiteStore};

/// Metric as it appears in exports, without client-identifying fields
#[derive(Debug, Clone, Serialize)]
pub struct ExportedMetric {
    /// Metric id
    pub id: String,
    /// Raw query text
    pub query: String,
    /// When the query completed
    pub timestamp: DateTime<Utc>,
    /// Latency in milliseconds
    pub latency_ms: u64,
    /// Whether an answer was produced
    pub success: bool,
    /// Whether the answer came from cache
    pub cached: bool,
    /// Relevance of the best source
    pub relevance_score: f64,
    /// Retrieved documents
    pub document_count: usize,
    /// Answer confidence
    pub confidence: f64,
    /// Legal area identifier
    pub legal_area: Option<String>,
    /// Query type identifier
    pub query_type: Option<String>,
    /// Estimated complexity
    pub complexity: f64,
    /// Error message for failed queries
    pub error: Option<String>,
    /// Error category for failed queries
    pub error_kind: Option<String>,
    /// Attached feedback
    pub user_feedback: Option<Feedback>,
}

impl From<&QueryMetric> for ExportedMetric {
    fn from(metric: &QueryMetric) -> Self {
        Self {
            id: metric.id.clone(),
            query: metric.query.clone(),
            timestamp: metric.timestamp,
            latency_ms: metric.latency_ms,
            success: metric.success,
            cached: metric.cached,
            relevance_score: metric.relevance_score,
            document_count: metric.document_count,
            confidence: metric.confidence,
            legal_area: metric.legal_area.map(|a| a.to_string()),
            query_type: metric.query_type.map(|t| t.to_string()),
            complexity: metric.complexity,
            error: metric.error.clone(),
            error_kind: metric.error_kind.clone(),
            user_feedback: metric.user_feedback,
        }
    }
}

/// JSON export of recorded metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsExport {
    /// When the export was produced
    pub exported_at: DateTime<Utc>,
    /// Requested window start
    pub period_start: Option<DateTime<Utc>>,
    /// Requested window end
    pub period_end: Option<DateTime<Utc>>,
    /// Number of exported metrics
    pub total: usize,
    /// Report over the exported metrics
    pub summary: PerformanceReport,
    /// Exported metrics, newest first
    pub metrics: Vec<ExportedMetric>,
}

/// Query analytics and quality evaluation service
pub struct QueryAnalytics {
    metrics: MetricStore,
    runner: QualityRunner,
    reports: ReportBuilder,
    patterns: PatternMiner,
    insights: InsightEngine,
    clock: Arc<dyn Clock>,
    insight_window: Duration,
}

impl QueryAnalytics {
    /// Build the service over a storage backend, clock and answer provider
    pub fn new(
        config: &Config,
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        provider: Arc<dyn AnswerProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let metrics = MetricStore::new(
            kv.clone(),
            clock.clone(),
            config.storage.metrics_key.clone(),
            config.storage.max_metrics,
        );
        let suites = SuiteStore::new(
            kv,
            config.storage.results_key.clone(),
            config.storage.max_suite_results,
        );
        let runner = QualityRunner::new(provider, suites, clock.clone());

        let insight_window = Duration::from_std(config.analytics.insight_window)
            .map_err(|e| crate::Error::config(format!("analytics.insight_window: {e}")))?;

        Ok(Self {
            metrics,
            runner,
            reports: ReportBuilder::new(config.analytics.popular_query_limit),
            patterns: PatternMiner::new(
                config.analytics.pattern_max_length,
                config.analytics.pattern_example_limit,
            ),
            insights: InsightEngine::default(),
            clock,
            insight_window,
        })
    }

    /// Replace the quality test catalog
    pub fn with_catalog(mut self, catalog: Vec<QualityTest>) -> Self {
        self.runner = self.runner.with_catalog(catalog);
        self
    }

    // --- Telemetry ---

    /// Record a completed live query
    pub fn record(&self, input: QueryMetricInput) -> QueryMetric {
        self.metrics.record(input)
    }

    /// Attach user feedback. Unknown ids are ignored.
    pub fn update_feedback(&self, id: &str, feedback: Feedback) -> bool {
        self.metrics.update_feedback(id, feedback)
    }

    /// Look up one metric
    pub fn get_metric(&self, id: &str) -> Option<QueryMetric> {
        self.metrics.get_by_id(id)
    }

    /// The `n` newest metrics
    pub fn get_recent(&self, n: usize) -> Vec<QueryMetric> {
        self.metrics.get_recent(n)
    }

    /// Drop metrics, all of them or those older than `older_than`
    pub fn clear_metrics(&self, older_than: Option<DateTime<Utc>>) -> usize {
        self.metrics.clear(older_than)
    }

    // --- Analytics ---

    /// Report over the inclusive window `[start, end]`
    pub fn build_report(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> PerformanceReport {
        self.reports.build(&self.metrics.snapshot(), start, end)
    }

    /// Report over the trailing `window` ending now
    pub fn build_recent_report(&self, window: Duration) -> PerformanceReport {
        let end = self.clock.now();
        self.build_report(window_start(end, window), end)
    }

    /// Repeated query templates since `since`
    pub fn analyze_patterns(&self, since: DateTime<Utc>) -> Vec<QueryPattern> {
        self.patterns.analyze(&self.metrics.get_since(since), since)
    }

    /// Insights over the configured trailing window
    pub fn generate_insights(&self) -> Vec<Insight> {
        let report = self.build_recent_report(self.insight_window);
        self.insights.generate(&report)
    }

    /// Export metrics in the optional window with a summary report.
    /// Session ids and user agents are left out.
    pub fn export_metrics(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<serde_json::Value> {
        let snapshot = self.metrics.snapshot();
        let selected: Vec<&QueryMetric> = snapshot
            .iter()
            .filter(|m| start.map_or(true, |s| m.timestamp >= s))
            .filter(|m| end.map_or(true, |e| m.timestamp <= e))
            .collect();

        let summary_start = start
            .or_else(|| selected.last().map(|m| m.timestamp))
            .unwrap_or_else(|| self.clock.now());
        let summary_end = end
            .or_else(|| selected.first().map(|m| m.timestamp))
            .unwrap_or_else(|| self.clock.now());

        let export = MetricsExport {
            exported_at: self.clock.now(),
            period_start: start,
            period_end: end,
            total: selected.len(),
            summary: self.reports.build(&snapshot, summary_start, summary_end),
            metrics: selected.into_iter().map(ExportedMetric::from).collect(),
        };

        debug!(total = export.total, "Exported metrics");
        Ok(serde_json::to_value(export)?)
    }

    // --- Quality ---

    /// The quality test catalog
    pub fn list_catalog(&self) -> &[QualityTest] {
        self.runner.catalog()
    }

    /// Run one test by id
    pub async fn run_test(&self, test_id: &str) -> Result<TestResult> {
        self.runner.run_test(test_id).await
    }

    /// Run the whole catalog
    pub async fn run_all_tests(&self) -> TestSuiteResult {
        self.runner.run_all_tests(None).await
    }

    /// Run the whole catalog, streaming progress events
    pub async fn run_all_tests_with_progress(
        &self,
        progress: UnboundedSender<SuiteEvent>,
    ) -> TestSuiteResult {
        self.runner.run_all_tests(Some(progress)).await
    }

    /// Run one category
    pub async fn run_tests_by_category(&self, category: &str) -> TestSuiteResult {
        self.runner.run_tests_by_category(category, None).await
    }

    /// Run one category, streaming progress events
    pub async fn run_tests_by_category_with_progress(
        &self,
        category: &str,
        progress: UnboundedSender<SuiteEvent>,
    ) -> TestSuiteResult {
        self.runner
            .run_tests_by_category(category, Some(progress))
            .await
    }

    /// Run several categories concurrently; tests inside a category stay sequential
    pub async fn run_categories(&self, categories: &[&str]) -> Vec<TestSuiteResult> {
        info!(categories = ?categories, "Running categories concurrently");
        join_all(
            categories
                .iter()
                .map(|category| self.runner.run_tests_by_category(category, None)),
        )
        .await
    }

    /// Retained suite results, newest first
    pub fn get_stored_suite_results(&self) -> Vec<TestSuiteResult> {
        self.runner.store().list()
    }

    /// Markdown report for a suite result
    pub fn export_suite(&self, suite: &TestSuiteResult) -> String {
        export::to_markdown(suite)
    }
}
