//! Quality test execution
//!
//! Each test moves pending -> running -> passed | failed | errored. The answer
//! call is raced against the test's timeout; a timed-out call is dropped, not
//! cancelled at the transport, so a provider that spawned its own work may
//! keep running in the background.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, info, warn};

use super::catalog::default_catalog;
use super::provider::AnswerProvider;
use super::scoring::evaluate;
use super::store::SuiteStore;
use crate::analytics::stats::mean;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::{
    QualityTest, QueryResponse, SuiteEvent, TestCategory, TestResult, TestStatus, TestSuiteResult,
};

/// Name of the suite covering the whole catalog
pub const ALL_TESTS_SUITE: &str = "All Tests";

/// Runs catalog tests against an answer provider
pub struct QualityRunner {
    provider: Arc<dyn AnswerProvider>,
    catalog: Vec<QualityTest>,
    store: SuiteStore,
    clock: Arc<dyn Clock>,
}

impl QualityRunner {
    /// Create a runner over the built-in catalog
    pub fn new(provider: Arc<dyn AnswerProvider>, store: SuiteStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            catalog: default_catalog(),
            store,
            clock,
        }
    }

    /// Replace the catalog
    pub fn with_catalog(mut self, catalog: Vec<QualityTest>) -> Self {
        self.catalog = catalog;
        self
    }

    /// The catalog, in execution order
    pub fn catalog(&self) -> &[QualityTest] {
        &self.catalog
    }

    /// Where suite results are persisted
    pub fn store(&self) -> &SuiteStore {
        &self.store
    }

    /// Run one test by id. Unknown ids are the only error surfaced.
    pub async fn run_test(&self, test_id: &str) -> Result<TestResult> {
        let test = self
            .catalog
            .iter()
            .find(|t| t.id == test_id)
            .ok_or_else(|| Error::not_found("QualityTest", test_id))?;

        Ok(self.execute(test).await)
    }

    /// Run the whole catalog sequentially and persist the suite
    pub async fn run_all_tests(
        &self,
        progress: Option<UnboundedSender<SuiteEvent>>,
    ) -> TestSuiteResult {
        let tests: Vec<&QualityTest> = self.catalog.iter().collect();
        self.run_suite(ALL_TESTS_SUITE, &tests, progress).await
    }

    /// Run one category. An unknown category yields an empty suite.
    pub async fn run_tests_by_category(
        &self,
        category: &str,
        progress: Option<UnboundedSender<SuiteEvent>>,
    ) -> TestSuiteResult {
        let tests: Vec<&QualityTest> = match category.parse::<TestCategory>() {
            Ok(category) => self.catalog.iter().filter(|t| t.category == category).collect(),
            Err(e) => {
                warn!(category, error = %e, "Running empty suite for unknown category");
                Vec::new()
            }
        };

        self.run_suite(&format!("Category: {category}"), &tests, progress)
            .await
    }

    async fn run_suite(
        &self,
        suite_name: &str,
        tests: &[&QualityTest],
        progress: Option<UnboundedSender<SuiteEvent>>,
    ) -> TestSuiteResult {
        let notify = |event: SuiteEvent| {
            if let Some(tx) = &progress {
                // A dropped receiver only means nobody is listening.
                let _ = tx.send(event);
            }
        };

        info!(suite = suite_name, tests = tests.len(), "Starting quality suite");
        notify(SuiteEvent::Started {
            suite_name: suite_name.to_string(),
            total_tests: tests.len(),
        });

        let mut results = Vec::with_capacity(tests.len());
        for (index, test) in tests.iter().enumerate() {
            notify(SuiteEvent::TestStarted {
                test_id: test.id.clone(),
                index,
            });

            let result = self.execute(test).await;

            notify(SuiteEvent::TestFinished {
                test_id: test.id.clone(),
                index,
                status: result.status,
                score: result.score,
            });
            results.push(result);
        }

        let suite = TestSuiteResult::from_results(suite_name, results, self.clock.now());

        if let Err(e) = self.store.save(&suite) {
            error!(suite = suite_name, error = %e, "Failed to persist suite result");
        }

        info!(
            suite = suite_name,
            passed = suite.passed_tests,
            total = suite.total_tests,
            average_score = suite.average_score,
            "Quality suite finished"
        );
        notify(SuiteEvent::Completed {
            suite_name: suite_name.to_string(),
            passed_tests: suite.passed_tests,
            total_tests: suite.total_tests,
        });

        suite
    }

    /// Execute one test. Never fails: timeouts and provider errors become
    /// errored results.
    pub async fn execute(&self, test: &QualityTest) -> TestResult {
        debug!(test_id = %test.id, timeout = ?test.timeout, "Running quality test");

        let started = Instant::now();
        let outcome = timeout(test.timeout, self.provider.answer(&test.query)).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(response)) => self.evaluated(test, response, elapsed_ms),
            Ok(Err(e)) => {
                warn!(test_id = %test.id, error = %e, "Answer provider failed");
                self.errored(test, Error::external(format!("{e:#}")), elapsed_ms)
            }
            Err(_) => {
                let timeout_ms = u64::try_from(test.timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(test_id = %test.id, timeout_ms, "Quality test timed out");
                self.errored(
                    test,
                    Error::Timeout {
                        test_id: test.id.clone(),
                        timeout_ms,
                    },
                    elapsed_ms,
                )
            }
        }
    }

    fn evaluated(&self, test: &QualityTest, response: QueryResponse, elapsed_ms: u64) -> TestResult {
        let details: Vec<_> = test
            .expectations
            .iter()
            .map(|e| evaluate(e, &response, elapsed_ms))
            .collect();

        let passed = details.iter().all(|d| d.passed);
        let score = if details.is_empty() {
            1.0
        } else {
            mean(details.iter().map(|d| d.score))
        };

        debug!(test_id = %test.id, passed, score, elapsed_ms, "Quality test evaluated");

        TestResult {
            test_id: test.id.clone(),
            test_name: test.name.clone(),
            category: test.category,
            status: if passed {
                TestStatus::Passed
            } else {
                TestStatus::Failed
            },
            passed,
            score,
            duration_ms: elapsed_ms,
            details,
            response: Some(response),
            error: None,
            timestamp: self.clock.now(),
        }
    }

    fn errored(&self, test: &QualityTest, error: Error, elapsed_ms: u64) -> TestResult {
        TestResult {
            test_id: test.id.clone(),
            test_name: test.name.clone(),
            category: test.category,
            status: TestStatus::Errored,
            passed: false,
            score: 0.0,
            duration_ms: elapsed_ms,
            details: Vec::new(),
            response: None,
            error: Some(error.to_string()),
            timestamp: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::MemoryStore;
    use crate::models::{Expectation, LegalArea, SourceRef, TestExpectation};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Clone)]
    enum Reply {
        Answer(QueryResponse, Duration),
        Fail(String),
    }

    // Unknown queries hang until the test times out.
    struct ScriptedProvider {
        replies: HashMap<String, Reply>,
    }

    #[async_trait::async_trait]
    impl AnswerProvider for ScriptedProvider {
        async fn answer(&self, query: &str) -> anyhow::Result<QueryResponse> {
            match self.replies.get(query) {
                Some(Reply::Answer(response, delay)) => {
                    tokio::time::sleep(*delay).await;
                    Ok(response.clone())
                }
                Some(Reply::Fail(message)) => Err(anyhow::anyhow!(message.clone())),
                None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    anyhow::bail!("no scripted reply")
                }
            }
        }
    }

    fn civil_response() -> QueryResponse {
        QueryResponse {
            answer_text: "§ 823 BGB obliges whoever unlawfully injures another to compensate the damage."
                .to_string(),
            sources: vec![SourceRef {
                title: "BGB § 823".to_string(),
                excerpt: "Schadensersatzpflicht".to_string(),
                relevance_score: 0.9,
            }],
            legal_area: Some(LegalArea::Civil),
            query_type: None,
            confidence: 0.9,
            from_cache: false,
        }
    }

    fn quality_test(id: &str, category: TestCategory, expectations: Vec<TestExpectation>) -> QualityTest {
        QualityTest {
            id: id.to_string(),
            name: id.to_string(),
            category,
            query: id.to_string(),
            expectations,
            timeout: Duration::from_millis(100),
        }
    }

    fn catalog() -> Vec<QualityTest> {
        vec![
            quality_test(
                "good",
                TestCategory::Citation,
                vec![
                    TestExpectation::new(
                        Expectation::CitationAccuracy { citation: "§ 823".to_string() },
                        "cites",
                    ),
                    TestExpectation::new(Expectation::MinRelevance { threshold: 0.8 }, "relevant"),
                ],
            ),
            quality_test(
                "misclassified",
                TestCategory::Semantic,
                vec![
                    TestExpectation::new(
                        Expectation::ContainsText { text: "damage".to_string() },
                        "mentions damage",
                    ),
                    TestExpectation::new(
                        Expectation::LegalArea { area: LegalArea::Criminal },
                        "criminal",
                    ),
                ],
            ),
            quality_test("broken", TestCategory::Semantic, vec![]),
            quality_test("slow", TestCategory::Performance, vec![]),
        ]
    }

    fn runner() -> QualityRunner {
        let mut replies = HashMap::new();
        replies.insert("good".to_string(), Reply::Answer(civil_response(), Duration::from_millis(10)));
        replies.insert(
            "misclassified".to_string(),
            Reply::Answer(civil_response(), Duration::ZERO),
        );
        replies.insert("broken".to_string(), Reply::Fail("upstream 503".to_string()));

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 10, 1, 9, 0, 0).unwrap(),
        ));
        let store = SuiteStore::new(Arc::new(MemoryStore::new()), "results", 10);
        QualityRunner::new(Arc::new(ScriptedProvider { replies }), store, clock)
            .with_catalog(catalog())
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_id_is_not_found() {
        let result = runner().run_test("missing").await;
        assert!(matches!(result, Err(Error::NotFound { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_passing_test() {
        let result = runner().run_test("good").await.unwrap();
        assert!(result.passed);
        assert_eq!(result.status, TestStatus::Passed);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.details.len(), 2);
        assert_eq!(result.duration_ms, 10);
        assert!(result.response.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_score_and_pass_can_disagree() {
        let result = runner().run_test("misclassified").await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.status, TestStatus::Failed);
        assert!((result.score - 0.75).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_yields_failed_result() {
        let started = Instant::now();
        let result = runner().run_test("slow").await.unwrap();

        assert!(!result.passed);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.status, TestStatus::Errored);
        assert!(result.error.as_deref().unwrap().contains("timed out after 100ms"));
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(result.duration_ms >= 100 && result.duration_ms < 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_failure_preserves_message() {
        let result = runner().run_test("broken").await.unwrap();
        assert!(!result.passed);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.status, TestStatus::Errored);
        assert!(result.error.as_deref().unwrap().contains("upstream 503"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_all_continues_past_failures() {
        let runner = runner();
        let suite = runner.run_all_tests(None).await;

        assert_eq!(suite.suite_name, ALL_TESTS_SUITE);
        assert_eq!(suite.total_tests, 4);
        assert_eq!(suite.passed_tests, 1);
        assert_eq!(suite.passed_tests + suite.failed_tests, suite.total_tests);
        let ids: Vec<&str> = suite.results.iter().map(|r| r.test_id.as_str()).collect();
        assert_eq!(ids, vec!["good", "misclassified", "broken", "slow"]);
        assert!((suite.average_score - 0.4375).abs() < 1e-9);

        let stored = runner.store().list();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].total_tests, suite.total_tests);
        assert_eq!(stored[0].passed_tests, suite.passed_tests);
        assert_eq!(stored[0].timestamp, suite.timestamp);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_by_category() {
        let runner = runner();
        let suite = runner.run_tests_by_category("semantic", None).await;
        assert_eq!(suite.total_tests, 2);
        assert_eq!(suite.suite_name, "Category: semantic");
        assert!(suite.results.iter().all(|r| r.category == TestCategory::Semantic));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_category_is_empty_suite() {
        let suite = runner().run_tests_by_category("astrology", None).await;
        assert_eq!(suite.total_tests, 0);
        assert!(suite.results.is_empty());
        assert_eq!(suite.average_score, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_events_are_ordered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let suite = runner().run_tests_by_category("semantic", Some(tx)).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 2 + 2 * suite.total_tests);
        assert!(matches!(events.first(), Some(SuiteEvent::Started { total_tests: 2, .. })));
        assert!(matches!(
            events.last(),
            Some(SuiteEvent::Completed { passed_tests: 0, total_tests: 2, .. })
        ));
        assert!(matches!(
            &events[1],
            SuiteEvent::TestStarted { test_id, index: 0 } if test_id == "misclassified"
        ));
        assert!(matches!(
            &events[4],
            SuiteEvent::TestFinished { status: TestStatus::Errored, index: 1, .. }
        ));
    }
}
