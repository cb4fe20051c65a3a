//! Threshold rules turning a report into recommendations

use tracing::debug;

use crate::models::{Insight, InsightKind, PerformanceReport};

/// Thresholds for the insight rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsightThresholds {
    /// Average latency above this is a warning (ms)
    pub high_latency_ms: f64,
    /// Average latency below this is a success (ms)
    pub excellent_latency_ms: f64,
    /// Cache hit rate below this is informational (%)
    pub low_cache_hit_rate: f64,
    /// Cache hit rate above this is a success (%)
    pub good_cache_hit_rate: f64,
    /// Error rate above this is an error (%)
    pub high_error_rate: f64,
    /// Average relevance below this is a warning
    pub low_relevance: f64,
    /// Satisfaction below this is a warning (%)
    pub low_satisfaction: f64,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            high_latency_ms: 2000.0,
            excellent_latency_ms: 1000.0,
            low_cache_hit_rate: 20.0,
            good_cache_hit_rate: 60.0,
            high_error_rate: 10.0,
            low_relevance: 0.6,
            low_satisfaction: 70.0,
        }
    }
}

/// Evaluates the insight rules against a report
#[derive(Debug, Clone, Default)]
pub struct InsightEngine {
    thresholds: InsightThresholds,
}

impl InsightEngine {
    /// Create an engine with custom thresholds
    pub fn new(thresholds: InsightThresholds) -> Self {
        Self { thresholds }
    }

    /// Evaluate every rule in order. An empty report yields nothing.
    pub fn generate(&self, report: &PerformanceReport) -> Vec<Insight> {
        if report.is_empty() {
            return Vec::new();
        }

        let t = &self.thresholds;
        let mut insights = Vec::new();

        if report.successful_queries > 0 {
            let latency = report.average_latency_ms;
            if latency > t.high_latency_ms {
                insights.push(insight(
                    InsightKind::Warning,
                    "High Average Latency",
                    format!(
                        "Average response time is {latency:.0}ms, above the {:.0}ms target.",
                        t.high_latency_ms
                    ),
                    "average_latency_ms",
                    latency,
                    Some("Review retrieval depth and prompt size, and cache frequent queries."),
                ));
            } else if latency < t.excellent_latency_ms {
                insights.push(insight(
                    InsightKind::Success,
                    "Excellent Response Time",
                    format!("Average response time is {latency:.0}ms."),
                    "average_latency_ms",
                    latency,
                    Some("Keep monitoring latency as the document corpus grows."),
                ));
            }
        }

        let cache = report.cache_hit_rate;
        if cache < t.low_cache_hit_rate {
            insights.push(insight(
                InsightKind::Info,
                "Low Cache Hit Rate",
                format!("Only {cache:.1}% of queries were answered from cache."),
                "cache_hit_rate",
                cache,
                Some("Pre-warm the cache with popular queries or relax cache key normalization."),
            ));
        } else if cache > t.good_cache_hit_rate {
            insights.push(insight(
                InsightKind::Success,
                "Good Cache Performance",
                format!("{cache:.1}% of queries were answered from cache."),
                "cache_hit_rate",
                cache,
                Some("Check cache freshness so cached answers track legislative changes."),
            ));
        }

        let errors = report.error_rate;
        if errors > t.high_error_rate {
            insights.push(insight(
                InsightKind::Error,
                "High Error Rate",
                format!(
                    "{errors:.1}% of queries failed ({} of {}).",
                    report.failed_queries, report.total_queries
                ),
                "error_rate",
                errors,
                Some("Inspect the error distribution and the health of the answering backend."),
            ));
        }

        if report.successful_queries > 0 && report.average_relevance < t.low_relevance {
            let relevance = report.average_relevance;
            insights.push(insight(
                InsightKind::Warning,
                "Low Relevance Scores",
                format!("Average relevance of returned sources is {relevance:.2}."),
                "average_relevance",
                relevance,
                Some("Revisit chunking and embedding settings, or expand the indexed corpus."),
            ));
        }

        let satisfaction = report.user_satisfaction_rate;
        if satisfaction > 0.0 && satisfaction < t.low_satisfaction {
            insights.push(insight(
                InsightKind::Warning,
                "Low User Satisfaction",
                format!(
                    "{satisfaction:.1}% of rated answers were positive ({} ratings).",
                    report.feedback.total()
                ),
                "user_satisfaction_rate",
                satisfaction,
                Some("Read the negatively rated answers to find recurring gaps."),
            ));
        }

        debug!(count = insights.len(), "Generated insights");
        insights
    }
}

fn insight(
    kind: InsightKind,
    title: &str,
    description: String,
    metric: &str,
    value: f64,
    recommendation: Option<&str>,
) -> Insight {
    Insight {
        kind,
        title: title.to_string(),
        description,
        metric: metric.to_string(),
        value,
        recommendation: recommendation.map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn report() -> PerformanceReport {
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let mut report = PerformanceReport::empty(start, start);
        report.total_queries = 100;
        report.successful_queries = 100;
        report.average_latency_ms = 1500.0;
        report.cache_hit_rate = 40.0;
        report.average_relevance = 0.8;
        report
    }

    fn titles(insights: &[Insight]) -> Vec<&str> {
        insights.iter().map(|i| i.title.as_str()).collect()
    }

    #[test]
    fn test_empty_report_yields_nothing() {
        let start = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let insights = InsightEngine::default().generate(&PerformanceReport::empty(start, start));
        assert!(insights.is_empty());
    }

    #[test]
    fn test_neutral_report_yields_nothing() {
        assert!(InsightEngine::default().generate(&report()).is_empty());
    }

    #[test]
    fn test_all_warning_rules_fire_in_order() {
        let mut report = report();
        report.average_latency_ms = 2500.0;
        report.cache_hit_rate = 5.0;
        report.error_rate = 12.0;
        report.failed_queries = 12;
        report.average_relevance = 0.4;
        report.user_satisfaction_rate = 50.0;

        let insights = InsightEngine::default().generate(&report);
        assert_eq!(
            titles(&insights),
            vec![
                "High Average Latency",
                "Low Cache Hit Rate",
                "High Error Rate",
                "Low Relevance Scores",
                "Low User Satisfaction",
            ]
        );
        assert_eq!(insights[0].kind, InsightKind::Warning);
        assert_eq!(insights[0].value, 2500.0);
        assert_eq!(insights[2].kind, InsightKind::Error);
        assert!(insights.iter().all(|i| i.recommendation.is_some()));
    }

    #[test]
    fn test_success_rules() {
        let mut report = report();
        report.average_latency_ms = 400.0;
        report.cache_hit_rate = 75.0;

        let insights = InsightEngine::default().generate(&report);
        assert_eq!(
            titles(&insights),
            vec!["Excellent Response Time", "Good Cache Performance"]
        );
        assert!(insights.iter().all(|i| i.kind == InsightKind::Success));
    }

    #[test]
    fn test_satisfaction_requires_feedback() {
        let mut report = report();
        report.user_satisfaction_rate = 0.0;
        assert!(InsightEngine::default().generate(&report).is_empty());
    }

    #[test]
    fn test_all_failures_skip_latency_and_relevance() {
        let mut report = report();
        report.successful_queries = 0;
        report.failed_queries = 100;
        report.error_rate = 100.0;
        report.average_latency_ms = 0.0;
        report.average_relevance = 0.0;

        let insights = InsightEngine::default().generate(&report);
        assert_eq!(titles(&insights), vec!["High Error Rate"]);
    }
}
