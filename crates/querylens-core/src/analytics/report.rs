//! Windowed performance report aggregation

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use super::stats::{mean, median, percentage, percentile, sorted};
use crate::models::{
    ComplexityDistribution, Feedback, FeedbackCounts, PerformanceReport, PopularQuery, QueryMetric,
};

/// Builds [`PerformanceReport`]s from a slice of metrics
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    popular_query_limit: usize,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new(10)
    }
}

impl ReportBuilder {
    /// Create a builder keeping at most `popular_query_limit` popular queries
    pub fn new(popular_query_limit: usize) -> Self {
        Self {
            popular_query_limit,
        }
    }

    /// Aggregate the metrics that fall in `[start, end]`
    pub fn build(
        &self,
        metrics: &[QueryMetric],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> PerformanceReport {
        let window: Vec<&QueryMetric> = metrics.iter().filter(|m| m.in_window(start, end)).collect();

        debug!(
            total = metrics.len(),
            in_window = window.len(),
            %start,
            %end,
            "Building performance report"
        );

        if window.is_empty() {
            return PerformanceReport::empty(start, end);
        }

        let total = window.len();
        let successful: Vec<&QueryMetric> = window.iter().copied().filter(|m| m.success).collect();
        let failed = total - successful.len();

        let latencies = sorted(successful.iter().map(|m| m.latency_ms as f64).collect());
        let cached = window.iter().filter(|m| m.cached).count();

        let feedback = count_feedback(&window);
        let satisfaction = percentage(feedback.positive, feedback.total());

        PerformanceReport {
            period_start: start,
            period_end: end,
            total_queries: total,
            successful_queries: successful.len(),
            failed_queries: failed,
            average_latency_ms: mean(latencies.iter().copied()),
            median_latency_ms: median(&latencies),
            p95_latency_ms: percentile(&latencies, 95.0),
            cache_hit_rate: percentage(cached, total),
            error_rate: percentage(failed, total),
            average_relevance: mean(successful.iter().map(|m| m.relevance_score)),
            average_confidence: mean(successful.iter().map(|m| m.confidence)),
            average_document_count: mean(successful.iter().map(|m| m.document_count as f64)),
            user_satisfaction_rate: satisfaction,
            feedback,
            legal_area_distribution: histogram(
                window.iter().filter_map(|m| m.legal_area.map(|a| a.as_str().to_string())),
            ),
            query_type_distribution: histogram(
                window.iter().filter_map(|m| m.query_type.map(|t| t.as_str().to_string())),
            ),
            complexity_distribution: complexity_buckets(&window),
            hourly_distribution: hourly(&window),
            daily_distribution: histogram(
                window.iter().map(|m| m.timestamp.format("%Y-%m-%d").to_string()),
            ),
            error_distribution: histogram(window.iter().filter_map(|m| m.error_kind.clone())),
            popular_queries: self.popular_queries(&window),
        }
    }

    /// Exact-text repeats: lowercased and trimmed, at least two occurrences
    fn popular_queries(&self, window: &[&QueryMetric]) -> Vec<PopularQuery> {
        let mut groups: HashMap<String, Vec<&QueryMetric>> = HashMap::new();
        for metric in window {
            let key = metric.query.trim().to_lowercase();
            if key.is_empty() {
                continue;
            }
            groups.entry(key).or_default().push(metric);
        }

        let mut popular: Vec<PopularQuery> = groups
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(query, members)| PopularQuery {
                count: members.len(),
                average_latency_ms: mean(members.iter().map(|m| m.latency_ms as f64)),
                success_rate: percentage(
                    members.iter().filter(|m| m.success).count(),
                    members.len(),
                ),
                query,
            })
            .collect();

        popular.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.query.cmp(&b.query)));
        popular.truncate(self.popular_query_limit);
        popular
    }
}

fn histogram<I>(keys: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = String>,
{
    let mut counts = BTreeMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    counts
}

fn count_feedback(window: &[&QueryMetric]) -> FeedbackCounts {
    let mut counts = FeedbackCounts::default();
    for feedback in window.iter().filter_map(|m| m.user_feedback) {
        match feedback {
            Feedback::Positive => counts.positive += 1,
            Feedback::Negative => counts.negative += 1,
            Feedback::Neutral => counts.neutral += 1,
        }
    }
    counts
}

fn complexity_buckets(window: &[&QueryMetric]) -> ComplexityDistribution {
    let mut buckets = ComplexityDistribution::default();
    for metric in window {
        if metric.complexity < 0.33 {
            buckets.low += 1;
        } else if metric.complexity < 0.66 {
            buckets.medium += 1;
        } else {
            buckets.high += 1;
        }
    }
    buckets
}

fn hourly(window: &[&QueryMetric]) -> Vec<usize> {
    let mut hours = vec![0; 24];
    for metric in window {
        hours[metric.timestamp.hour() as usize] += 1;
    }
    hours
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LegalArea, QueryType};
    use chrono::{Duration, TimeZone};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 8, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn metric(query: &str, latency_ms: u64, success: bool, hours: i64) -> QueryMetric {
        QueryMetric {
            id: format!("{query}-{hours}-{latency_ms}"),
            query: query.to_string(),
            timestamp: at(hours),
            latency_ms,
            success,
            cached: false,
            relevance_score: 0.8,
            document_count: 4,
            confidence: 0.7,
            legal_area: Some(LegalArea::Civil),
            query_type: Some(QueryType::Definition),
            complexity: 0.2,
            error: (!success).then(|| "boom".to_string()),
            error_kind: (!success).then(|| "unknown".to_string()),
            user_feedback: None,
            session_id: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_empty_window_is_all_zero() {
        let metrics = vec![metric("q", 100, true, 0)];
        let report = ReportBuilder::default().build(&metrics, at(5), at(6));

        assert!(report.is_empty());
        assert_eq!(report, PerformanceReport::empty(at(5), at(6)));
        assert_eq!(report.average_latency_ms, 0.0);
        assert_eq!(report.error_rate, 0.0);
        assert_eq!(report.hourly_distribution, vec![0; 24]);
    }

    #[test]
    fn test_latency_percentiles_over_successes() {
        let mut metrics: Vec<QueryMetric> =
            (0..100).map(|i| metric(&format!("q{i}"), i * 10, true, 0)).collect();
        metrics.push(metric("failed", 99_999, false, 0));

        let report = ReportBuilder::default().build(&metrics, at(0), at(1));
        assert_eq!(report.total_queries, 101);
        assert_eq!(report.successful_queries, 100);
        assert_eq!(report.median_latency_ms, 495.0);
        assert_eq!(report.p95_latency_ms, 950.0);
        assert_eq!(report.average_latency_ms, 495.0);
        assert!((report.error_rate - 100.0 / 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_rates_and_distributions() {
        let mut cached = metric("cached", 50, true, 1);
        cached.cached = true;
        cached.legal_area = Some(LegalArea::Labor);
        cached.complexity = 0.9;
        cached.user_feedback = Some(Feedback::Positive);

        let mut unhappy = metric("slow", 3000, true, 2);
        unhappy.user_feedback = Some(Feedback::Negative);
        unhappy.complexity = 0.5;

        let metrics = vec![
            metric("a", 100, true, 0),
            cached,
            unhappy,
            metric("b", 100, false, 2),
        ];
        let report = ReportBuilder::default().build(&metrics, at(0), at(2));

        assert_eq!(report.cache_hit_rate, 25.0);
        assert_eq!(report.error_rate, 25.0);
        assert_eq!(report.user_satisfaction_rate, 50.0);
        assert_eq!(report.feedback.total(), 2);
        assert_eq!(report.legal_area_distribution.get("civil"), Some(&3));
        assert_eq!(report.legal_area_distribution.get("labor"), Some(&1));
        assert_eq!(
            report.complexity_distribution,
            ComplexityDistribution { low: 2, medium: 1, high: 1 }
        );
        assert_eq!(report.hourly_distribution[8], 1);
        assert_eq!(report.hourly_distribution[10], 2);
        assert_eq!(report.daily_distribution.get("2026-10-01"), Some(&4));
        assert_eq!(report.error_distribution.get("unknown"), Some(&1));
    }

    #[test]
    fn test_popular_queries_exact_repeats_only() {
        let metrics = vec![
            metric("What is a lease?", 100, true, 0),
            metric("  what is a LEASE?  ", 300, true, 0),
            metric("what is a lease?", 200, false, 0),
            metric("notice period", 100, true, 0),
            metric("Notice period", 100, true, 0),
            metric("single", 100, true, 0),
            metric("What is a lease", 100, true, 0),
        ];
        let report = ReportBuilder::default().build(&metrics, at(0), at(1));

        assert_eq!(report.popular_queries.len(), 2);
        let top = &report.popular_queries[0];
        assert_eq!(top.query, "what is a lease?");
        assert_eq!(top.count, 3);
        assert_eq!(top.average_latency_ms, 200.0);
        assert!((top.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(report.popular_queries[1].query, "notice period");
    }

    #[test]
    fn test_popular_queries_capped() {
        let metrics: Vec<QueryMetric> = (0..15)
            .flat_map(|i| {
                let q = format!("query {i}");
                vec![metric(&q, 10, true, 0), metric(&q, 10, true, 0)]
            })
            .collect();
        let report = ReportBuilder::new(10).build(&metrics, at(0), at(1));
        assert_eq!(report.popular_queries.len(), 10);
    }
}
