//! Query template normalization and clustering

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::stats::{mean, percentage};
use crate::models::{QueryMetric, QueryPattern};

/// Placeholder for a run of digits
pub const NUMBER_PLACEHOLDER: &str = "{num}";
/// Placeholder for an article/section reference
pub const CITATION_PLACEHOLDER: &str = "{citation}";
/// Placeholder for a statute reference
pub const LAW_PLACEHOLDER: &str = "{law}";

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

static CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:§+\s*|\b(?:article|art\.|section|sec\.|paragraph|para\.)\s*)\{num\}(?:\s*(?:para\.?|abs\.?|sentence|s\.)\s*\{num\})*",
    )
    .expect("valid regex")
});

static LAW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:law|code|act|statute)\s+(?:no\.?\s*)?\{num\}(?:/\{num\})*|\b(?:bgb|stgb|hgb|zpo|stpo|gg|ao|estg|vwvfg|betrvg|kschg)\b",
    )
    .expect("valid regex")
});

/// Clusters queries by normalized template
#[derive(Debug, Clone)]
pub struct PatternMiner {
    max_length: usize,
    example_limit: usize,
}

impl Default for PatternMiner {
    fn default() -> Self {
        Self::new(100, 3)
    }
}

impl PatternMiner {
    /// Create a miner with a template length cap and an example cap
    pub fn new(max_length: usize, example_limit: usize) -> Self {
        Self {
            max_length,
            example_limit,
        }
    }

    /// Reduce a raw query to its template
    pub fn normalize(&self, query: &str) -> String {
        let lowered = query.trim().to_lowercase();
        let collapsed = WHITESPACE.replace_all(&lowered, " ");
        let numbered = DIGITS.replace_all(&collapsed, NUMBER_PLACEHOLDER);
        let cited = CITATION.replace_all(&numbered, CITATION_PLACEHOLDER);
        let template = LAW.replace_all(&cited, LAW_PLACEHOLDER);

        if template.chars().count() > self.max_length {
            let mut truncated: String = template.chars().take(self.max_length).collect();
            truncated.push_str("...");
            truncated
        } else {
            template.into_owned()
        }
    }

    /// Patterns among metrics recorded at or after `since`, most frequent first
    pub fn analyze(&self, metrics: &[QueryMetric], since: DateTime<Utc>) -> Vec<QueryPattern> {
        let mut groups: HashMap<String, Vec<&QueryMetric>> = HashMap::new();
        for metric in metrics.iter().filter(|m| m.timestamp >= since) {
            groups
                .entry(self.normalize(&metric.query))
                .or_default()
                .push(metric);
        }

        let mut patterns: Vec<QueryPattern> = groups
            .into_iter()
            .filter(|(_, members)| members.len() >= 2)
            .map(|(template, members)| self.summarize(template, &members))
            .collect();

        patterns.sort_by(|a, b| {
            b.occurrences
                .cmp(&a.occurrences)
                .then_with(|| a.template.cmp(&b.template))
        });

        debug!(patterns = patterns.len(), %since, "Analyzed query patterns");
        patterns
    }

    fn summarize(&self, template: String, members: &[&QueryMetric]) -> QueryPattern {
        let successful: Vec<&&QueryMetric> = members.iter().filter(|m| m.success).collect();

        let mut examples: Vec<String> = Vec::with_capacity(self.example_limit);
        for metric in members {
            if examples.len() >= self.example_limit {
                break;
            }
            if !examples.contains(&metric.query) {
                examples.push(metric.query.clone());
            }
        }

        QueryPattern {
            template,
            occurrences: members.len(),
            average_relevance: mean(successful.iter().map(|m| m.relevance_score)),
            average_latency_ms: mean(successful.iter().map(|m| m.latency_ms as f64)),
            success_rate: percentage(successful.len(), members.len()),
            examples,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
    }

    fn metric(query: &str, success: bool, latency_ms: u64, relevance: f64) -> QueryMetric {
        QueryMetric {
            id: query.to_string(),
            query: query.to_string(),
            timestamp: base(),
            latency_ms,
            success,
            cached: false,
            relevance_score: relevance,
            document_count: 3,
            confidence: 0.5,
            legal_area: None,
            query_type: None,
            complexity: 0.1,
            error: None,
            error_kind: None,
            user_feedback: None,
            session_id: None,
            user_agent: None,
        }
    }

    #[test]
    fn test_normalize_numbers() {
        let miner = PatternMiner::default();
        assert_eq!(
            miner.normalize("  Notice period of 30 days   for 2 years "),
            "notice period of {num} days for {num} years"
        );
    }

    #[test]
    fn test_normalize_citations_and_laws() {
        let miner = PatternMiner::default();
        assert_eq!(
            miner.normalize("What does § 823 BGB say?"),
            "what does {citation} {law} say?"
        );
        assert_eq!(
            miner.normalize("Explain Article 12 para 1 GG"),
            "explain {citation} {law}"
        );
        assert_eq!(
            miner.normalize("Is Section 5 of Law 2019/42 still valid?"),
            "is {citation} of {law} still valid?"
        );
    }

    #[test]
    fn test_normalize_truncates() {
        let miner = PatternMiner::new(10, 3);
        assert_eq!(miner.normalize("abcdefghijklmnop"), "abcdefghij...");
        assert_eq!(miner.normalize("short"), "short");
    }

    #[test]
    fn test_single_occurrence_excluded() {
        let miner = PatternMiner::default();
        let metrics = vec![
            metric("What does § 823 BGB say?", true, 100, 0.9),
            metric("what does § 626 BGB say?", true, 300, 0.7),
            metric("What does § 1 BGB say?", false, 5000, 0.0),
            metric("how do I appeal a fine", true, 100, 0.5),
        ];

        let patterns = miner.analyze(&metrics, base());
        assert_eq!(patterns.len(), 1);

        let pattern = &patterns[0];
        assert_eq!(pattern.template, "what does {citation} {law} say?");
        assert_eq!(pattern.occurrences, 3);
        assert_eq!(pattern.average_latency_ms, 200.0);
        assert!((pattern.average_relevance - 0.8).abs() < 1e-9);
        assert!((pattern.success_rate - 200.0 / 3.0).abs() < 1e-9);
        assert_eq!(pattern.examples.len(), 3);
    }

    #[test]
    fn test_examples_are_distinct_and_capped() {
        let miner = PatternMiner::default();
        let metrics: Vec<QueryMetric> = ["lease 1", "lease 1", "lease 2", "lease 3", "lease 4"]
            .iter()
            .map(|q| metric(q, true, 10, 0.5))
            .collect();

        let patterns = miner.analyze(&metrics, base());
        assert_eq!(patterns[0].occurrences, 5);
        assert_eq!(patterns[0].examples, vec!["lease 1", "lease 2", "lease 3"]);
    }

    #[test]
    fn test_since_filters_old_metrics() {
        let miner = PatternMiner::default();
        let metrics = vec![metric("q 1", true, 10, 0.5), metric("q 2", true, 10, 0.5)];
        assert!(miner.analyze(&metrics, base() + Duration::seconds(1)).is_empty());
        assert_eq!(miner.analyze(&metrics, base()).len(), 1);
    }

    #[test]
    fn test_sorted_by_occurrences() {
        let miner = PatternMiner::default();
        let metrics = vec![
            metric("a 1", true, 10, 0.5),
            metric("a 2", true, 10, 0.5),
            metric("b 1", true, 10, 0.5),
            metric("b 2", true, 10, 0.5),
            metric("b 3", true, 10, 0.5),
        ];
        let patterns = miner.analyze(&metrics, base());
        assert_eq!(patterns[0].template, "b {num}");
        assert_eq!(patterns[1].template, "a {num}");
    }

    proptest! {
        #[test]
        fn prop_normalize_has_no_digits(query in "[a-zA-Z0-9 §.]{0,80}") {
            let template = PatternMiner::default().normalize(&query);
            prop_assert!(!template.chars().any(|c| c.is_ascii_digit()));
        }

        #[test]
        fn prop_normalize_is_idempotent(query in "[a-z ]{0,60}") {
            let miner = PatternMiner::default();
            let once = miner.normalize(&query);
            prop_assert_eq!(miner.normalize(&once), once);
        }
    }
}
