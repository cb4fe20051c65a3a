//! Per-expectation pass/fail and scoring rules
//!
//! | kind              | passed when                              | score                              |
//! |-------------------|------------------------------------------|------------------------------------|
//! | contains_text     | answer contains text (case-insensitive)  | 1 or 0                             |
//! | min_relevance     | top source relevance >= threshold        | min(actual / threshold, 1)         |
//! | max_latency       | elapsed <= threshold                     | 1, else max(0, 1 - over/threshold) |
//! | legal_area        | classified area matches                  | 1, else 0.5                        |
//! | query_type        | classified type matches                  | 1, else 0.7                        |
//! | document_count    | sources >= threshold (default 1)         | min(actual / threshold, 1)         |
//! | citation_accuracy | citation in answer or any source         | 1 or 0                             |

use crate::models::{
    Expectation, ExpectationDetail, ExpectationKind, QueryResponse, TestExpectation,
};

/// Score for a misclassified legal area on an otherwise successful response
pub const LEGAL_AREA_PARTIAL_CREDIT: f64 = 0.5;

/// Score for a misclassified query type on an otherwise successful response
pub const QUERY_TYPE_PARTIAL_CREDIT: f64 = 0.7;

/// Minimum source count when a document_count expectation sets none
pub const DEFAULT_MIN_DOCUMENTS: usize = 1;

/// Score a failed check of `kind` still earns, if any
pub fn partial_credit(kind: ExpectationKind) -> Option<f64> {
    match kind {
        ExpectationKind::LegalArea => Some(LEGAL_AREA_PARTIAL_CREDIT),
        ExpectationKind::QueryType => Some(QUERY_TYPE_PARTIAL_CREDIT),
        _ => None,
    }
}

/// `actual / threshold`, clamped to [0, 1]. A non-positive threshold is always met.
pub fn ratio_score(actual: f64, threshold: f64) -> f64 {
    if threshold <= 0.0 {
        return 1.0;
    }
    (actual / threshold).clamp(0.0, 1.0)
}

/// Linear decay once `actual` exceeds `threshold`, reaching 0 at twice the threshold
pub fn latency_score(actual_ms: u64, threshold_ms: u64) -> f64 {
    if actual_ms <= threshold_ms {
        return 1.0;
    }
    if threshold_ms == 0 {
        return 0.0;
    }
    let over = (actual_ms - threshold_ms) as f64;
    (1.0 - over / threshold_ms as f64).max(0.0)
}

fn binary(passed: bool) -> f64 {
    if passed {
        1.0
    } else {
        0.0
    }
}

fn classified(passed: bool, kind: ExpectationKind) -> f64 {
    if passed {
        1.0
    } else {
        partial_credit(kind).unwrap_or(0.0)
    }
}

/// Evaluate one expectation against a response that took `elapsed_ms`
pub fn evaluate(
    expectation: &TestExpectation,
    response: &QueryResponse,
    elapsed_ms: u64,
) -> ExpectationDetail {
    let kind = expectation.check.kind();

    let (passed, actual, score, message) = match &expectation.check {
        Expectation::ContainsText { text } => {
            let passed = response
                .answer_text
                .to_lowercase()
                .contains(&text.to_lowercase());
            let message = if passed {
                format!("Answer mentions \"{text}\"")
            } else {
                format!("Answer does not mention \"{text}\"")
            };
            (passed, passed.to_string(), binary(passed), message)
        }
        Expectation::MinRelevance { threshold } => {
            let actual = response.top_relevance();
            let passed = actual >= *threshold;
            (
                passed,
                format!("{actual:.2}"),
                ratio_score(actual, *threshold),
                format!("Top relevance {actual:.2} (required {threshold:.2})"),
            )
        }
        Expectation::MaxLatency { threshold_ms } => {
            let passed = elapsed_ms <= *threshold_ms;
            (
                passed,
                format!("{elapsed_ms}ms"),
                latency_score(elapsed_ms, *threshold_ms),
                format!("Answered in {elapsed_ms}ms (limit {threshold_ms}ms)"),
            )
        }
        Expectation::LegalArea { area } => {
            let passed = response.legal_area == Some(*area);
            let actual = response
                .legal_area
                .map_or_else(|| "none".to_string(), |a| a.to_string());
            (
                passed,
                actual.clone(),
                classified(passed, kind),
                format!("Classified as {actual} (expected {area})"),
            )
        }
        Expectation::QueryType { query_type } => {
            let passed = response.query_type == Some(*query_type);
            let actual = response
                .query_type
                .map_or_else(|| "none".to_string(), |t| t.to_string());
            (
                passed,
                actual.clone(),
                classified(passed, kind),
                format!("Query type {actual} (expected {query_type})"),
            )
        }
        Expectation::DocumentCount { min } => {
            let required = min.unwrap_or(DEFAULT_MIN_DOCUMENTS);
            let actual = response.sources.len();
            let passed = actual >= required;
            (
                passed,
                actual.to_string(),
                ratio_score(actual as f64, required as f64),
                format!("{actual} sources returned (required {required})"),
            )
        }
        Expectation::CitationAccuracy { citation } => {
            let needle = citation.to_lowercase();
            let in_answer = response.answer_text.to_lowercase().contains(&needle);
            let in_sources = response.sources.iter().any(|s| {
                s.title.to_lowercase().contains(&needle) || s.excerpt.to_lowercase().contains(&needle)
            });
            let passed = in_answer || in_sources;
            let message = match (in_answer, in_sources) {
                (true, _) => format!("Answer cites {citation}"),
                (false, true) => format!("Sources cite {citation}"),
                (false, false) => format!("{citation} not cited"),
            };
            (passed, passed.to_string(), binary(passed), message)
        }
    };

    ExpectationDetail {
        kind,
        description: expectation.description.clone(),
        passed,
        actual,
        score,
        message,
    }
}
