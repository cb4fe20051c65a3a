//! Bounded, newest-first log of query telemetry

use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{decode_list, KeyValueStore};
use crate::clock::Clock;
use crate::models::{Feedback, QueryMetric, QueryMetricInput};

static LEGAL_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(§+\s*\d+|\b(?:art(?:icle)?|sec(?:tion)?|para(?:graph)?)\.?\s*\d+|\b(?:bgb|stgb|hgb|zpo|stpo|gg|ao|estg)\b)")
        .expect("legal reference pattern is valid")
});

static CONNECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:and|or|versus|vs|compared|whereas|unless|if|although|except)\b")
        .expect("connective pattern is valid")
});

/// Estimate how complex a query is, in [0, 1].
///
/// Long queries, explicit legal references, and clauses chained with
/// connectives all push the estimate up.
pub fn estimate_complexity(query: &str) -> f64 {
    let words = query.split_whitespace().count() as f64;
    let length = (words / 40.0).min(1.0) * 0.4;
    let references = (LEGAL_REFERENCE.find_iter(query).count() as f64 * 0.15).min(0.3);
    let connectives = (CONNECTIVE.find_iter(query).count() as f64 * 0.05).min(0.2);
    let questions = if query.matches('?').count() > 1 { 0.1 } else { 0.0 };

    (length + references + connectives + questions).clamp(0.0, 1.0)
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn classify_error(message: &str) -> &'static str {
    let message = message.to_lowercase();
    if message.contains("timeout") || message.contains("timed out") {
        "timeout"
    } else if message.contains("rate limit") || message.contains("429") {
        "rate_limit"
    } else if message.contains("network") || message.contains("connection") {
        "network"
    } else {
        "unknown"
    }
}

/// Turn recorder input into a stored metric, enforcing the record invariants
fn enrich_metric(
    input: QueryMetricInput,
    now: DateTime<Utc>,
    newest: Option<DateTime<Utc>>,
) -> QueryMetric {
    let mut timestamp = input.timestamp.unwrap_or(now);
    if let Some(newest) = newest {
        if timestamp < newest {
            debug!(%timestamp, %newest, "Clamping out-of-order metric timestamp");
            timestamp = newest;
        }
    }

    let complexity = input
        .complexity
        .map_or_else(|| estimate_complexity(&input.query), unit);

    let (error, error_kind) = if input.success {
        (None, None)
    } else {
        let error = input.error.unwrap_or_else(|| "unknown error".to_string());
        let kind = input
            .error_kind
            .unwrap_or_else(|| classify_error(&error).to_string());
        (Some(error), Some(kind))
    };

    QueryMetric {
        id: input
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        query: input.query,
        timestamp,
        latency_ms: input.latency_ms,
        success: input.success,
        cached: input.cached,
        relevance_score: unit(input.relevance_score),
        document_count: input.document_count,
        confidence: unit(input.confidence),
        legal_area: input.legal_area,
        query_type: input.query_type,
        complexity,
        error,
        error_kind,
        user_feedback: input.user_feedback,
        session_id: input.session_id,
        user_agent: input.user_agent,
    }
}

/// Append-only, bounded store of query metrics.
///
/// The log lives in memory behind a lock and is written through to the
/// key-value store on every mutation. Append, truncate and persist happen
/// under one write lock, so concurrent recorders never lose entries within a
/// process. Two processes sharing one backend can still overwrite each
/// other's appends.
pub struct MetricStore {
    kv: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
    capacity: usize,
    entries: RwLock<Vec<QueryMetric>>,
}

impl MetricStore {
    /// Open the store, loading any persisted log
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        key: impl Into<String>,
        capacity: usize,
    ) -> Self {
        let key = key.into();
        let raw = match kv.get(&key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to load metrics, starting empty");
                None
            }
        };
        let mut entries: Vec<QueryMetric> = decode_list(&key, raw.as_deref());
        entries.truncate(capacity);

        debug!(key = %key, count = entries.len(), capacity, "Loaded metric store");

        Self {
            kv,
            clock,
            key,
            capacity,
            entries: RwLock::new(entries),
        }
    }

    /// Record a completed query and return the stored metric
    pub fn record(&self, input: QueryMetricInput) -> QueryMetric {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let metric = enrich_metric(input, now, entries.first().map(|m| m.timestamp));
        entries.insert(0, metric.clone());
        if entries.len() > self.capacity {
            let evicted = entries.len() - self.capacity;
            entries.truncate(self.capacity);
            debug!(evicted, "Evicted oldest metrics");
        }

        self.persist(&entries);
        metric
    }

    /// Look up a metric by id
    pub fn get_by_id(&self, id: &str) -> Option<QueryMetric> {
        self.entries.read().iter().find(|m| m.id == id).cloned()
    }

    /// The `n` most recent metrics, newest first
    pub fn get_recent(&self, n: usize) -> Vec<QueryMetric> {
        self.entries.read().iter().take(n).cloned().collect()
    }

    /// Metrics inside the inclusive window, newest first
    pub fn get_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<QueryMetric> {
        self.entries
            .read()
            .iter()
            .filter(|m| m.in_window(start, end))
            .cloned()
            .collect()
    }

    /// Metrics at or after `since`, newest first
    pub fn get_since(&self, since: DateTime<Utc>) -> Vec<QueryMetric> {
        self.entries
            .read()
            .iter()
            .take_while(|m| m.timestamp >= since)
            .cloned()
            .collect()
    }

    /// Copy of the whole log, newest first
    pub fn snapshot(&self) -> Vec<QueryMetric> {
        self.entries.read().clone()
    }

    /// Attach feedback to a metric. Returns false if the id is unknown.
    pub fn update_feedback(&self, id: &str, feedback: Feedback) -> bool {
        let mut entries = self.entries.write();
        let Some(metric) = entries.iter_mut().find(|m| m.id == id) else {
            debug!(id, "Feedback for unknown metric ignored");
            return false;
        };
        metric.user_feedback = Some(feedback);

        self.persist(&entries);
        true
    }

    /// Drop everything, or only entries older than `older_than`.
    /// Returns the number of removed entries.
    pub fn clear(&self, older_than: Option<DateTime<Utc>>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        match older_than {
            Some(cutoff) => entries.retain(|m| m.timestamp >= cutoff),
            None => entries.clear(),
        }
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries);
        }
        debug!(removed, "Cleared metrics");
        removed
    }

    /// Number of retained metrics
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the log is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Retention cap
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Write the log through. Failures are logged, never returned, so
    /// telemetry cannot break the caller's query flow.
    fn persist(&self, entries: &[QueryMetric]) {
        let result = serde_json::to_string(entries)
            .map_err(crate::error::Error::from)
            .and_then(|json| self.kv.set(&self.key, &json));

        if let Err(e) = result {
            warn!(key = %self.key, error = %e, "Failed to persist metrics");
        }
    }
}
