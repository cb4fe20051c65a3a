//! # QueryLens
//!
//! Query performance analytics and answer-quality evaluation for legal RAG systems.
//!
//! QueryLens records telemetry for every answered query, aggregates it into
//! performance reports, mines recurring query templates, derives recommendations,
//! and runs an expectation-based quality suite against the answering pipeline.
//!
//! ## Architecture
//!
//! - **Storage**: Key-value persistence (memory or JSON files) behind a trait
//! - **Analytics**: Reports, query patterns and threshold-based insights
//! - **Quality**: Test catalog, scoring, runner and bounded result history
//! - **Service**: [`service::QueryAnalytics`] facade wiring it together
//!
//! ## Quick Start
//!
//! ```bash
//! # Record a query metric (JSON file or stdin) and inspect the last day
//! querylens record metric.json
//! echo '{"query": "What does § 823 BGB say?", "latency_ms": 850, "success": true}' | querylens record
//! querylens report --last 24h
//!
//! # Run the quality suite
//! querylens run --category citation
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_precision_loss)]

pub mod analytics;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod quality;
pub mod service;

pub use config::Config;
pub use error::{Error, Result};
pub use service::QueryAnalytics;

/// Re-exports for convenience
pub mod prelude {
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::Config;
    pub use crate::db::{FileStore, KeyValueStore, MemoryStore};
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::quality::{AnswerProvider, HttpAnswerProvider};
    pub use crate::service::QueryAnalytics;
}
