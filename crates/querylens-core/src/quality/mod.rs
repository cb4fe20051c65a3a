//! Expectation-based quality testing of the answering pipeline
//!
//! A fixed catalog of tests is run against an [`AnswerProvider`]; each test's
//! expectations are scored, and suite results are kept in a bounded history.

mod catalog;
pub mod export;
mod provider;
mod runner;
pub mod scoring;
mod store;

pub use catalog::default_catalog;
pub use provider::{AnswerProvider, HttpAnswerProvider};
pub use runner::{QualityRunner, ALL_TESTS_SUITE};
pub use store::SuiteStore;
