//! Data models for QueryLens

mod metric;
mod quality;
mod report;

pub use metric::*;
pub use quality::*;
pub use report::*;
