//! Threshold filtering and final ranking

pub mod filter;
pub mod ranker;

pub use filter::FilterThresholds;
pub use ranker::Ranker;
