//! Data models and structures for the edge address optimizer

pub mod config;
pub mod metrics;

// Re-export main model types
pub use config::{Config, RangeSource};
pub use metrics::{Candidate, ProbeResult, ResultRecord, SpeedResult};
