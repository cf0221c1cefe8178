//! Measurement execution engine
//!
//! This module contains the two worker pools of the pipeline:
//! - `ProbePool` runs a prober over every candidate under a bounded worker budget
//! - `DownloadPool` measures throughput in delay order and stops early once
//!   enough candidates qualify

pub mod download_pool;
pub mod probe_pool;

pub use download_pool::{DownloadPool, DownloadRun};
pub use probe_pool::{ProbePool, ProbeProgress, ProbeRun};
