//! Edge IP Optimizer
//!
//! Measures a large set of CDN edge addresses and produces a ranked shortlist:
//! address ranges are expanded into candidates, probed concurrently for latency
//! and loss, filtered by thresholds, measured for download throughput with an
//! early stop, and finally ranked.

pub mod app;
pub mod candidates;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod output;
pub mod ranking;
pub mod report;
pub mod shutdown;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, Result};
pub use models::{Candidate, Config, ProbeResult, ResultRecord, SpeedResult};
pub use candidates::CandidateExpander;
pub use executor::{DownloadPool, ProbePool};
pub use ranking::{FilterThresholds, Ranker};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Build metadata set by build.rs
pub const BUILD_TIME: &str = env!("BUILD_TIME");
pub const GIT_COMMIT: &str = env!("GIT_COMMIT");
pub const TARGET_TRIPLE: &str = env!("TARGET_TRIPLE");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_ROUTINES: usize = 200;
    pub const MAX_ROUTINES: usize = 1000;
    pub const DEFAULT_PING_TIMES: u32 = 4;
    pub const DEFAULT_TCP_PORT: u16 = 443;
    pub const DEFAULT_URL: &str = "https://cf.xiu2.xyz/url";
    pub const DEFAULT_TCP_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_HTTP_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
    /// Status codes accepted by HTTP probing when no override is configured
    pub const DEFAULT_ACCEPTED_STATUS: &[u16] = &[200, 301, 302];

    pub const DEFAULT_MAX_DELAY_MS: u64 = 9999;
    pub const DEFAULT_MIN_DELAY_MS: u64 = 0;
    pub const DEFAULT_MAX_LOSS_RATE: f64 = 1.0;

    pub const DEFAULT_TEST_COUNT: usize = 10;
    pub const DEFAULT_DOWNLOAD_SECS: u64 = 10;
    pub const DEFAULT_MIN_SPEED_MB: f64 = 0.0;
    pub const DEFAULT_DOWNLOAD_PARALLELISM: usize = 1;
    pub const MAX_DOWNLOAD_PARALLELISM: usize = 4;

    pub const DEFAULT_IP_FILE: &str = "ip.txt";
    /// Loaded without `-c` when present in the working directory
    pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
    pub const DEFAULT_PRINT_NUM: usize = 10;
    pub const DEFAULT_OUTPUT: &str = "result.csv";
    pub const DEFAULT_ENABLE_COLOR: bool = true;

    pub const DEFAULT_REPORT_SERVER_URL: &str = "http://127.0.0.1:15920";
    pub const DEFAULT_REPORT_TYPE: &str = "cloudflare";
    pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 10;
    /// Number of top records sent to the report server
    pub const REPORT_TOP_N: usize = 5;

    pub const USER_AGENT: &str = concat!("edge-ip-optimizer/", env!("CARGO_PKG_VERSION"));
}
