//! Type definitions and aliases

use std::time::Duration;
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use crate::error::{AppError, Result};

/// How a candidate's latency is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeMode {
    /// Time a bare TCP handshake to the candidate
    Tcp,
    /// Time an HTTP request to the probe URL, validating status and region
    Http,
}

impl ProbeMode {
    /// Mode selected by the `httping` switch
    pub fn from_httping(httping: bool) -> Self {
        if httping {
            Self::Http
        } else {
            Self::Tcp
        }
    }

    /// Per-attempt timeout used when none is configured
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Tcp => crate::defaults::DEFAULT_TCP_PROBE_TIMEOUT,
            Self::Http => crate::defaults::DEFAULT_HTTP_PROBE_TIMEOUT,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Tcp => "TCPing",
            Self::Http => "HTTPing",
        }
    }
}

/// How address ranges are turned into candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpandMode {
    /// One random address per IPv4 /24 block (and per IPv6 range)
    SampleOnePerBlock,
    /// Every IPv4 address in every block
    EnumerateAll,
}

impl ExpandMode {
    /// Mode selected by the `test_all` switch
    pub fn from_test_all(test_all: bool) -> Self {
        if test_all {
            Self::EnumerateAll
        } else {
            Self::SampleOnePerBlock
        }
    }
}

/// Outcome of a single probe attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AttemptOutcome {
    /// The attempt succeeded after the given delay
    Success(Duration),
    /// Connection failed or was refused
    Failed,
    /// The attempt ran past its timeout
    Timeout,
    /// A response arrived but failed status or region validation
    Rejected,
}

impl AttemptOutcome {
    pub fn delay(&self) -> Option<Duration> {
        match self {
            Self::Success(delay) => Some(*delay),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}
