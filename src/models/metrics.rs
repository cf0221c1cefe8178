//! Measurement data models: candidates, probe and speed results, final records

use crate::types::AttemptOutcome;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// A single address to be measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Candidate {
    /// Address under test
    pub address: IpAddr,
    /// Position in the expander's output, used as a stable tie-breaker
    pub seq: u64,
}

impl Candidate {
    pub fn new(address: IpAddr, seq: u64) -> Self {
        Self { address, seq }
    }
}

/// Latency and loss measured for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub address: IpAddr,
    pub seq: u64,
    /// Number of attempts issued
    pub attempts_sent: u32,
    /// Number of attempts that succeeded and passed validation
    pub attempts_received: u32,
    /// Sum of the delays of successful attempts
    pub total_delay: Duration,
    /// Region code seen in HTTP mode, if any response carried one
    pub colo: Option<String>,
}

impl ProbeResult {
    /// Aggregate the outcomes of all attempts made against `candidate`
    pub fn from_attempts(candidate: &Candidate, outcomes: &[AttemptOutcome], colo: Option<String>) -> Self {
        let mut received = 0u32;
        let mut total_delay = Duration::ZERO;

        for delay in outcomes.iter().filter_map(AttemptOutcome::delay) {
            received += 1;
            total_delay += delay;
        }

        Self {
            address: candidate.address,
            seq: candidate.seq,
            attempts_sent: outcomes.len() as u32,
            attempts_received: received,
            total_delay,
            colo,
        }
    }

    /// Mean delay over successful attempts; `None` when nothing succeeded
    pub fn avg_delay(&self) -> Option<Duration> {
        if self.attempts_received == 0 {
            None
        } else {
            Some(self.total_delay / self.attempts_received)
        }
    }

    /// Fraction of attempts that were lost, in `[0, 1]`
    pub fn loss_rate(&self) -> f64 {
        if self.attempts_sent == 0 {
            return 1.0;
        }
        let lost = self.attempts_sent.saturating_sub(self.attempts_received);
        lost as f64 / self.attempts_sent as f64
    }

    pub fn avg_delay_ms(&self) -> Option<f64> {
        self.avg_delay().map(|d| d.as_secs_f64() * 1000.0)
    }
}

/// Download throughput measured for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedResult {
    pub address: IpAddr,
    pub bytes_received: u64,
    pub elapsed: Duration,
    /// Bytes per second
    pub throughput: f64,
}

impl SpeedResult {
    /// Result of a download that transferred `bytes_received` in `elapsed`
    pub fn measured(address: IpAddr, bytes_received: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64();
        let throughput = if bytes_received == 0 || secs <= 0.0 {
            0.0
        } else {
            bytes_received as f64 / secs
        };

        Self {
            address,
            bytes_received,
            elapsed,
            throughput,
        }
    }

    /// Result of a download that never connected
    pub fn failed(address: IpAddr, elapsed: Duration) -> Self {
        Self {
            address,
            bytes_received: 0,
            elapsed,
            throughput: 0.0,
        }
    }

    pub fn throughput_mb(&self) -> f64 {
        self.throughput / BYTES_PER_MB
    }
}

/// Convert a MB/s threshold into bytes per second
pub fn mb_to_bytes_per_sec(mb: f64) -> f64 {
    mb * BYTES_PER_MB
}

/// Final per-address record handed to renderers and reporters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub probe: ProbeResult,
    pub speed: Option<SpeedResult>,
}

impl ResultRecord {
    pub fn new(probe: ProbeResult, speed: Option<SpeedResult>) -> Self {
        Self { probe, speed }
    }

    pub fn address(&self) -> IpAddr {
        self.probe.address
    }

    pub fn attempts_sent(&self) -> u32 {
        self.probe.attempts_sent
    }

    pub fn attempts_received(&self) -> u32 {
        self.probe.attempts_received
    }

    pub fn loss_rate(&self) -> f64 {
        self.probe.loss_rate()
    }

    pub fn avg_delay(&self) -> Option<Duration> {
        self.probe.avg_delay()
    }

    pub fn avg_delay_ms(&self) -> f64 {
        self.probe.avg_delay_ms().unwrap_or(0.0)
    }

    /// Bytes per second, 0 when no download was measured
    pub fn throughput(&self) -> f64 {
        self.speed.as_ref().map_or(0.0, |s| s.throughput)
    }

    pub fn throughput_mb(&self) -> f64 {
        self.speed.as_ref().map_or(0.0, SpeedResult::throughput_mb)
    }
}
