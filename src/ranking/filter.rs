//! Delay and loss thresholds

use crate::models::{Config, ProbeResult};
use std::time::Duration;

/// Bounds a probe result must satisfy to reach the download stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterThresholds {
    pub max_delay: Duration,
    pub min_delay: Duration,
    pub max_loss_rate: f64,
}

impl FilterThresholds {
    pub fn new(max_delay: Duration, min_delay: Duration, max_loss_rate: f64) -> Self {
        Self {
            max_delay,
            min_delay,
            max_loss_rate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_delay(), config.min_delay(), config.max_loss_rate)
    }

    /// A result without a defined average delay never passes
    pub fn accepts(&self, result: &ProbeResult) -> bool {
        match result.avg_delay() {
            Some(delay) => {
                delay >= self.min_delay
                    && delay <= self.max_delay
                    && result.loss_rate() <= self.max_loss_rate
            }
            None => false,
        }
    }

    /// Keep passing results, ordered by average delay then enumeration order
    pub fn apply(&self, results: Vec<ProbeResult>) -> Vec<ProbeResult> {
        let mut kept: Vec<ProbeResult> = results.into_iter().filter(|r| self.accepts(r)).collect();
        kept.sort_by_key(|r| (r.avg_delay(), r.seq));
        kept
    }
}
