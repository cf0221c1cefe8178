//! Final ordering of measured addresses

use crate::models::{ProbeResult, ResultRecord, SpeedResult};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::IpAddr;

/// Merges probe and speed results into the final record set
#[derive(Debug, Default, Clone, Copy)]
pub struct Ranker;

impl Ranker {
    pub fn new() -> Self {
        Self
    }

    /// Build ranked records from the filtered probe results
    ///
    /// With `speeds` of `None` the download stage was skipped and the delay
    /// order of `filtered` is kept. Otherwise only measured addresses are
    /// returned, fastest first, ties broken by lower delay.
    pub fn rank(&self, filtered: Vec<ProbeResult>, speeds: Option<Vec<SpeedResult>>) -> Vec<ResultRecord> {
        let Some(speeds) = speeds else {
            return filtered
                .into_iter()
                .map(|probe| ResultRecord::new(probe, None))
                .collect();
        };

        let mut probes: HashMap<IpAddr, ProbeResult> =
            filtered.into_iter().map(|p| (p.address, p)).collect();

        let mut records: Vec<ResultRecord> = speeds
            .into_iter()
            .filter_map(|speed| {
                probes
                    .remove(&speed.address)
                    .map(|probe| ResultRecord::new(probe, Some(speed)))
            })
            .collect();

        records.sort_by(|a, b| {
            b.throughput()
                .partial_cmp(&a.throughput())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.avg_delay().cmp(&b.avg_delay()))
        });
        records
    }
}
