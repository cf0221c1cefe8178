//! Throughput measurement with early stop
//!
//! The coordinator (the task running `run_until_satisfied`) owns the
//! qualifying counter. It hands one job at a time to each idle worker and
//! stops dispatching once enough candidates have qualified.

use crate::{
    client::Downloader,
    defaults,
    logging::ProbeLogger,
    models::{metrics::mb_to_bytes_per_sec, Candidate, ProbeResult, SpeedResult},
    shutdown::ShutdownSignal,
};
use std::sync::Arc;
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};

/// Outcome of a download pass
#[derive(Debug, Default)]
pub struct DownloadRun {
    /// Qualifying results in test order, at most `target_count`; every tested
    /// result when nothing qualified
    pub results: Vec<SpeedResult>,
    /// Number of downloads that completed
    pub tested: usize,
    pub qualified: usize,
    pub interrupted: bool,
}

/// Runs a downloader over delay-sorted candidates until enough qualify
pub struct DownloadPool {
    downloader: Arc<dyn Downloader>,
    parallelism: usize,
    target_count: usize,
    /// Bytes per second
    min_speed: f64,
    logger: Option<ProbeLogger>,
}

impl DownloadPool {
    /// `min_speed_mb` is in MB/s; `parallelism` is clamped into `[1, MAX_DOWNLOAD_PARALLELISM]`
    pub fn new(downloader: Arc<dyn Downloader>, target_count: usize, min_speed_mb: f64) -> Self {
        Self {
            downloader,
            parallelism: defaults::DEFAULT_DOWNLOAD_PARALLELISM,
            target_count,
            min_speed: mb_to_bytes_per_sec(min_speed_mb),
            logger: None,
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.clamp(1, defaults::MAX_DOWNLOAD_PARALLELISM);
        self
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    fn qualifies(&self, speed: &SpeedResult) -> bool {
        speed.throughput >= self.min_speed
    }

    /// Measure candidates in the given order until `target_count` qualify
    pub async fn run_until_satisfied(&self, sorted: &[ProbeResult], shutdown: ShutdownSignal) -> DownloadRun {
        let mut run = DownloadRun::default();
        if sorted.is_empty() || self.target_count == 0 {
            return run;
        }

        let (job_tx, job_rx) = mpsc::channel::<(usize, Candidate)>(self.parallelism);
        let (result_tx, mut result_rx) = mpsc::channel::<(usize, SpeedResult)>(self.parallelism);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut workers = JoinSet::new();
        for _ in 0..self.parallelism {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let downloader = self.downloader.clone();
            workers.spawn(async move {
                loop {
                    let next = { job_rx.lock().await.recv().await };
                    let Some((index, candidate)) = next else { break };
                    let speed = downloader.measure_speed(&candidate).await;
                    if result_tx.send((index, speed)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut shutdown = shutdown;
        let mut tested: Vec<(usize, SpeedResult)> = Vec::new();
        let mut next_index = 0usize;
        let mut in_flight = 0usize;

        loop {
            while in_flight < self.parallelism
                && next_index < sorted.len()
                && run.qualified < self.target_count
            {
                let probe = &sorted[next_index];
                let candidate = Candidate::new(probe.address, probe.seq);
                if job_tx.send((next_index, candidate)).await.is_err() {
                    break;
                }
                next_index += 1;
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            tokio::select! {
                message = result_rx.recv() => {
                    let Some((index, speed)) = message else { break };
                    in_flight -= 1;

                    let qualified = self.qualifies(&speed);
                    if qualified {
                        run.qualified += 1;
                    }
                    if let Some(logger) = &self.logger {
                        logger.downloaded(&speed, qualified).await;
                    }
                    tested.push((index, speed));
                }
                _ = shutdown.triggered() => {
                    run.interrupted = true;
                    break;
                }
            }
        }

        drop(job_tx);
        workers.abort_all();
        while workers.join_next().await.is_some() {}

        run.tested = tested.len();
        tested.sort_by_key(|(index, _)| *index);

        let qualifying: Vec<SpeedResult> = tested
            .iter()
            .filter(|(_, speed)| self.qualifies(speed))
            .map(|(_, speed)| speed.clone())
            .take(self.target_count)
            .collect();

        run.results = if qualifying.is_empty() {
            tested.into_iter().map(|(_, speed)| speed).collect()
        } else {
            qualifying
        };
        run
    }
}
