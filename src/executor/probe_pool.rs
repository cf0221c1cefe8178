//! Bounded-concurrency latency probing

use crate::{
    client::Prober,
    defaults,
    logging::{ProbeLogger, StageLogger},
    models::{Candidate, ProbeResult},
    shutdown::ShutdownSignal,
};
use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinSet,
};

/// Results between two progress log lines
const PROGRESS_INTERVAL: u64 = 500;

/// Counters shared by the producer, the workers and whoever wants to sample them
#[derive(Debug, Default)]
pub struct ProbeProgress {
    queued: AtomicU64,
    done: AtomicU64,
}

impl ProbeProgress {
    /// Candidates handed to the queue so far
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Candidates fully probed so far
    pub fn done(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }
}

/// Outcome of a probe pass
#[derive(Debug, Default)]
pub struct ProbeRun {
    /// One result per distinct address, in no particular order
    pub results: Vec<ProbeResult>,
    /// Cancellation cut the pass short
    pub interrupted: bool,
}

/// Runs a prober over a candidate stream with a fixed worker budget
pub struct ProbePool {
    prober: Arc<dyn Prober>,
    concurrency: usize,
    progress: Arc<ProbeProgress>,
    stage_logger: Option<StageLogger>,
    probe_logger: Option<ProbeLogger>,
}

impl ProbePool {
    /// `concurrency` is clamped into `[1, MAX_ROUTINES]`
    pub fn new(prober: Arc<dyn Prober>, concurrency: usize) -> Self {
        Self {
            prober,
            concurrency: concurrency.clamp(1, defaults::MAX_ROUTINES),
            progress: Arc::new(ProbeProgress::default()),
            stage_logger: None,
            probe_logger: None,
        }
    }

    pub fn with_loggers(mut self, stage_logger: StageLogger, probe_logger: ProbeLogger) -> Self {
        self.stage_logger = Some(stage_logger);
        self.probe_logger = Some(probe_logger);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn progress(&self) -> Arc<ProbeProgress> {
        self.progress.clone()
    }

    /// Probe every candidate; duplicate addresses keep their first result
    pub async fn run_all<I>(&self, candidates: I, shutdown: ShutdownSignal) -> ProbeRun
    where
        I: IntoIterator<Item = Candidate>,
        I::IntoIter: Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<Candidate>(self.concurrency * 2);
        let (result_tx, mut result_rx) = mpsc::channel::<ProbeResult>(self.concurrency * 2);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let producer = {
            let mut shutdown = shutdown.clone();
            let progress = self.progress.clone();
            let candidates = candidates.into_iter();
            tokio::spawn(async move {
                for candidate in candidates {
                    if shutdown.is_triggered() {
                        break;
                    }
                    tokio::select! {
                        sent = job_tx.send(candidate) => {
                            if sent.is_err() {
                                break;
                            }
                            progress.queued.fetch_add(1, Ordering::Relaxed);
                        }
                        _ = shutdown.triggered() => break,
                    }
                }
            })
        };

        let mut workers = JoinSet::new();
        for _ in 0..self.concurrency {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            let prober = self.prober.clone();
            let logger = self.probe_logger.clone();
            let mut shutdown = shutdown.clone();

            workers.spawn(async move {
                loop {
                    let next = { job_rx.lock().await.recv().await };
                    let Some(candidate) = next else { break };

                    let result = tokio::select! {
                        result = prober.probe(&candidate) => result,
                        _ = shutdown.triggered() => break,
                    };

                    if let Some(logger) = &logger {
                        logger.probed(&result).await;
                    }
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut by_address: HashMap<IpAddr, ProbeResult> = HashMap::new();
        while let Some(result) = result_rx.recv().await {
            let done = self.progress.done.fetch_add(1, Ordering::Relaxed) + 1;
            by_address.entry(result.address).or_insert(result);

            if done % PROGRESS_INTERVAL == 0 {
                if let Some(logger) = &self.stage_logger {
                    logger.progress("probe", done, self.progress.queued()).await;
                }
            }
        }

        while workers.join_next().await.is_some() {}
        producer.abort();

        ProbeRun {
            results: by_address.into_values().collect(),
            interrupted: shutdown.is_triggered(),
        }
    }
}
