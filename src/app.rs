//! Main application orchestration and execution
//!
//! `App` owns the immutable configuration and runs the stages in order:
//! expand, probe, filter, download, rank, deliver. The shutdown signal is
//! checked between stages; an interrupted run still ranks and delivers what
//! it gathered.

use crate::{
    candidates::CandidateExpander,
    client::{ClientFactory, Downloader, Prober},
    config::validate_config,
    error::Result,
    executor::{DownloadPool, ProbePool},
    log_debug, log_info, log_warn,
    logging::LoggerFactory,
    models::{Config, ResultRecord},
    output::OutputCoordinator,
    ranking::{FilterThresholds, Ranker},
    shutdown::Shutdown,
};
use std::sync::Arc;

/// What a completed run produced
#[derive(Debug, Default)]
pub struct RunSummary {
    pub records: Vec<ResultRecord>,
    /// Candidates the expansion announced
    pub candidates: u64,
    /// Distinct addresses probed
    pub probed: usize,
    pub passed_filter: usize,
    pub downloads_tested: usize,
    pub downloads_qualified: usize,
    /// Sinks that reported a failure
    pub sink_failures: usize,
    pub interrupted: bool,
}

/// Main application struct that coordinates all stages
pub struct App {
    config: Config,
    shutdown: Shutdown,
    seed: Option<u64>,
    prober: Option<Arc<dyn Prober>>,
    downloader: Option<Arc<dyn Downloader>>,
    output: Option<OutputCoordinator>,
}

impl App {
    /// Create a new application instance from a validated configuration
    pub fn new(config: Config) -> Self {
        Self {
            config,
            shutdown: Shutdown::new(),
            seed: None,
            prober: None,
            downloader: None,
            output: None,
        }
    }

    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Fix the sampling seed for reproducible candidate sets
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_prober(mut self, prober: Arc<dyn Prober>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn with_downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Replace the sinks built from configuration
    pub fn with_output(mut self, output: OutputCoordinator) -> Self {
        self.output = Some(output);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the application
    pub async fn run(self) -> Result<RunSummary> {
        let config = &self.config;
        let loggers = LoggerFactory::new(config.clone());
        let logger = loggers.create_logger("APP").await;
        let stage_logger = loggers.create_stage_logger().await;
        let probe_logger = loggers.create_probe_logger().await;

        log_info!(logger, "Edge IP Optimizer v{} (session {})", crate::VERSION, loggers.session_id());
        log_debug!(
            logger,
            "Build {} for {} at {}",
            crate::GIT_COMMIT,
            crate::TARGET_TRIPLE,
            crate::BUILD_TIME
        );

        for warning in validate_config(config)? {
            log_warn!(logger, "{}", warning.format(false));
        }

        // Fail fast on bad ranges before any network work
        let mut expander = CandidateExpander::from_config(config)?;
        if let Some(seed) = self.seed {
            expander = expander.with_seed(seed);
        }

        let mut summary = RunSummary {
            candidates: expander.candidate_count(),
            ..RunSummary::default()
        };
        log_debug!(
            logger,
            "Expanded {} ranges into {} candidates",
            expander.ranges().len(),
            summary.candidates
        );

        let factory = ClientFactory::new(config.clone()).with_logger(probe_logger.clone());
        let prober = match &self.prober {
            Some(prober) => prober.clone(),
            None => factory.create_prober()?,
        };

        // Probe
        let stage = prober.mode().name();
        let started = stage_logger.stage_started(stage, Some(summary.candidates)).await;
        let pool = ProbePool::new(prober, config.effective_routines())
            .with_loggers(stage_logger.clone(), probe_logger.clone());
        let probe_run = pool.run_all(expander, self.shutdown.signal()).await;
        summary.probed = probe_run.results.len();
        summary.interrupted = probe_run.interrupted;
        stage_logger.stage_finished(stage, started, summary.probed).await;

        // Filter
        let started = stage_logger.stage_started("filter", Some(summary.probed as u64)).await;
        let filtered = FilterThresholds::from_config(config).apply(probe_run.results);
        summary.passed_filter = filtered.len();
        stage_logger.stage_finished("filter", started, filtered.len()).await;

        // Download
        let speeds = if config.disable_download {
            log_info!(logger, "Download stage disabled, ranking by delay");
            None
        } else if summary.interrupted || self.shutdown.is_triggered() {
            summary.interrupted = true;
            log_warn!(logger, "Run interrupted, skipping download stage");
            None
        } else if filtered.is_empty() {
            log_info!(logger, "No addresses passed the thresholds, skipping download stage");
            Some(Vec::new())
        } else {
            let downloader = match &self.downloader {
                Some(downloader) => downloader.clone(),
                None => factory.create_downloader()?,
            };

            let started = stage_logger
                .stage_started("download", Some(filtered.len() as u64))
                .await;
            let download_run = DownloadPool::new(downloader, config.test_count, config.min_speed)
                .with_parallelism(config.effective_download_parallelism())
                .with_logger(probe_logger.clone())
                .run_until_satisfied(&filtered, self.shutdown.signal())
                .await;

            summary.downloads_tested = download_run.tested;
            summary.downloads_qualified = download_run.qualified;
            summary.interrupted |= download_run.interrupted;
            stage_logger
                .stage_finished("download", started, download_run.results.len())
                .await;

            if download_run.qualified == 0 && download_run.tested > 0 {
                log_warn!(
                    logger,
                    "No address reached {:.2} MB/s, showing all {} tested",
                    config.min_speed,
                    download_run.tested
                );
            }
            Some(download_run.results)
        };

        // Rank and deliver
        summary.records = Ranker::new().rank(filtered, speeds);

        let output = match self.output {
            Some(output) => output,
            None => OutputCoordinator::from_config(config, &stage_logger)?,
        }
        .with_logger(stage_logger.clone());

        let outcomes = output.deliver_all(&summary.records).await;
        summary.sink_failures = outcomes.iter().filter(|o| !o.succeeded()).count();

        if summary.interrupted {
            log_warn!(logger, "Run interrupted, {} partial results delivered", summary.records.len());
        }
        log_info!(
            logger,
            "Done: {} candidates, {} probed, {} passed, {} ranked",
            summary.candidates,
            summary.probed,
            summary.passed_filter,
            summary.records.len()
        );

        Ok(summary)
    }
}
