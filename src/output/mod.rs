//! Result sinks
//!
//! The ranked records are handed to every configured sink in turn:
//! the terminal table, the CSV exporter and, when enabled, the reporter.
//! A failing sink is logged as a warning and never aborts the run.

mod csv;
mod table;

pub use self::csv::{write_records, CsvExporter, CSV_HEADER};
pub use table::{DelayLevel, TableRenderer};

use crate::{
    error::{AppError, Result},
    logging::StageLogger,
    models::{Config, ResultRecord},
    report::Reporter,
};
use async_trait::async_trait;

/// Consumer of the final ranked records
#[async_trait]
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, records: &[ResultRecord]) -> Result<()>;
}

/// Outcome of delivering to one sink
#[derive(Debug)]
pub struct SinkOutcome {
    pub sink: String,
    pub error: Option<AppError>,
}

impl SinkOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Fans the records out to all configured sinks
pub struct OutputCoordinator {
    sinks: Vec<Box<dyn ResultSink>>,
    logger: Option<StageLogger>,
}

impl OutputCoordinator {
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            logger: None,
        }
    }

    /// Build the sink list from configuration; `logger` is shared with the sinks
    pub fn from_config(config: &Config, logger: &StageLogger) -> Result<Self> {
        let mut coordinator = Self::new().with_logger(logger.clone());

        if config.print_num > 0 {
            coordinator = coordinator.with_sink(TableRenderer::new(config.print_num, config.enable_color));
        }
        if !config.output.trim().is_empty() {
            coordinator = coordinator.with_sink(CsvExporter::new(config.output.trim()));
        }
        if config.enable_report {
            let reporter = Reporter::from_config(config)?.with_logger(logger.logger().clone());
            coordinator = coordinator.with_sink(reporter);
        }

        Ok(coordinator)
    }

    pub fn with_sink(mut self, sink: impl ResultSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_logger(mut self, logger: StageLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    /// Deliver to every sink; failures are collected, not propagated
    pub async fn deliver_all(&self, records: &[ResultRecord]) -> Vec<SinkOutcome> {
        let mut outcomes = Vec::with_capacity(self.sinks.len());

        for sink in &self.sinks {
            let error = match sink.deliver(records).await {
                Ok(()) => None,
                Err(e) => {
                    if let Some(logger) = &self.logger {
                        logger.collaborator_failed(sink.name(), &e).await;
                    }
                    Some(e)
                }
            };
            outcomes.push(SinkOutcome {
                sink: sink.name().to_string(),
                error,
            });
        }

        outcomes
    }
}

impl Default for OutputCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogBuffer, Logger};
    use crate::models::{Candidate, ProbeResult};
    use crate::types::AttemptOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn stage_logger() -> StageLogger {
        StageLogger::new(Logger::new("STAGE".to_string()))
    }

    struct CountingSink {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl ResultSink for CountingSink {
        fn name(&self) -> &str {
            if self.fail { "broken" } else { "counting" }
        }

        async fn deliver(&self, _records: &[ResultRecord]) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::export("disk full"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_other_sinks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let coordinator = OutputCoordinator::new()
            .with_sink(CountingSink { calls: calls.clone(), fail: true })
            .with_sink(CountingSink { calls: calls.clone(), fail: false });

        let outcomes = coordinator.deliver_all(&[]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
        assert_eq!(outcomes[0].sink, "broken");
    }

    #[test]
    fn test_from_config_selects_sinks() {
        let mut config = Config::default();
        config.print_num = 0;
        config.output = String::new();
        assert!(OutputCoordinator::from_config(&config, &stage_logger())
            .unwrap()
            .sink_names()
            .is_empty());

        config.print_num = 5;
        config.output = "out.csv".to_string();
        let coordinator = OutputCoordinator::from_config(&config, &stage_logger()).unwrap();
        assert_eq!(coordinator.sink_names(), vec!["table", "csv export"]);
    }

    #[test]
    fn test_from_config_with_report() {
        let mut config = Config::default();
        config.print_num = 0;
        config.output = String::new();
        config.enable_report = true;
        config.report_server_url = "http://127.0.0.1:9".to_string();
        let coordinator = OutputCoordinator::from_config(&config, &stage_logger()).unwrap();
        assert_eq!(coordinator.sink_names(), vec!["reporter"]);
    }

    #[tokio::test]
    async fn test_configured_reporter_logs_acknowledgment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/opt/report"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 0, "message": "saved"})))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.print_num = 0;
        config.output = String::new();
        config.enable_report = true;
        config.report_server_url = server.uri();

        let buffer = LogBuffer::default();
        let mut logger = Logger::new("STAGE".to_string()).with_buffer(buffer.clone());
        logger.set_color(false);
        let coordinator = OutputCoordinator::from_config(&config, &StageLogger::new(logger)).unwrap();

        let candidate = Candidate::new("162.159.0.1".parse().unwrap(), 0);
        let probe = ProbeResult::from_attempts(&candidate, &[AttemptOutcome::Success(Duration::from_millis(30))], None);
        let outcomes = coordinator.deliver_all(&[ResultRecord::new(probe, None)]).await;
        assert!(outcomes[0].succeeded());

        let lines = buffer.lock().unwrap();
        let line = lines.iter().find(|l| l.contains("Reported 1 addresses")).unwrap();
        assert!(line.contains("code=\"0\""));
        assert!(line.contains("message=\"saved\""));
    }
}
