//! TCP handshake prober

use super::{ProbeSettings, Prober};
use crate::{
    logging::ProbeLogger,
    models::{Candidate, ProbeResult},
    types::{AttemptOutcome, ProbeMode},
};
use async_trait::async_trait;
use std::net::SocketAddr;
use tokio::{net::TcpStream, time::{timeout, Instant}};

/// Times a bare TCP connect to `candidate:port`
pub struct TcpProber {
    settings: ProbeSettings,
    logger: Option<ProbeLogger>,
}

impl TcpProber {
    pub fn new(settings: ProbeSettings) -> Self {
        Self { settings, logger: None }
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    async fn attempt(&self, socket: SocketAddr) -> AttemptOutcome {
        let start = Instant::now();
        match timeout(self.settings.timeout_per_attempt, TcpStream::connect(socket)).await {
            Ok(Ok(stream)) => {
                let delay = start.elapsed();
                drop(stream);
                AttemptOutcome::Success(delay)
            }
            Ok(Err(_)) => AttemptOutcome::Failed,
            Err(_) => AttemptOutcome::Timeout,
        }
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, candidate: &Candidate) -> ProbeResult {
        let socket = SocketAddr::new(candidate.address, self.settings.port);
        let mut outcomes = Vec::with_capacity(self.settings.repeat_count as usize);

        for attempt in 1..=self.settings.repeat_count {
            let outcome = self.attempt(socket).await;
            if let Some(logger) = &self.logger {
                logger.attempt(candidate, attempt, &outcome).await;
            }
            outcomes.push(outcome);
        }

        ProbeResult::from_attempts(candidate, &outcomes, None)
    }

    fn mode(&self) -> ProbeMode {
        ProbeMode::Tcp
    }
}
