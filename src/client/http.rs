//! HTTP prober with status and region validation

use super::{pinned_client, PinOptions, ProbeSettings, Prober};
use crate::{
    logging::ProbeLogger,
    models::{Candidate, ProbeResult},
    types::{AttemptOutcome, ProbeMode},
};
use async_trait::async_trait;
use reqwest::{header::HeaderMap, Client, Url};
use std::collections::HashSet;
use tokio::time::{timeout, Instant};

/// Region code from CDN response headers
///
/// Cloudflare's `cf-ray` carries it after the last `-`; CloudFront's
/// `x-amz-cf-pop` starts with it. Returned upper-cased.
pub fn extract_colo(headers: &HeaderMap) -> Option<String> {
    if let Some(ray) = headers.get("cf-ray").and_then(|v| v.to_str().ok()) {
        if let Some((_, colo)) = ray.rsplit_once('-') {
            let colo = colo.trim();
            if !colo.is_empty() {
                return Some(colo.to_ascii_uppercase());
            }
        }
    }

    headers
        .get("x-amz-cf-pop")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|pop| pop.len() >= 3 && pop.is_char_boundary(3))
        .map(|pop| pop[..3].to_ascii_uppercase())
}

/// Times a `HEAD` request to the test URL, pinned to the candidate
pub struct HttpProber {
    settings: ProbeSettings,
    url: Url,
    accepted_status: Vec<u16>,
    colo_allow_list: Option<HashSet<String>>,
    logger: Option<ProbeLogger>,
}

impl HttpProber {
    pub fn new(
        settings: ProbeSettings,
        url: Url,
        accepted_status: Vec<u16>,
        colo_allow_list: Option<HashSet<String>>,
    ) -> Self {
        Self {
            settings,
            url,
            accepted_status,
            colo_allow_list,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// One request; returns the outcome and the region seen, if any
    async fn attempt(&self, client: &Client, url: &Url) -> (AttemptOutcome, Option<String>) {
        let start = Instant::now();
        let response = match timeout(self.settings.timeout_per_attempt, client.head(url.clone()).send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) if e.is_timeout() => return (AttemptOutcome::Timeout, None),
            Ok(Err(_)) => return (AttemptOutcome::Failed, None),
            Err(_) => return (AttemptOutcome::Timeout, None),
        };
        let delay = start.elapsed();

        let colo = extract_colo(response.headers());

        if !self.accepted_status.contains(&response.status().as_u16()) {
            return (AttemptOutcome::Rejected, colo);
        }

        if let Some(allowed) = &self.colo_allow_list {
            let in_region = colo.as_ref().is_some_and(|c| allowed.contains(c));
            if !in_region {
                return (AttemptOutcome::Rejected, colo);
            }
        }

        (AttemptOutcome::Success(delay), colo)
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, candidate: &Candidate) -> ProbeResult {
        let options = PinOptions {
            port: self.settings.port,
            connect_timeout: self.settings.timeout_per_attempt,
            request_timeout: Some(self.settings.timeout_per_attempt),
            follow_redirects: false,
        };

        let (url, client) = match pinned_client(&self.url, candidate.address, options) {
            Ok(pinned) => pinned,
            Err(_) => {
                let outcomes = vec![AttemptOutcome::Failed; self.settings.repeat_count as usize];
                return ProbeResult::from_attempts(candidate, &outcomes, None);
            }
        };

        let mut outcomes = Vec::with_capacity(self.settings.repeat_count as usize);
        let mut seen_colo = None;

        for attempt in 1..=self.settings.repeat_count {
            let (outcome, colo) = self.attempt(&client, &url).await;
            if let Some(logger) = &self.logger {
                logger.attempt(candidate, attempt, &outcome).await;
            }
            if colo.is_some() {
                seen_colo = colo;
            }
            outcomes.push(outcome);
        }

        ProbeResult::from_attempts(candidate, &outcomes, seen_colo)
    }

    fn mode(&self) -> ProbeMode {
        ProbeMode::Http
    }
}
