//! Measurement clients: latency probers and the throughput downloader
//!
//! Every request made here is pinned to one candidate address. The test URL
//! keeps its host name (Host header and SNI), while name resolution always
//! answers with the candidate.

pub mod download;
pub mod http;
pub mod tcp;

pub use download::HttpDownloader;
pub use http::{extract_colo, HttpProber};
pub use tcp::TcpProber;

use crate::{
    defaults,
    error::{AppError, Result},
    logging::ProbeLogger,
    models::{Candidate, Config, ProbeResult, SpeedResult},
    types::ProbeMode,
};
use async_trait::async_trait;
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::{redirect, Client, Url};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

/// Measures latency and loss for a single candidate
#[async_trait]
pub trait Prober: Send + Sync {
    /// Run every attempt against `candidate`; transient failures count as loss
    async fn probe(&self, candidate: &Candidate) -> ProbeResult;

    fn mode(&self) -> ProbeMode;
}

/// Measures sustained download throughput for a single candidate
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Never fails: a dead candidate yields a zero-throughput result
    async fn measure_speed(&self, candidate: &Candidate) -> SpeedResult;
}

/// Settings shared by both probe modes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSettings {
    pub port: u16,
    pub repeat_count: u32,
    pub timeout_per_attempt: Duration,
}

impl ProbeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            port: config.tcp_port,
            repeat_count: config.ping_times,
            timeout_per_attempt: config.probe_timeout(),
        }
    }
}

/// Resolver that answers every lookup with one fixed socket address
#[derive(Debug, Clone, Copy)]
struct PinnedResolver {
    addr: SocketAddr,
}

impl Resolve for PinnedResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        let addrs: Addrs = Box::new(std::iter::once(self.addr));
        Box::pin(async move { Ok::<_, Box<dyn std::error::Error + Send + Sync>>(addrs) })
    }
}

/// Request settings for a client pinned to one address
#[derive(Debug, Clone, Copy)]
pub(crate) struct PinOptions {
    pub port: u16,
    pub connect_timeout: Duration,
    /// Whole-request timeout; `None` leaves the caller to bound the request
    pub request_timeout: Option<Duration>,
    pub follow_redirects: bool,
}

/// Rewrite `base` so it reaches `address` on `port` and build a matching client
pub(crate) fn pinned_client(base: &Url, address: IpAddr, options: PinOptions) -> Result<(Url, Client)> {
    let mut url = base.clone();
    url.set_port(Some(options.port))
        .map_err(|_| AppError::config(format!("Cannot set port on URL {}", base)))?;

    match url.host() {
        Some(url::Host::Domain(_)) => {}
        Some(_) => {
            url.set_ip_host(address)
                .map_err(|_| AppError::config(format!("Cannot set host on URL {}", base)))?;
        }
        None => return Err(AppError::config(format!("URL has no host: {}", base))),
    }

    let mut builder = Client::builder()
        .user_agent(defaults::USER_AGENT)
        .connect_timeout(options.connect_timeout)
        .pool_max_idle_per_host(0)
        .dns_resolver(Arc::new(PinnedResolver {
            addr: SocketAddr::new(address, options.port),
        }))
        .redirect(if options.follow_redirects {
            redirect::Policy::limited(10)
        } else {
            redirect::Policy::none()
        });

    if let Some(timeout) = options.request_timeout {
        builder = builder.timeout(timeout);
    }

    let client = builder
        .build()
        .map_err(|e| AppError::network(format!("Failed to create HTTP client: {}", e)))?;

    Ok((url, client))
}

/// Builds the configured prober and downloader
pub struct ClientFactory {
    config: Config,
    logger: Option<ProbeLogger>,
}

impl ClientFactory {
    pub fn new(config: Config) -> Self {
        Self { config, logger: None }
    }

    pub fn with_logger(mut self, logger: ProbeLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Prober for the configured mode
    pub fn create_prober(&self) -> Result<Arc<dyn Prober>> {
        let settings = ProbeSettings::from_config(&self.config);

        let prober: Arc<dyn Prober> = match self.config.probe_mode() {
            ProbeMode::Tcp => {
                let mut prober = TcpProber::new(settings);
                if let Some(logger) = &self.logger {
                    prober = prober.with_logger(logger.clone());
                }
                Arc::new(prober)
            }
            ProbeMode::Http => {
                let url = parse_test_url(&self.config.url)?;
                let mut prober = HttpProber::new(
                    settings,
                    url,
                    self.config.accepted_status_codes(),
                    self.config.colo_allow_list(),
                );
                if let Some(logger) = &self.logger {
                    prober = prober.with_logger(logger.clone());
                }
                Arc::new(prober)
            }
        };

        Ok(prober)
    }

    pub fn create_downloader(&self) -> Result<Arc<dyn Downloader>> {
        let url = parse_test_url(&self.config.url)?;
        Ok(Arc::new(HttpDownloader::new(
            url,
            self.config.tcp_port,
            self.config.download_duration(),
        )))
    }
}

fn parse_test_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| AppError::config(format!("Invalid test URL '{}': {}", raw, e)))
}
