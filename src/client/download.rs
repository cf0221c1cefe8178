//! Streaming throughput measurement

use super::{pinned_client, Downloader, PinOptions};
use crate::{
    error::{AppError, Result},
    models::{Candidate, SpeedResult},
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Url};
use std::time::Duration;
use tokio::time::{timeout, Instant};

/// Longest time spent waiting for a connection before giving up on a candidate
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Downloads the test URL from the candidate until end of body or the deadline
pub struct HttpDownloader {
    url: Url,
    port: u16,
    max_duration: Duration,
}

impl HttpDownloader {
    pub fn new(url: Url, port: u16, max_duration: Duration) -> Self {
        Self {
            url,
            port,
            max_duration,
        }
    }
}

/// Stream the body into `bytes`; the count survives cancellation of this future
async fn stream_body(client: &Client, url: Url, bytes: &mut u64) -> Result<()> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AppError::http_request(format!(
            "Download returned status {}",
            response.status()
        )));
    }

    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        *bytes += chunk?.len() as u64;
    }
    Ok(())
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn measure_speed(&self, candidate: &Candidate) -> SpeedResult {
        let options = PinOptions {
            port: self.port,
            connect_timeout: self.max_duration.min(MAX_CONNECT_TIMEOUT),
            request_timeout: None,
            follow_redirects: true,
        };

        let start = Instant::now();
        let (url, client) = match pinned_client(&self.url, candidate.address, options) {
            Ok(pinned) => pinned,
            Err(_) => return SpeedResult::failed(candidate.address, start.elapsed()),
        };

        let mut bytes = 0u64;
        let outcome = timeout(self.max_duration, stream_body(&client, url, &mut bytes)).await;
        let elapsed = start.elapsed();

        match outcome {
            // Partial reads still count; only a transfer that never produced data is a failure
            Ok(Err(_)) if bytes == 0 => SpeedResult::failed(candidate.address, elapsed),
            _ => SpeedResult::measured(candidate.address, bytes, elapsed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn localhost() -> Candidate {
        Candidate::new("127.0.0.1".parse().unwrap(), 0)
    }

    fn downloader_for(server: &MockServer, max_duration: Duration) -> HttpDownloader {
        let port = server.address().port();
        let url = Url::parse(&format!("http://127.0.0.1:{}/100mb.bin", port)).unwrap();
        HttpDownloader::new(url, port, max_duration)
    }

    #[tokio::test]
    async fn test_full_body_measured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/100mb.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 256 * 1024]))
            .mount(&server)
            .await;

        let downloader = downloader_for(&server, Duration::from_secs(5));
        let result = downloader.measure_speed(&localhost()).await;

        assert_eq!(result.bytes_received, 256 * 1024);
        assert!(result.throughput > 0.0);
        assert!(result.elapsed <= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_slow_response_hits_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 1024])
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let downloader = downloader_for(&server, Duration::from_millis(300));
        let result = downloader.measure_speed(&localhost()).await;

        assert_eq!(result.bytes_received, 0);
        assert_eq!(result.throughput, 0.0);
        assert!(result.elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_error_status_yields_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let downloader = downloader_for(&server, Duration::from_secs(2));
        let result = downloader.measure_speed(&localhost()).await;
        assert_eq!(result.bytes_received, 0);
        assert_eq!(result.throughput, 0.0);
    }

    #[tokio::test]
    async fn test_unreachable_candidate_yields_zero() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = Url::parse("http://edge.example.com/file").unwrap();
        let downloader = HttpDownloader::new(url, port, Duration::from_secs(1));
        let result = downloader.measure_speed(&localhost()).await;

        assert_eq!(result.throughput, 0.0);
        assert_eq!(result.bytes_received, 0);
    }
}
