//! Reporting of the best addresses to a collection server
//!
//! The top records are posted as JSON to `<server>/opt/report`. The server
//! answers with `{code, message}` where `code` may be a number or a string.

use crate::{
    defaults,
    error::{AppError, Result},
    logging::Logger,
    models::{Config, ResultRecord},
    output::ResultSink,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

const REPORT_PATH: &str = "/opt/report";

/// One reported address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub ip: String,
    /// Average delay in whole milliseconds
    pub delay: String,
    /// Throughput in MB/s with two decimals
    pub rate: String,
}

impl From<&ResultRecord> for ReportEntry {
    fn from(record: &ResultRecord) -> Self {
        Self {
            ip: record.address().to_string(),
            delay: format!("{:.0}", record.avg_delay_ms()),
            rate: format!("{:.2}", record.throughput_mb()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Vec<ReportEntry>,
}

/// Acknowledgment code sent back by the server
///
/// Integers are tried first so `200` stays exact; `200.0` lands in `Float`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AckCode {
    Numeric(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(code) => write!(f, "{}", code),
            Self::Float(code) => write!(f, "{}", code),
            Self::Text(code) => f.write_str(code),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportAck {
    pub code: AckCode,
    #[serde(default)]
    pub message: String,
}

/// Posts the top records to the report server
#[derive(Debug, Clone)]
pub struct Reporter {
    client: Client,
    endpoint: Url,
    kind: String,
    top_n: usize,
    logger: Option<Logger>,
}

impl Reporter {
    pub fn new(server_url: &str, kind: impl Into<String>, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(&format!("{}{}", server_url.trim_end_matches('/'), REPORT_PATH))
            .map_err(|e| AppError::config(format!("Invalid report server URL '{}': {}", server_url, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(defaults::USER_AGENT)
            .build()
            .map_err(|e| AppError::report(format!("Failed to create report client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            kind: kind.into(),
            top_n: defaults::REPORT_TOP_N,
            logger: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.report_server_url, config.report_type.clone(), config.report_timeout())
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Build the request body from the best records
    pub fn build_request(&self, records: &[ResultRecord]) -> Result<ReportRequest> {
        if records.is_empty() {
            return Err(AppError::validation("No addresses available to report"));
        }

        Ok(ReportRequest {
            kind: self.kind.clone(),
            data: records.iter().take(self.top_n).map(ReportEntry::from).collect(),
        })
    }

    pub async fn send(&self, records: &[ResultRecord]) -> Result<ReportAck> {
        let request = self.build_request(records)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::report(format!("Request to {} timed out", self.endpoint))
                } else {
                    AppError::report(format!("Request to {} failed: {}", self.endpoint, e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::report(format!("Failed to read report response: {}", e)))?;
        let ack = serde_json::from_str::<ReportAck>(&body);

        if status != StatusCode::OK {
            let message = ack.map(|a| a.message).unwrap_or(body);
            return Err(AppError::report(format!(
                "Server returned status {}: {}",
                status.as_u16(),
                message
            )));
        }

        let ack = ack.map_err(|e| AppError::report(format!("Failed to decode report response: {}", e)))?;

        if let Some(logger) = &self.logger {
            logger
                .info(&format!("Reported {} addresses", request.data.len()))
                .field("count", request.data.len())
                .field("code", ack.code.to_string())
                .field("message", &ack.message)
                .log()
                .await;
        }

        Ok(ack)
    }
}

#[async_trait]
impl ResultSink for Reporter {
    fn name(&self) -> &str {
        "reporter"
    }

    async fn deliver(&self, records: &[ResultRecord]) -> Result<()> {
        self.send(records).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogBuffer;
    use crate::models::{Candidate, ProbeResult, SpeedResult};
    use crate::types::AttemptOutcome;
    use serde_json::json;
    use std::net::IpAddr;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(i: u8, delay_ms: u64, mb_x100: u64) -> ResultRecord {
        let candidate = Candidate::new(IpAddr::from([162, 159, 0, i]), i as u64);
        let probe = ProbeResult::from_attempts(
            &candidate,
            &[AttemptOutcome::Success(Duration::from_micros(delay_ms * 1000 + 400))],
            None,
        );
        let speed = SpeedResult::measured(
            candidate.address,
            mb_x100 * 1024 * 1024 / 100,
            Duration::from_secs(1),
        );
        ResultRecord::new(probe, Some(speed))
    }

    fn reporter(server: &MockServer) -> Reporter {
        Reporter::new(&server.uri(), "cloudflare", Duration::from_secs(2)).unwrap()
    }

    #[test]
    fn test_entry_formatting() {
        let entry = ReportEntry::from(&record(1, 42, 1234));
        assert_eq!(entry.ip, "162.159.0.1");
        assert_eq!(entry.delay, "42");
        assert_eq!(entry.rate, "12.34");
    }

    #[test]
    fn test_ack_code_variants() {
        let numeric: ReportAck = serde_json::from_str(r#"{"code":200,"message":"ok"}"#).unwrap();
        assert_eq!(numeric.code, AckCode::Numeric(200));
        let text: ReportAck = serde_json::from_str(r#"{"code":"OK","message":"done"}"#).unwrap();
        assert_eq!(text.code, AckCode::Text("OK".to_string()));
        assert_eq!(text.code.to_string(), "OK");
    }

    #[test]
    fn test_ack_code_float() {
        let whole: ReportAck = serde_json::from_str(r#"{"code":200.0,"message":"ok"}"#).unwrap();
        assert_eq!(whole.code, AckCode::Float(200.0));
        assert_eq!(whole.code.to_string(), "200");

        let fractional: ReportAck = serde_json::from_str(r#"{"code":1.5}"#).unwrap();
        assert_eq!(fractional.code.to_string(), "1.5");
        assert!(fractional.message.is_empty());
    }

    #[tokio::test]
    async fn test_float_code_accepted_on_send() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/opt/report"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"code":200.0,"message":"stored"}"#))
            .mount(&server)
            .await;

        let ack = reporter(&server).send(&[record(1, 10, 100)]).await.unwrap();
        assert_eq!(ack.code, AckCode::Float(200.0));
        assert_eq!(ack.message, "stored");
    }

    #[tokio::test]
    async fn test_success_logged_with_code_and_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "OK", "message": "thanks"})))
            .mount(&server)
            .await;

        let buffer = LogBuffer::default();
        let mut logger = Logger::new("REPORT".to_string()).with_buffer(buffer.clone());
        logger.set_color(false);

        reporter(&server)
            .with_logger(logger)
            .send(&[record(1, 10, 100), record(2, 20, 100)])
            .await
            .unwrap();

        let lines = buffer.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("Reported 2 addresses"));
        assert!(lines[0].contains("code=\"OK\""));
        assert!(lines[0].contains("message=\"thanks\""));
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let reporter = Reporter::new("http://127.0.0.1:15920/", "cloudflare", Duration::from_secs(1)).unwrap();
        assert_eq!(reporter.endpoint().as_str(), "http://127.0.0.1:15920/opt/report");
    }

    #[tokio::test]
    async fn test_posts_top_five() {
        let server = MockServer::start().await;
        let records: Vec<ResultRecord> = (1..=7).map(|i| record(i, 10 * i as u64, 500)).collect();
        let expected = json!({
            "type": "cloudflare",
            "data": (1..=5).map(|i| json!({
                "ip": format!("162.159.0.{}", i),
                "delay": format!("{}", 10 * i),
                "rate": "5.00",
            })).collect::<Vec<_>>(),
        });

        Mock::given(method("POST"))
            .and(path("/opt/report"))
            .and(body_json(expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 0, "message": "saved"})))
            .expect(1)
            .mount(&server)
            .await;

        let ack = reporter(&server).send(&records).await.unwrap();
        assert_eq!(ack.code, AckCode::Numeric(0));
        assert_eq!(ack.message, "saved");
    }

    #[tokio::test]
    async fn test_non_200_is_report_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/opt/report"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"code": "E1", "message": "boom"})))
            .mount(&server)
            .await;

        let err = reporter(&server).deliver(&[record(1, 10, 100)]).await.unwrap_err();
        assert!(matches!(err, AppError::Report(ref msg) if msg.contains("500") && msg.contains("boom")));
        assert!(err.is_collaborator_failure());
    }

    #[tokio::test]
    async fn test_empty_records_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = reporter(&server).deliver(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_report_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"code": 0, "message": "late"}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let reporter = Reporter::new(&server.uri(), "cloudflare", Duration::from_millis(200)).unwrap();
        let err = reporter.send(&[record(1, 10, 100)]).await.unwrap_err();
        assert!(matches!(err, AppError::Report(_)));
    }
}
