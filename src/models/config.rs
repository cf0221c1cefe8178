//! Configuration data model and validation

use crate::defaults;
use crate::error::{AppError, Result};
use crate::types::{ExpandMode, ProbeMode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
///
/// Built once per run (defaults, config file, environment, command line) and
/// then shared read-only with every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Probe worker budget, clamped into `[1, MAX_ROUTINES]` at use
    #[serde(default = "default_routines")]
    pub routines: usize,

    /// Attempts per candidate
    #[serde(default = "default_ping_times")]
    pub ping_times: u32,

    /// Port used for TCP probing and for the download connection
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,

    /// Probe over HTTP instead of a bare TCP handshake
    #[serde(default)]
    pub httping: bool,

    /// Single accepted HTTP status; 0 keeps the default set
    #[serde(default)]
    pub httping_code: u16,

    /// Comma separated region codes allowed in HTTP mode; empty disables the check
    #[serde(default)]
    pub httping_cfcolo: String,

    /// URL used for HTTP probing and speed testing
    #[serde(default = "default_url")]
    pub url: String,

    /// Upper bound on average delay, in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay: u64,

    /// Lower bound on average delay, in milliseconds
    #[serde(default)]
    pub min_delay: u64,

    #[serde(default = "default_max_loss_rate")]
    pub max_loss_rate: f64,

    /// Number of qualifying download results wanted
    #[serde(default = "default_test_count")]
    pub test_count: usize,

    /// Maximum duration of a single download, in seconds
    #[serde(default = "default_download_time")]
    pub download_time: u64,

    /// Minimum throughput for a download to qualify, in MB/s
    #[serde(default)]
    pub min_speed: f64,

    #[serde(default)]
    pub disable_download: bool,

    /// Range file; empty disables it
    #[serde(default = "default_ip_file")]
    pub ip_file: String,

    /// Comma separated inline ranges
    #[serde(default)]
    pub ip_text: String,

    /// Enumerate every IPv4 address instead of sampling one per /24
    #[serde(default)]
    pub test_all: bool,

    /// Per-attempt probe timeout override, in milliseconds
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    #[serde(default = "default_download_parallelism")]
    pub download_parallelism: usize,

    /// Rows shown in the terminal table; 0 disables it
    #[serde(default = "default_print_num")]
    pub print_num: usize,

    /// CSV output path; empty disables export
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub enable_report: bool,

    #[serde(default = "default_report_server_url")]
    pub report_server_url: String,

    #[serde(default = "default_report_type")]
    pub report_type: String,

    /// Report request timeout, in seconds
    #[serde(default = "default_report_timeout")]
    pub report_timeout: u64,
}

/// Where address ranges are read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSource {
    File(PathBuf),
    Inline(String),
}

impl std::fmt::Display for RangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => write!(f, "file {}", path.display()),
            Self::Inline(text) => write!(f, "inline {}", text),
        }
    }
}

fn default_routines() -> usize {
    defaults::DEFAULT_ROUTINES
}

fn default_ping_times() -> u32 {
    defaults::DEFAULT_PING_TIMES
}

fn default_tcp_port() -> u16 {
    defaults::DEFAULT_TCP_PORT
}

fn default_url() -> String {
    defaults::DEFAULT_URL.to_string()
}

fn default_max_delay() -> u64 {
    defaults::DEFAULT_MAX_DELAY_MS
}

fn default_max_loss_rate() -> f64 {
    defaults::DEFAULT_MAX_LOSS_RATE
}

fn default_test_count() -> usize {
    defaults::DEFAULT_TEST_COUNT
}

fn default_download_time() -> u64 {
    defaults::DEFAULT_DOWNLOAD_SECS
}

fn default_ip_file() -> String {
    defaults::DEFAULT_IP_FILE.to_string()
}

fn default_download_parallelism() -> usize {
    defaults::DEFAULT_DOWNLOAD_PARALLELISM
}

fn default_print_num() -> usize {
    defaults::DEFAULT_PRINT_NUM
}

fn default_output() -> String {
    defaults::DEFAULT_OUTPUT.to_string()
}

fn default_enable_color() -> bool {
    defaults::DEFAULT_ENABLE_COLOR
}

fn default_report_server_url() -> String {
    defaults::DEFAULT_REPORT_SERVER_URL.to_string()
}

fn default_report_type() -> String {
    defaults::DEFAULT_REPORT_TYPE.to_string()
}

fn default_report_timeout() -> u64 {
    defaults::DEFAULT_REPORT_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routines: default_routines(),
            ping_times: default_ping_times(),
            tcp_port: default_tcp_port(),
            httping: false,
            httping_code: 0,
            httping_cfcolo: String::new(),
            url: default_url(),
            max_delay: default_max_delay(),
            min_delay: defaults::DEFAULT_MIN_DELAY_MS,
            max_loss_rate: default_max_loss_rate(),
            test_count: default_test_count(),
            download_time: default_download_time(),
            min_speed: defaults::DEFAULT_MIN_SPEED_MB,
            disable_download: false,
            ip_file: default_ip_file(),
            ip_text: String::new(),
            test_all: false,
            probe_timeout_ms: None,
            download_parallelism: default_download_parallelism(),
            print_num: default_print_num(),
            output: default_output(),
            debug: false,
            verbose: false,
            enable_color: default_enable_color(),
            enable_report: false,
            report_server_url: default_report_server_url(),
            report_type: default_report_type(),
            report_timeout: default_report_timeout(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML configuration file; missing keys take their defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn probe_mode(&self) -> ProbeMode {
        ProbeMode::from_httping(self.httping)
    }

    pub fn expand_mode(&self) -> ExpandMode {
        ExpandMode::from_test_all(self.test_all)
    }

    /// Worker budget clamped into the supported range
    pub fn effective_routines(&self) -> usize {
        self.routines.clamp(1, defaults::MAX_ROUTINES)
    }

    pub fn effective_download_parallelism(&self) -> usize {
        self.download_parallelism
            .clamp(1, defaults::MAX_DOWNLOAD_PARALLELISM)
    }

    /// Per-attempt timeout, falling back to the mode default
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.probe_mode().default_timeout())
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay)
    }

    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay)
    }

    pub fn download_duration(&self) -> Duration {
        Duration::from_secs(self.download_time)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_secs(self.report_timeout)
    }

    /// Status codes an HTTP probe accepts
    pub fn accepted_status_codes(&self) -> Vec<u16> {
        if self.httping_code == 0 {
            defaults::DEFAULT_ACCEPTED_STATUS.to_vec()
        } else {
            vec![self.httping_code]
        }
    }

    /// Upper-cased region allow-list, or `None` when any region is accepted
    pub fn colo_allow_list(&self) -> Option<HashSet<String>> {
        let set: HashSet<String> = self
            .httping_cfcolo
            .split(',')
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| !c.is_empty())
            .collect();

        if set.is_empty() {
            None
        } else {
            Some(set)
        }
    }

    /// Range sources in read order
    ///
    /// Inline ranges and the range file are combined. The built-in default
    /// file name is skipped when inline ranges are given and it does not exist.
    pub fn range_sources(&self) -> Vec<RangeSource> {
        let mut sources = Vec::new();
        let inline = self.ip_text.trim();

        if !self.ip_file.is_empty() {
            let path = PathBuf::from(&self.ip_file);
            let implicit_default = self.ip_file == defaults::DEFAULT_IP_FILE && !path.exists();
            if inline.is_empty() || !implicit_default {
                sources.push(RangeSource::File(path));
            }
        }

        if !inline.is_empty() {
            sources.push(RangeSource::Inline(inline.to_string()));
        }

        sources
    }

    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Result<()> {
        if self.routines == 0 || self.routines > defaults::MAX_ROUTINES {
            return Err(AppError::config(format!(
                "routines must be between 1 and {}, got: {}",
                defaults::MAX_ROUTINES,
                self.routines
            )));
        }

        if self.ping_times == 0 || self.ping_times > 100 {
            return Err(AppError::config(format!(
                "ping_times must be between 1 and 100, got: {}",
                self.ping_times
            )));
        }

        if self.tcp_port == 0 {
            return Err(AppError::config("tcp_port must be greater than 0"));
        }

        if !(0.0..=1.0).contains(&self.max_loss_rate) {
            return Err(AppError::config(format!(
                "max_loss_rate must be between 0 and 1, got: {}",
                self.max_loss_rate
            )));
        }

        if self.min_delay > self.max_delay {
            return Err(AppError::config(format!(
                "min_delay ({}ms) cannot exceed max_delay ({}ms)",
                self.min_delay, self.max_delay
            )));
        }

        if self.min_speed < 0.0 || !self.min_speed.is_finite() {
            return Err(AppError::config(format!(
                "min_speed must be a non-negative number, got: {}",
                self.min_speed
            )));
        }

        if self.probe_timeout_ms == Some(0) {
            return Err(AppError::config("probe_timeout_ms must be greater than 0"));
        }

        if self.httping_code != 0 && !(100..=599).contains(&self.httping_code) {
            return Err(AppError::config(format!(
                "httping_code must be a valid HTTP status code, got: {}",
                self.httping_code
            )));
        }

        for colo in self.httping_cfcolo.split(',').map(str::trim).filter(|c| !c.is_empty()) {
            if !colo.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(AppError::config(format!("Invalid region code '{}' in httping_cfcolo", colo)));
            }
        }

        let needs_url = self.httping || !self.disable_download;
        if needs_url {
            let parsed = url::Url::parse(&self.url)
                .map_err(|e| AppError::config(format!("Invalid test URL '{}': {}", self.url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::config(format!("Test URL must use http or https: {}", self.url)));
            }
            if parsed.host_str().is_none() {
                return Err(AppError::config(format!("Test URL has no host: {}", self.url)));
            }
        }

        if !self.disable_download {
            if self.test_count == 0 {
                return Err(AppError::config("test_count must be greater than 0"));
            }
            if self.download_time == 0 {
                return Err(AppError::config("download_time must be greater than 0"));
            }
        }

        if self.enable_report {
            url::Url::parse(&self.report_server_url).map_err(|e| {
                AppError::config(format!("Invalid report server URL '{}': {}", self.report_server_url, e))
            })?;
            if self.report_type.trim().is_empty() {
                return Err(AppError::config("report_type cannot be empty when reporting is enabled"));
            }
            if self.report_timeout == 0 {
                return Err(AppError::config("report_timeout must be greater than 0"));
            }
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        merge_parsed("EIO_ROUTINES", &mut self.routines)?;
        merge_parsed("EIO_PING_TIMES", &mut self.ping_times)?;
        merge_parsed("EIO_TCP_PORT", &mut self.tcp_port)?;
        merge_parsed("EIO_HTTPING", &mut self.httping)?;
        merge_parsed("EIO_HTTPING_CODE", &mut self.httping_code)?;
        merge_string("EIO_HTTPING_CFCOLO", &mut self.httping_cfcolo);
        merge_string("EIO_URL", &mut self.url);
        merge_parsed("EIO_MAX_DELAY", &mut self.max_delay)?;
        merge_parsed("EIO_MIN_DELAY", &mut self.min_delay)?;
        merge_parsed("EIO_MAX_LOSS_RATE", &mut self.max_loss_rate)?;
        merge_parsed("EIO_TEST_COUNT", &mut self.test_count)?;
        merge_parsed("EIO_DOWNLOAD_TIME", &mut self.download_time)?;
        merge_parsed("EIO_MIN_SPEED", &mut self.min_speed)?;
        merge_parsed("EIO_DISABLE_DOWNLOAD", &mut self.disable_download)?;
        merge_string("EIO_IP_FILE", &mut self.ip_file);
        merge_string("EIO_IP_TEXT", &mut self.ip_text);
        merge_parsed("EIO_TEST_ALL", &mut self.test_all)?;

        if let Ok(value) = std::env::var("EIO_PROBE_TIMEOUT_MS") {
            self.probe_timeout_ms = Some(value.parse().map_err(|e| {
                AppError::config(format!("Invalid EIO_PROBE_TIMEOUT_MS value '{}': {}", value, e))
            })?);
        }

        merge_parsed("EIO_DOWNLOAD_PARALLELISM", &mut self.download_parallelism)?;
        merge_parsed("EIO_PRINT_NUM", &mut self.print_num)?;
        merge_string("EIO_OUTPUT", &mut self.output);
        merge_parsed("EIO_ENABLE_COLOR", &mut self.enable_color)?;
        merge_parsed("EIO_ENABLE_REPORT", &mut self.enable_report)?;
        merge_string("EIO_REPORT_SERVER_URL", &mut self.report_server_url);
        merge_string("EIO_REPORT_TYPE", &mut self.report_type);
        merge_parsed("EIO_REPORT_TIMEOUT", &mut self.report_timeout)?;

        Ok(())
    }
}

fn merge_parsed<T>(key: &str, target: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    }
    Ok(())
}

fn merge_string(key: &str, target: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *target = value.trim().to_string();
    }
}
