//! Structured logging for the optimizer
//!
//! This module provides:
//! - Leveled, structured log entries built with a fluent builder
//! - Console, JSON and compact output formats
//! - A per-run session id attached to every entry
//! - Stage timing and per-candidate probe loggers

use crate::error::{AppError, Result};
use crate::models::{Candidate, Config, ProbeResult, SpeedResult};
use crate::types::AttemptOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// ANSI color code for console output
    pub fn color_code(&self) -> &'static str {
        match self {
            LogLevel::Trace => "\x1b[37m",
            LogLevel::Debug => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Fatal => "\x1b[35m",
        }
    }

    pub fn reset_code() -> &'static str {
        "\x1b[0m"
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// A single structured log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Logger name/component
    pub logger: String,
    pub fields: HashMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

/// Source code location information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Human-readable console format
    Console,
    /// JSON format for log aggregators
    Json,
    /// Compact single-line format
    Compact,
}

#[derive(Debug, Default)]
struct LogContext {
    session_id: Option<String>,
    context_fields: HashMap<String, serde_json::Value>,
}

/// Rendered lines kept in memory instead of being written to stdout/stderr
pub type LogBuffer = Arc<Mutex<Vec<String>>>;

/// Logger with multiple output formats
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    use_color: bool,
    include_location: bool,
    format: LogFormat,
    name: String,
    context: Arc<RwLock<LogContext>>,
    buffer: Option<LogBuffer>,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            min_level: LogLevel::Info,
            use_color: true,
            include_location: false,
            format: LogFormat::Console,
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            buffer: None,
        }
    }

    /// Level and format follow the debug/verbose switches
    pub fn with_config(name: String, config: &Config) -> Self {
        let min_level = if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        };

        Self {
            min_level,
            use_color: config.enable_color,
            include_location: config.debug,
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            name,
            context: Arc::new(RwLock::new(LogContext::default())),
            buffer: None,
        }
    }

    /// Send rendered lines to `buffer`; clones of this logger share it
    pub fn with_buffer(mut self, buffer: LogBuffer) -> Self {
        self.buffer = Some(buffer);
        self
    }

    pub fn set_format(&mut self, format: LogFormat) {
        self.format = format;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub async fn set_session_id(&self, session_id: String) {
        let mut context = self.context.write().await;
        context.session_id = Some(session_id);
    }

    /// Add a field attached to every subsequent entry
    pub async fn add_context_field<T: Serialize>(&self, key: String, value: T) {
        if let Ok(json_value) = serde_json::to_value(value) {
            let mut context = self.context.write().await;
            context.context_fields.insert(key, json_value);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Fatal, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    /// Attach context and format an entry; `None` when below the minimum level
    async fn render(&self, mut entry: LogEntry) -> Option<(LogLevel, String)> {
        if !self.would_log(entry.level) {
            return None;
        }

        let context = self.context.read().await;
        if let Some(session_id) = &context.session_id {
            entry.fields.insert("session_id".to_string(), serde_json::Value::String(session_id.clone()));
        }
        for (key, value) in &context.context_fields {
            entry.fields.insert(key.clone(), value.clone());
        }
        drop(context);

        let output = match self.format {
            LogFormat::Console => self.format_console(&entry),
            LogFormat::Json => self.format_json(&entry),
            LogFormat::Compact => self.format_compact(&entry),
        };
        Some((entry.level, output))
    }

    async fn write_entry(&self, entry: LogEntry) {
        if let Some((level, output)) = self.render(entry).await {
            if let Some(buffer) = &self.buffer {
                if let Ok(mut lines) = buffer.lock() {
                    lines.push(output);
                }
                return;
            }
            // Warnings and errors go to stderr
            if level >= LogLevel::Warn {
                let _ = writeln!(io::stderr(), "{}", output);
            } else {
                let _ = writeln!(io::stdout(), "{}", output);
            }
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f");
        let level_str = entry.level.as_str();

        let formatted_level = if self.use_color {
            format!("{}{:>5}{}", entry.level.color_code(), level_str, LogLevel::reset_code())
        } else {
            format!("{:>5}", level_str)
        };

        let mut output = format!("{} {} [{}] {}", timestamp, formatted_level, entry.logger, entry.message);

        if !entry.fields.is_empty() {
            let mut fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            fields.sort();
            output.push_str(&format!(" {{{}}}", fields.join(", ")));
        }

        if self.include_location {
            if let Some(location) = &entry.location {
                output.push_str(&format!(" @ {}:{}", location.file, location.line));
            }
        }

        output
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        match serde_json::to_string(entry) {
            Ok(json) => json,
            Err(_) => format!(
                "{{\"error\": \"Failed to serialize log entry\", \"message\": {:?}}}",
                entry.message
            ),
        }
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        let timestamp = entry.timestamp.format("%H:%M:%S");
        format!(
            "{} {} {}: {}",
            timestamp,
            entry.level.as_str().chars().next().unwrap_or('?'),
            entry.logger,
            entry.message
        )
    }
}

/// Builder for a single log entry
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    /// Attach category and exit code of an error
    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_exit_code", error.exit_code())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Stage start/finish timing with item counts
#[derive(Debug, Clone)]
pub struct StageLogger {
    logger: Logger,
}

impl StageLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// Log the start of a stage and return its start instant
    pub async fn stage_started(&self, stage: &str, input_count: Option<u64>) -> Instant {
        self.logger
            .info(&format!("Stage started: {}", stage))
            .field("stage", stage)
            .field("input_count", input_count)
            .log()
            .await;
        Instant::now()
    }

    pub async fn stage_finished(&self, stage: &str, started: Instant, output_count: usize) {
        let elapsed = started.elapsed();
        self.logger
            .info(&format!(
                "Stage finished: {} ({} results in {:.2}s)",
                stage,
                output_count,
                elapsed.as_secs_f64()
            ))
            .field("stage", stage)
            .field("output_count", output_count)
            .field("duration_ms", duration_ms(elapsed))
            .log()
            .await;
    }

    pub async fn progress(&self, stage: &str, done: u64, total: u64) {
        self.logger
            .info(&format!("{}: {}/{}", stage, done, total))
            .field("stage", stage)
            .field("done", done)
            .field("total", total)
            .log()
            .await;
    }

    /// Collaborator failure: logged, never fatal
    pub async fn collaborator_failed(&self, collaborator: &str, error: &AppError) {
        self.logger
            .warn(&format!("{} failed: {}", collaborator, error))
            .field("collaborator", collaborator)
            .error_info(error)
            .log()
            .await;
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }
}

/// Per-attempt and per-candidate measurement events
#[derive(Debug, Clone)]
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    pub fn enabled(&self) -> bool {
        self.logger.would_log(LogLevel::Debug)
    }

    pub async fn attempt(&self, candidate: &Candidate, attempt: u32, outcome: &AttemptOutcome) {
        if !self.enabled() {
            return;
        }
        let (status, delay_ms) = match outcome {
            AttemptOutcome::Success(delay) => ("success", Some(duration_ms(*delay))),
            AttemptOutcome::Failed => ("failed", None),
            AttemptOutcome::Timeout => ("timeout", None),
            AttemptOutcome::Rejected => ("rejected", None),
        };
        self.logger
            .debug(&format!("Attempt {} to {}: {}", attempt, candidate.address, status))
            .field("address", candidate.address.to_string())
            .field("attempt", attempt)
            .field("status", status)
            .field("delay_ms", delay_ms)
            .log()
            .await;
    }

    pub async fn probed(&self, result: &ProbeResult) {
        if !self.enabled() {
            return;
        }
        self.logger
            .debug(&format!(
                "Probed {}: {}/{} received",
                result.address, result.attempts_received, result.attempts_sent
            ))
            .field("address", result.address.to_string())
            .field("sent", result.attempts_sent)
            .field("received", result.attempts_received)
            .field("loss_rate", result.loss_rate())
            .field("avg_delay_ms", result.avg_delay_ms())
            .field("colo", &result.colo)
            .log()
            .await;
    }

    pub async fn downloaded(&self, speed: &SpeedResult, qualified: bool) {
        if !self.enabled() {
            return;
        }
        self.logger
            .debug(&format!(
                "Downloaded from {}: {:.2} MB/s",
                speed.address,
                speed.throughput_mb()
            ))
            .field("address", speed.address.to_string())
            .field("bytes", speed.bytes_received)
            .field("duration_ms", duration_ms(speed.elapsed))
            .field("throughput_mb", speed.throughput_mb())
            .field("qualified", qualified)
            .log()
            .await;
    }
}

fn duration_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Creates loggers that share one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub async fn create_logger(&self, name: &str) -> Logger {
        let logger = Logger::with_config(name.to_string(), &self.config);
        logger.set_session_id(self.session_id.clone()).await;
        logger
    }

    pub async fn create_stage_logger(&self) -> StageLogger {
        StageLogger::new(self.create_logger("STAGE").await)
    }

    pub async fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::new(self.create_logger("PROBE").await)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Log with source location attached
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn entry(logger: &Logger, level: LogLevel, message: &str) -> LogEntry {
        logger.log(level, message).entry
    }

    fn debug_config() -> Config {
        let mut config = Config::default();
        config.debug = true;
        config
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("info").unwrap(), LogLevel::Info);
        assert_eq!(LogLevel::from_str("warning").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("invalid").is_err());
    }

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warn);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn test_level_from_config() {
        let mut config = Config::default();
        let logger = Logger::with_config("T".to_string(), &config);
        assert!(!logger.would_log(LogLevel::Info));
        assert!(logger.would_log(LogLevel::Warn));

        config.verbose = true;
        let logger = Logger::with_config("T".to_string(), &config);
        assert!(logger.would_log(LogLevel::Info));
        assert!(!logger.would_log(LogLevel::Debug));

        config.debug = true;
        let logger = Logger::with_config("T".to_string(), &config);
        assert!(logger.would_log(LogLevel::Debug));
        assert_eq!(logger.format, LogFormat::Json);
    }

    #[tokio::test]
    async fn test_render_filters_by_level() {
        let logger = Logger::new("TEST".to_string());
        assert!(logger.render(entry(&logger, LogLevel::Debug, "hidden")).await.is_none());
        assert!(logger.render(entry(&logger, LogLevel::Info, "shown")).await.is_some());
    }

    #[tokio::test]
    async fn test_console_format_includes_session_and_fields() {
        let mut logger = Logger::new("TEST".to_string());
        logger.set_color(false);
        logger.set_session_id("abc-123".to_string()).await;
        logger.add_context_field("run".to_string(), 7).await;

        let mut e = entry(&logger, LogLevel::Warn, "slow candidate");
        e.fields.insert("address".to_string(), serde_json::json!("1.1.1.1"));
        let (level, output) = logger.render(e).await.unwrap();

        assert_eq!(level, LogLevel::Warn);
        assert!(output.contains(" WARN [TEST] slow candidate"));
        assert!(output.contains("session_id=\"abc-123\""));
        assert!(output.contains("address=\"1.1.1.1\""));
        assert!(output.contains("run=7"));
    }

    #[tokio::test]
    async fn test_json_format_is_parseable() {
        let mut logger = Logger::new("JSON".to_string());
        logger.set_format(LogFormat::Json);

        let (_, output) = logger.render(entry(&logger, LogLevel::Error, "boom")).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["message"], "boom");
        assert_eq!(value["level"], "Error");
        assert_eq!(value["logger"], "JSON");
    }

    #[tokio::test]
    async fn test_compact_format() {
        let mut logger = Logger::new("C".to_string());
        logger.set_format(LogFormat::Compact);
        let (_, output) = logger.render(entry(&logger, LogLevel::Info, "hello")).await.unwrap();
        assert!(output.ends_with("I C: hello"));
    }

    #[tokio::test]
    async fn test_factory_shares_session_id() {
        let factory = LoggerFactory::new(Config::default());
        let a = factory.create_logger("A").await;
        let b = factory.create_logger("B").await;

        assert_eq!(a.context.read().await.session_id.as_deref(), Some(factory.session_id()));
        assert_eq!(b.context.read().await.session_id.as_deref(), Some(factory.session_id()));
    }

    #[tokio::test]
    async fn test_probe_logger_respects_level() {
        let factory = LoggerFactory::new(Config::default());
        assert!(!factory.create_probe_logger().await.enabled());

        let factory = LoggerFactory::new(debug_config());
        assert!(factory.create_probe_logger().await.enabled());
    }

    #[tokio::test]
    async fn test_buffer_captures_rendered_lines() {
        let buffer = LogBuffer::default();
        let mut logger = Logger::new("BUF".to_string()).with_buffer(buffer.clone());
        logger.set_color(false);

        logger.info("kept").field("count", 3).log().await;
        logger.debug("below level").log().await;

        let lines = buffer.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains(" INFO [BUF] kept"));
        assert!(lines[0].contains("count=3"));
    }

    #[tokio::test]
    async fn test_attempt_events_emitted_in_debug_mode() {
        let candidate = Candidate::new("10.0.0.1".parse().unwrap(), 0);

        let buffer = LogBuffer::default();
        let quiet_logger = Logger::with_config("PROBE".to_string(), &Config::default()).with_buffer(buffer.clone());
        let quiet = ProbeLogger::new(quiet_logger);
        quiet.attempt(&candidate, 1, &AttemptOutcome::Timeout).await;
        assert!(buffer.lock().unwrap().is_empty());

        let debug_logger = Logger::with_config("PROBE".to_string(), &debug_config()).with_buffer(buffer.clone());
        let probe_logger = ProbeLogger::new(debug_logger);
        probe_logger
            .attempt(&candidate, 2, &AttemptOutcome::Success(Duration::from_millis(42)))
            .await;

        let lines = buffer.lock().unwrap();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["message"], "Attempt 2 to 10.0.0.1: success");
        assert_eq!(value["fields"]["status"], "success");
        assert_eq!(value["fields"]["delay_ms"], 42.0);
    }
}
