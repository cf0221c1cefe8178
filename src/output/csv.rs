//! CSV export of ranked records

use super::ResultSink;
use crate::{
    error::{AppError, Result},
    models::ResultRecord,
};
use async_trait::async_trait;
use csv::Writer;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

pub const CSV_HEADER: [&str; 6] = ["IP", "Sent", "Received", "Loss", "AvgDelay(ms)", "Speed(MB/s)"];

/// Write the header and one row per record
pub fn write_records<W: Write>(writer: W, records: &[ResultRecord]) -> Result<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;

    for record in records {
        wtr.write_record(&[
            record.address().to_string(),
            record.attempts_sent().to_string(),
            record.attempts_received().to_string(),
            format!("{:.2}", record.loss_rate()),
            format!("{:.2}", record.avg_delay_ms()),
            format!("{:.2}", record.throughput_mb()),
        ])?;
    }

    wtr.flush()
        .map_err(|e| AppError::export(format!("Failed to flush CSV output: {}", e)))
}

/// Writes the records to a file, replacing it atomically
pub struct CsvExporter {
    path: PathBuf,
}

impl CsvExporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, records: &[ResultRecord]) -> Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let file = File::create(&tmp).map_err(|e| {
            AppError::export(format!("Failed to create {}: {}", tmp.display(), e))
        })?;
        write_records(BufWriter::new(file), records)?;

        fs::rename(&tmp, &self.path).map_err(|e| {
            AppError::export(format!("Failed to move CSV into place at {}: {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl ResultSink for CsvExporter {
    fn name(&self) -> &str {
        "csv export"
    }

    async fn deliver(&self, records: &[ResultRecord]) -> Result<()> {
        self.write_file(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, ProbeResult, SpeedResult};
    use crate::types::AttemptOutcome;
    use std::net::IpAddr;
    use std::time::Duration;

    fn record(ip: [u8; 4], delay_ms: u64, mb: Option<u64>) -> ResultRecord {
        let candidate = Candidate::new(IpAddr::from(ip), 0);
        let probe = ProbeResult::from_attempts(
            &candidate,
            &[
                AttemptOutcome::Success(Duration::from_millis(delay_ms)),
                AttemptOutcome::Success(Duration::from_millis(delay_ms)),
                AttemptOutcome::Success(Duration::from_millis(delay_ms)),
                AttemptOutcome::Timeout,
            ],
            None,
        );
        let speed = mb.map(|mb| SpeedResult::measured(candidate.address, mb * 1024 * 1024, Duration::from_secs(2)));
        ResultRecord::new(probe, speed)
    }

    #[test]
    fn test_write_records_format() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[record([1, 1, 1, 1], 42, Some(25)), record([1, 0, 0, 1], 87, None)]).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "IP,Sent,Received,Loss,AvgDelay(ms),Speed(MB/s)");
        assert_eq!(lines[1], "1.1.1.1,4,3,0.25,42.00,12.50");
        assert_eq!(lines[2], "1.0.0.1,4,3,0.25,87.00,0.00");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_header_only_when_empty() {
        let mut buffer = Vec::new();
        write_records(&mut buffer, &[]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap().trim(), CSV_HEADER.join(","));
    }

    #[tokio::test]
    async fn test_exporter_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.csv");
        let exporter = CsvExporter::new(&path);

        exporter.deliver(&[record([8, 8, 8, 8], 10, Some(1))]).await.unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("IP,Sent"));
        assert!(content.contains("8.8.8.8,4,3"));
        assert!(!dir.path().join("result.csv.tmp").exists());
    }

    #[tokio::test]
    async fn test_exporter_reports_export_error() {
        let exporter = CsvExporter::new("/nonexistent-dir/result.csv");
        let err = exporter.deliver(&[]).await.unwrap_err();
        assert!(matches!(err, AppError::Export(_)));
        assert!(err.is_collaborator_failure());
    }
}
