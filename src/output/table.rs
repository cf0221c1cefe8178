//! Terminal table of the best records

use super::ResultSink;
use crate::{error::Result, models::ResultRecord};
use async_trait::async_trait;
use colored::*;
use std::fmt::Write as _;

/// Delay classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayLevel {
    Excellent,  // < 50ms
    Good,       // 50-100ms
    Fair,       // 100-300ms
    Poor,       // 300-1000ms
    VeryPoor,   // > 1000ms
}

impl DelayLevel {
    pub fn from_delay_ms(delay_ms: f64) -> Self {
        if delay_ms < 50.0 {
            Self::Excellent
        } else if delay_ms < 100.0 {
            Self::Good
        } else if delay_ms < 300.0 {
            Self::Fair
        } else if delay_ms < 1000.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }
}

const HEADERS: [&str; 6] = ["IP", "Sent", "Received", "Loss", "AvgDelay(ms)", "Speed(MB/s)"];
const COLUMN_PADDING: usize = 2;

/// Renders the first `print_num` records as an aligned table
#[derive(Debug, Clone)]
pub struct TableRenderer {
    print_num: usize,
    use_color: bool,
}

impl TableRenderer {
    pub fn new(print_num: usize, use_color: bool) -> Self {
        Self { print_num, use_color }
    }

    pub fn print_num(&self) -> usize {
        self.print_num
    }

    pub fn render(&self, records: &[ResultRecord]) -> String {
        if records.is_empty() {
            let message = "No addresses satisfied the configured thresholds.";
            return if self.use_color {
                format!("{}\n", message.yellow())
            } else {
                format!("{}\n", message)
            };
        }

        let rows: Vec<[String; 6]> = records
            .iter()
            .take(self.print_num)
            .map(|record| {
                [
                    record.address().to_string(),
                    record.attempts_sent().to_string(),
                    record.attempts_received().to_string(),
                    format!("{:.2}", record.loss_rate()),
                    format!("{:.2}", record.avg_delay_ms()),
                    format!("{:.2}", record.throughput_mb()),
                ]
            })
            .collect();

        let mut widths = HEADERS.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }

        let mut output = String::new();
        let header_line = pad_row(&HEADERS.map(String::from), &widths);
        if self.use_color {
            let _ = writeln!(output, "{}", header_line.bold().blue());
        } else {
            let _ = writeln!(output, "{}", header_line);
        }

        for (record, row) in records.iter().zip(rows.iter()) {
            if !self.use_color {
                let _ = writeln!(output, "{}", pad_row(row, &widths));
                continue;
            }

            // pad before colorizing so escape codes do not skew the widths
            let cells: Vec<String> = row
                .iter()
                .zip(widths.iter())
                .enumerate()
                .map(|(i, (cell, width))| {
                    let padded = format!("{:<w$}", cell, w = width + COLUMN_PADDING);
                    match i {
                        4 => padded
                            .color(DelayLevel::from_delay_ms(record.avg_delay_ms()).color())
                            .to_string(),
                        5 if record.speed.is_some() => padded.bold().to_string(),
                        _ => padded,
                    }
                })
                .collect();
            let _ = writeln!(output, "{}", cells.concat().trim_end());
        }

        output
    }
}

fn pad_row(row: &[String; 6], widths: &[usize; 6]) -> String {
    row.iter()
        .zip(widths.iter())
        .map(|(cell, width)| format!("{:<w$}", cell, w = width + COLUMN_PADDING))
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[async_trait]
impl ResultSink for TableRenderer {
    fn name(&self) -> &str {
        "table"
    }

    async fn deliver(&self, records: &[ResultRecord]) -> Result<()> {
        if self.print_num == 0 {
            return Ok(());
        }
        print!("{}", self.render(records));
        Ok(())
    }
}
