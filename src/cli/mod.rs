//! Command-line interface

use clap::Parser;
use std::path::PathBuf;

const AFTER_HELP: &str = "\
Examples:
  eio                                   Probe ranges from ip.txt over TCP port 443
  eio --ip-text 104.16.0.0/24 -p 20     Probe an inline range and print 20 rows
  eio --httping --cfcolo HKG,SJC        HTTP probing restricted to two regions
  eio --disable-download -o ''          Latency only, no CSV export
  eio -c eio.yaml --report              Load a YAML config file and report the best addresses

Configuration precedence (lowest first): defaults, YAML file (-c, or ./config.yaml when present), .env and EIO_* variables, flags.";

/// Edge IP Optimizer - find the fastest CDN edge addresses from your network
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "eio")]
#[command(version, about, long_about = None, after_help = AFTER_HELP)]
pub struct Cli {
    /// Number of concurrent probe workers (1-1000)
    #[arg(short = 'n', long)]
    pub routines: Option<usize>,

    /// Probe attempts per address
    #[arg(short = 't', long)]
    pub ping_times: Option<u32>,

    /// Port for TCP probing and downloads
    #[arg(long)]
    pub tcp_port: Option<u16>,

    /// URL used for HTTP probing and speed testing
    #[arg(long)]
    pub url: Option<String>,

    /// Probe over HTTP instead of TCP
    #[arg(long)]
    pub httping: bool,

    /// Single HTTP status code accepted by HTTP probing
    #[arg(long)]
    pub httping_code: Option<u16>,

    /// Allowed region codes for HTTP probing (comma-separated)
    #[arg(long = "cfcolo", value_name = "CODES")]
    pub cfcolo: Option<String>,

    /// Maximum average delay in milliseconds
    #[arg(long)]
    pub max_delay: Option<u64>,

    /// Minimum average delay in milliseconds
    #[arg(long)]
    pub min_delay: Option<u64>,

    /// Maximum loss rate (0.0-1.0)
    #[arg(long)]
    pub max_loss_rate: Option<f64>,

    /// Number of qualifying download results wanted
    #[arg(long)]
    pub test_count: Option<usize>,

    /// Maximum seconds per download
    #[arg(long)]
    pub download_time: Option<u64>,

    /// Minimum download speed in MB/s
    #[arg(long)]
    pub min_speed: Option<f64>,

    /// Skip the download stage
    #[arg(long)]
    pub disable_download: bool,

    /// File with one address range per line
    #[arg(short = 'f', long)]
    pub ip_file: Option<String>,

    /// Inline address ranges (comma-separated)
    #[arg(long)]
    pub ip_text: Option<String>,

    /// Probe every address of IPv4 ranges instead of one per /24
    #[arg(long)]
    pub test_all: bool,

    /// Per-attempt probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub probe_timeout: Option<u64>,

    /// Concurrent downloads (1-4)
    #[arg(long)]
    pub download_parallelism: Option<usize>,

    /// Number of rows printed to the terminal, 0 disables
    #[arg(short = 'p', long)]
    pub print_num: Option<usize>,

    /// CSV output path, empty disables export
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// YAML configuration file [default: config.yaml when it exists]
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report the best addresses to the report server
    #[arg(long)]
    pub report: bool,

    /// Report server base URL
    #[arg(long)]
    pub report_server: Option<String>,

    /// Type label sent with the report
    #[arg(long)]
    pub report_type: Option<String>,

    /// Report request timeout in seconds
    #[arg(long)]
    pub report_timeout: Option<u64>,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Print an example .env file and exit
    #[arg(long)]
    pub env_example: bool,
}

impl Cli {
    /// Validate CLI arguments for conflicts
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(rate) = self.max_loss_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(format!("--max-loss-rate must be between 0 and 1, got {}", rate));
            }
        }

        if let (Some(min), Some(max)) = (self.min_delay, self.max_delay) {
            if min > max {
                return Err(format!("--min-delay ({}) cannot exceed --max-delay ({})", min, max));
            }
        }

        if self.disable_download && (self.min_speed.is_some() || self.test_count.is_some()) {
            return Err("--min-speed and --test-count have no effect with --disable-download".to_string());
        }

        Ok(())
    }

    /// Explicit color choice, if any
    pub fn color_override(&self) -> Option<bool> {
        if self.color {
            Some(true)
        } else if self.no_color {
            Some(false)
        } else {
            None
        }
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        self.color_override().unwrap_or_else(supports_color)
    }
}

/// Check if the terminal supports colors
pub fn supports_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }

    match std::env::var("TERM") {
        Ok(term) => term != "dumb",
        Err(_) => cfg!(windows),
    }
}
