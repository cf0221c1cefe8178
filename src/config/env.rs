//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    /// Load the given env file if it exists; existing variables win
    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Edge IP Optimizer Configuration
#
# Values here act as defaults and can be overridden by command-line flags.

# Probe workers (1-1000) and attempts per address
# EIO_ROUTINES=200
# EIO_PING_TIMES=4

# Port for TCP probing and downloads
# EIO_TCP_PORT=443

# HTTP probing instead of TCP, accepted status and allowed regions
# EIO_HTTPING=false
# EIO_HTTPING_CODE=200
# EIO_HTTPING_CFCOLO=HKG,SJC

# URL used for HTTP probing and speed testing
# EIO_URL=https://cf.xiu2.xyz/url

# Latency and loss thresholds (milliseconds, ratio)
# EIO_MAX_DELAY=9999
# EIO_MIN_DELAY=0
# EIO_MAX_LOSS_RATE=1.0

# Download stage
# EIO_TEST_COUNT=10
# EIO_DOWNLOAD_TIME=10
# EIO_MIN_SPEED=0
# EIO_DISABLE_DOWNLOAD=false
# EIO_DOWNLOAD_PARALLELISM=1

# Address ranges
# EIO_IP_FILE=ip.txt
# EIO_IP_TEXT=104.16.0.0/24,2606:4700::/48
# EIO_TEST_ALL=false

# Output
# EIO_PRINT_NUM=10
# EIO_OUTPUT=result.csv
# EIO_ENABLE_COLOR=true

# Reporting
# EIO_ENABLE_REPORT=false
# EIO_REPORT_SERVER_URL=http://127.0.0.1:15920
# EIO_REPORT_TYPE=cloudflare
# EIO_REPORT_TIMEOUT=10
"#
        .to_string()
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("EIO_ROUTINES", "Concurrent probe workers (1-1000)", "200"),
            ("EIO_PING_TIMES", "Probe attempts per address (1-100)", "4"),
            ("EIO_TCP_PORT", "Port for probing and downloads", "443"),
            ("EIO_HTTPING", "Probe over HTTP", "false"),
            ("EIO_HTTPING_CODE", "Accepted HTTP status code", "200"),
            ("EIO_HTTPING_CFCOLO", "Allowed region codes", "HKG,SJC"),
            ("EIO_URL", "Probe and speed test URL", "https://cf.xiu2.xyz/url"),
            ("EIO_MAX_DELAY", "Maximum average delay (ms)", "9999"),
            ("EIO_MIN_DELAY", "Minimum average delay (ms)", "0"),
            ("EIO_MAX_LOSS_RATE", "Maximum loss rate (0-1)", "1.0"),
            ("EIO_TEST_COUNT", "Qualifying downloads wanted", "10"),
            ("EIO_DOWNLOAD_TIME", "Seconds per download", "10"),
            ("EIO_MIN_SPEED", "Minimum speed (MB/s)", "0"),
            ("EIO_DISABLE_DOWNLOAD", "Skip the download stage", "false"),
            ("EIO_IP_FILE", "Range file path", "ip.txt"),
            ("EIO_IP_TEXT", "Inline ranges", "104.16.0.0/24"),
            ("EIO_TEST_ALL", "Probe every IPv4 address", "false"),
            ("EIO_PROBE_TIMEOUT_MS", "Per-attempt probe timeout (ms)", "1000"),
            ("EIO_DOWNLOAD_PARALLELISM", "Concurrent downloads (1-4)", "1"),
            ("EIO_PRINT_NUM", "Rows printed, 0 disables", "10"),
            ("EIO_OUTPUT", "CSV path, empty disables", "result.csv"),
            ("EIO_ENABLE_COLOR", "Enable colored output", "true"),
            ("EIO_ENABLE_REPORT", "Report the best addresses", "false"),
            ("EIO_REPORT_SERVER_URL", "Report server base URL", "http://127.0.0.1:15920"),
            ("EIO_REPORT_TYPE", "Report type label", "cloudflare"),
            ("EIO_REPORT_TIMEOUT", "Report timeout (s)", "10"),
        ]
    }
}
