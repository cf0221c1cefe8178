//! Configuration parsing from a config file, environment variables and CLI arguments

use crate::{cli::Cli, config::env::EnvManager, defaults, error::Result, models::Config};
use std::path::{Path, PathBuf};

/// Configuration parser that layers every configuration source
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        // Defaults, or a YAML file whose missing keys take the defaults
        let mut config = match self.config_path() {
            Some(path) => {
                if self.cli.debug {
                    eprintln!("Loading configuration file {}", path.display());
                }
                Config::from_yaml_file(&path)?
            }
            None => Config::default(),
        };

        self.load_env_file()?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Explicit `-c` path, else the default file when it exists
    fn config_path(&self) -> Option<PathBuf> {
        self.cli.config.clone().or_else(|| {
            let default = Path::new(defaults::DEFAULT_CONFIG_FILE);
            default.exists().then(|| default.to_path_buf())
        })
    }

    fn load_env_file(&self) -> Result<()> {
        EnvManager::load_env_file(self.cli.debug)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        override_with(&mut config.routines, cli.routines);
        override_with(&mut config.ping_times, cli.ping_times);
        override_with(&mut config.tcp_port, cli.tcp_port);
        override_with(&mut config.url, cli.url.clone());
        override_with(&mut config.httping_code, cli.httping_code);
        override_with(&mut config.httping_cfcolo, cli.cfcolo.clone());
        override_with(&mut config.max_delay, cli.max_delay);
        override_with(&mut config.min_delay, cli.min_delay);
        override_with(&mut config.max_loss_rate, cli.max_loss_rate);
        override_with(&mut config.test_count, cli.test_count);
        override_with(&mut config.download_time, cli.download_time);
        override_with(&mut config.min_speed, cli.min_speed);
        override_with(&mut config.ip_file, cli.ip_file.clone());
        override_with(&mut config.ip_text, cli.ip_text.clone());
        override_with(&mut config.download_parallelism, cli.download_parallelism);
        override_with(&mut config.print_num, cli.print_num);
        override_with(&mut config.output, cli.output.clone());
        override_with(&mut config.report_server_url, cli.report_server.clone());
        override_with(&mut config.report_type, cli.report_type.clone());
        override_with(&mut config.report_timeout, cli.report_timeout);
        match cli.color_override() {
            Some(enabled) => config.enable_color = enabled,
            None if !crate::cli::supports_color() => config.enable_color = false,
            None => {}
        }

        if cli.probe_timeout.is_some() {
            config.probe_timeout_ms = cli.probe_timeout;
        }

        // Switches only ever turn a feature on
        config.httping |= cli.httping;
        config.disable_download |= cli.disable_download;
        config.test_all |= cli.test_all;
        config.enable_report |= cli.report;
        config.verbose |= cli.verbose;
        config.debug |= cli.debug;

        if config.debug {
            eprintln!("Applied CLI overrides to configuration");
            eprintln!("{}", display_config_summary(config));
        }
    }
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    let sources: Vec<String> = config
        .range_sources()
        .iter()
        .map(|s| s.to_string())
        .collect();
    summary.push(format!("Ranges: {}", if sources.is_empty() { "none".to_string() } else { sources.join(", ") }));
    summary.push(format!(
        "Probe: {} x{} attempts, {} workers, timeout {}ms",
        config.probe_mode().name(),
        config.ping_times,
        config.effective_routines(),
        config.probe_timeout().as_millis()
    ));
    summary.push(format!(
        "Thresholds: delay {}-{}ms, loss <= {:.2}",
        config.min_delay, config.max_delay, config.max_loss_rate
    ));
    if config.disable_download {
        summary.push("Download: disabled".to_string());
    } else {
        summary.push(format!(
            "Download: {} results >= {:.2} MB/s, {}s each, parallelism {}",
            config.test_count,
            config.min_speed,
            config.download_time,
            config.effective_download_parallelism()
        ));
    }
    summary.push(format!("URL: {}", config.url));
    summary.push(format!(
        "Output: {} (print {})",
        if config.output.is_empty() { "disabled" } else { config.output.as_str() },
        config.print_num
    ));
    if config.enable_report {
        summary.push(format!("Report: {} ({})", config.report_server_url, config.report_type));
    }
    summary.push(format!("Color Output: {}", config.enable_color));

    summary.join("\n")
}
