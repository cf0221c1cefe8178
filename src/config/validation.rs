//! Configuration validation rules beyond hard errors

use crate::{defaults, error::Result, models::Config, types::ProbeMode};
use colored::*;

/// Validator that reports risky but legal settings
pub struct ConfigValidator;

impl ConfigValidator {
    /// Run hard validation, then collect warnings
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_thresholds(config));
        warnings.extend(Self::validate_probe_settings(config));
        warnings.extend(Self::validate_download_settings(config));
        Ok(warnings)
    }

    fn validate_thresholds(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.min_speed > 0.0 && config.max_delay == defaults::DEFAULT_MAX_DELAY_MS && !config.disable_download {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "min_speed is set while max_delay is left at its default; the download stage may test many slow addresses and run for a long time".to_string(),
            ));
        }

        if config.max_loss_rate == 0.0 && config.ping_times > 10 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "max_loss_rate of 0 with {} attempts per address rejects any address that drops a single attempt",
                    config.ping_times
                ),
            ));
        }

        warnings
    }

    fn validate_probe_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.routines > 500 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("{} probe workers may exhaust local sockets or trip rate limits", config.routines),
            ));
        }

        if config.probe_mode() == ProbeMode::Tcp && !config.httping_cfcolo.trim().is_empty() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "Region filter is only applied in HTTP probe mode and is ignored for TCP probing".to_string(),
            ));
        }

        if config.probe_mode() == ProbeMode::Tcp && config.httping_code != 0 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                "httping_code is only applied in HTTP probe mode".to_string(),
            ));
        }

        if config.test_all {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Probing every address in each range; large ranges take much longer".to_string(),
            ));
        }

        warnings
    }

    fn validate_download_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();

        if config.disable_download {
            return warnings;
        }

        if config.url == defaults::DEFAULT_URL {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Using the built-in speed test URL; set url to a large file you control for stable results".to_string(),
            ));
        }

        if config.download_parallelism > defaults::MAX_DOWNLOAD_PARALLELISM {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "download_parallelism {} is capped at {}",
                    config.download_parallelism,
                    defaults::MAX_DOWNLOAD_PARALLELISM
                ),
            ));
        } else if config.download_parallelism > 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "Concurrent downloads share local bandwidth, so measured speeds are lower".to_string(),
            ));
        }

        warnings
    }
}

/// Validation level for warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
}

impl ValidationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Info => Color::Blue,
            Self::Warning => Color::Yellow,
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if use_color {
            format!("{} {}", tag.color(self.level.color()), self.message)
        } else {
            format!("{} {}", tag, self.message)
        }
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_warning_format() {
        let warning = ValidationWarning::new(ValidationLevel::Warning, "Test warning message".to_string());
        let formatted = warning.format(false);
        assert_eq!(formatted, "[WARNING] Test warning message");
    }

    #[test]
    fn test_validation_levels() {
        assert_eq!(ValidationLevel::Info.as_str(), "INFO");
        assert_eq!(ValidationLevel::Warning.as_str(), "WARNING");
        assert_eq!(ValidationLevel::Warning.color(), Color::Yellow);
    }

    #[test]
    fn test_min_speed_with_default_max_delay() {
        let mut config = Config::default();
        config.min_speed = 5.0;

        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("min_speed")));

        config.max_delay = 250;
        let warnings = validate_config(&config).unwrap();
        assert!(!warnings.iter().any(|w| w.message.contains("min_speed")));
    }

    #[test]
    fn test_region_filter_ignored_for_tcp() {
        let mut config = Config::default();
        config.httping_cfcolo = "HKG".to_string();
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("Region filter")));

        config.httping = true;
        let warnings = validate_config(&config).unwrap();
        assert!(!warnings.iter().any(|w| w.message.contains("Region filter")));
    }

    #[test]
    fn test_parallelism_warnings() {
        let mut config = Config::default();
        config.download_parallelism = 9;
        let warnings = validate_config(&config).unwrap();
        assert!(warnings.iter().any(|w| w.message.contains("capped")));

        config.disable_download = true;
        let warnings = validate_config(&config).unwrap();
        assert!(!warnings.iter().any(|w| w.message.contains("capped")));
    }

    #[test]
    fn test_hard_errors_propagate() {
        let mut config = Config::default();
        config.routines = 0;
        assert!(validate_config(&config).is_err());
    }
}
