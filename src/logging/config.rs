//! Logging configuration
//!
//! Per-component log levels and output destinations for the alignment service.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Global log level (trace, debug, info, warn, error)
    pub global_level: String,

    /// Level for the registration algorithms
    pub algorithm_level: String,

    /// Level for the exchange server and wire codecs
    pub transport_level: String,

    /// Enable console output
    pub console_output: bool,

    /// Directory for daily-rolled log files (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file location in logs
    pub include_file_location: bool,

    /// Emit console lines as JSON
    pub json_console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            algorithm_level: "info".to_string(),
            transport_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            json_console: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose configuration for local debugging
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            algorithm_level: "trace".to_string(),
            transport_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            json_console: false,
        }
    }

    /// Configuration for the long-running exchange server
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            algorithm_level: "info".to_string(),
            transport_level: "info".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/profile-alignment")),
            include_file_location: false,
            json_console: true,
        }
    }

    /// Map a `-v` count onto the global level
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        let level = match verbose {
            0 => return self,
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        self.global_level = level.to_string();
        self.algorithm_level = level.to_string();
        self.transport_level = level.to_string();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, level) in [
            ("global_level", &self.global_level),
            ("algorithm_level", &self.algorithm_level),
            ("transport_level", &self.transport_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    name, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Effective level for a component
    pub fn get_component_level(&self, component: &str) -> &str {
        match component {
            "algorithm" | "algorithms" => &self.algorithm_level,
            "transport" | "server" => &self.transport_level,
            _ => &self.global_level,
        }
    }

    /// `EnvFilter` directive string built from the configured levels
    pub fn filter_directives(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        let mut directives = vec![format!("{}={}", krate, self.global_level)];
        for module in ["algorithms", "transport"] {
            directives.push(format!("{}::{}={}", krate, module, self.get_component_level(module)));
        }
        directives.join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.global_level, "info");
        assert!(config.console_output);
        assert!(config.log_directory.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        let mut config = LoggingConfig::default();
        config.transport_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_verbosity_overrides_levels() {
        let config = LoggingConfig::default().with_verbosity(2);
        assert_eq!(config.get_component_level("algorithm"), "debug");
        assert_eq!(config.get_component_level("server"), "debug");

        let untouched = LoggingConfig::production().with_verbosity(0);
        assert_eq!(untouched.global_level, "warn");
    }

    #[test]
    fn test_filter_directives_name_modules() {
        let directives = LoggingConfig::development().filter_directives();
        assert!(directives.starts_with("profile_alignment=debug"));
        assert!(directives.contains("profile_alignment::algorithms=trace"));
    }
}
