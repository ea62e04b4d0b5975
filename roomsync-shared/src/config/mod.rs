//! Layered configuration: defaults, then an optional YAML/JSON file, then
//! `ROOMSYNC_*` environment overrides.

use std::time::Duration;
use std::{env, fs, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::SlaThresholds;

/// SLA escalation windows, expressed in seconds for the file format.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SlaConfig {
    /// Unread younger than this many seconds is `fresh`.
    pub fresh_window_secs: u64,
    /// Unread younger than this many seconds is `warn`; older is `breach`.
    pub warn_window_secs: u64,
}

impl SlaConfig {
    /// The duration form consumed by the classifier.
    #[must_use]
    pub fn thresholds(&self) -> SlaThresholds {
        SlaThresholds {
            fresh_window: Duration::from_secs(self.fresh_window_secs),
            warn_window: Duration::from_secs(self.warn_window_secs),
        }
    }
}

/// Retention policy for the notification idempotency ledger.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Processed-message ids kept per scope; oldest entries are evicted
    /// first. The trigger infrastructure only redelivers recent invocations,
    /// so a small window suffices.
    pub max_entries_per_scope: usize,
}

/// The main configuration structure for the roomsync core.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Logging level.
    pub log_level: String,

    /// Maximum number of messages a live subscription holds per query.
    pub subscription_window: usize,

    /// SLA escalation windows.
    pub sla: SlaConfig,

    /// Idempotency ledger retention.
    pub ledger: LedgerConfig,
}

impl Config {
    /// Generates a default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            log_level: "info".to_string(),
            subscription_window: 500,
            sla: SlaConfig {
                fresh_window_secs: 5 * 60,
                warn_window_secs: 15 * 60,
            },
            ledger: LedgerConfig {
                max_entries_per_scope: 64,
            },
        }
    }

    /// Loads the configuration from a file, environment variables, or
    /// defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a YAML or JSON configuration file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, when an
    /// environment override is malformed, or when the resolved configuration
    /// fails validation.
    pub fn load_config(config_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Config::with_defaults();

        // Load from file if provided
        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            let file_config: Config = match path.extension().and_then(|ext| ext.to_str()) {
                Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                Some("json") => serde_json::from_str(&content)?,
                _ => {
                    return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into());
                }
            };
            config = file_config;
        }

        // Use environment variables only if values are not already set
        let defaults = Config::with_defaults();
        if config.log_level == defaults.log_level {
            if let Ok(log_level) = env::var("ROOMSYNC_LOG_LEVEL") {
                config.log_level = log_level;
            }
        }
        if config.subscription_window == defaults.subscription_window {
            if let Ok(window) = env::var("ROOMSYNC_SUBSCRIPTION_WINDOW") {
                config.subscription_window = window
                    .parse()
                    .map_err(|_| "Invalid ROOMSYNC_SUBSCRIPTION_WINDOW value: must be a positive integer")?;
            }
        }
        if config.sla.fresh_window_secs == defaults.sla.fresh_window_secs {
            if let Ok(secs) = env::var("ROOMSYNC_SLA_FRESH_SECS") {
                config.sla.fresh_window_secs = secs
                    .parse()
                    .map_err(|_| "Invalid ROOMSYNC_SLA_FRESH_SECS value: must be a number of seconds")?;
            }
        }
        if config.sla.warn_window_secs == defaults.sla.warn_window_secs {
            if let Ok(secs) = env::var("ROOMSYNC_SLA_WARN_SECS") {
                config.sla.warn_window_secs = secs
                    .parse()
                    .map_err(|_| "Invalid ROOMSYNC_SLA_WARN_SECS value: must be a number of seconds")?;
            }
        }
        if config.ledger.max_entries_per_scope == defaults.ledger.max_entries_per_scope {
            if let Ok(max) = env::var("ROOMSYNC_LEDGER_MAX_ENTRIES") {
                config.ledger.max_entries_per_scope = max
                    .parse()
                    .map_err(|_| "Invalid ROOMSYNC_LEDGER_MAX_ENTRIES value: must be a positive integer")?;
            }
        }

        if let Err(errors) = config.validate() {
            return Err(errors.join("; ").into());
        }

        Ok(config)
    }

    /// Validate the complete configuration.
    ///
    /// # Errors
    /// Returns every validation failure found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.subscription_window == 0 {
            errors.push("Invalid subscription window. Must be greater than 0.".to_string());
        }
        if self.sla.fresh_window_secs == 0 {
            errors.push("Invalid SLA fresh window. Must be greater than 0.".to_string());
        }
        if self.sla.warn_window_secs <= self.sla.fresh_window_secs {
            errors.push(format!(
                "Invalid SLA windows: warn ({}) must exceed fresh ({}).",
                self.sla.warn_window_secs, self.sla.fresh_window_secs
            ));
        }
        if self.ledger.max_entries_per_scope == 0 {
            errors.push("Invalid ledger retention. Must keep at least 1 entry per scope.".to_string());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
