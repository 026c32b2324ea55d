// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use modem_stats::http::MODEM_TIMEOUT;
use modem_stats::logs::loki::with_default_labels;
use modem_stats::modems::ModemKind;

use crate::error::ConfigError;

const DEFAULT_PORT: u16 = 9000;
const DEFAULT_LOKI_INTERVAL: Duration = Duration::from_secs(60);
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Exporter configuration, read once from the environment at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExporterConfig {
    /// Modem model to poll
    pub modem: ModemKind,
    /// Modem address; the model's default address when unset
    pub modem_ip: Option<String>,
    /// Port serving `/metrics` and `/health`
    pub port: u16,
    /// Timeout applied to every modem request
    pub modem_timeout: Duration,
    /// Loki push endpoint; log shipping is disabled when unset
    pub loki_url: Option<String>,
    /// Labels attached to every pushed stream, `job` included
    pub loki_labels: BTreeMap<String, String>,
    /// Time between log shipping cycles
    pub loki_interval: Duration,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            modem: ModemKind::Superhub5,
            modem_ip: None,
            port: DEFAULT_PORT,
            modem_timeout: MODEM_TIMEOUT,
            loki_url: None,
            loki_labels: with_default_labels(BTreeMap::new()),
            loki_interval: DEFAULT_LOKI_INTERVAL,
            log_level: "info".to_string(),
        }
    }
}

impl ExporterConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let modem = match non_empty_var("MODEM_STATS_MODEM") {
            Some(value) => value.parse::<ModemKind>().map_err(ConfigError::InvalidConfig)?,
            None => ModemKind::Superhub5,
        };
        let modem_ip = non_empty_var("MODEM_STATS_MODEM_IP");
        let port = parse_var("MODEM_STATS_PORT", DEFAULT_PORT)?;
        let modem_timeout = Duration::from_secs(parse_var(
            "MODEM_STATS_TIMEOUT_SECS",
            MODEM_TIMEOUT.as_secs(),
        )?);
        let loki_url = non_empty_var("MODEM_STATS_LOKI_URL");
        let loki_labels = with_default_labels(parse_labels(
            &env::var("MODEM_STATS_LOKI_LABELS").unwrap_or_default(),
        )?);
        let loki_interval = Duration::from_secs(parse_var(
            "MODEM_STATS_LOKI_INTERVAL_SECS",
            DEFAULT_LOKI_INTERVAL.as_secs(),
        )?);
        let log_level = env::var("MODEM_STATS_LOG_LEVEL")
            .map(|val| val.to_lowercase())
            .unwrap_or_else(|_| "info".to_string());

        let config = Self {
            modem,
            modem_ip,
            port,
            modem_timeout,
            loki_url,
            loki_labels,
            loki_interval,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "Port must be greater than 0".to_string(),
            ));
        }

        if self.modem_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Modem timeout must be greater than 0".to_string(),
            ));
        }

        if self.loki_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Loki interval must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.loki_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidConfig(format!(
                    "Loki URL '{url}' must start with http:// or https://"
                )));
            }
        }

        if !VALID_LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }
}

/// Parses `k=v,k=v`. Blank segments are ignored, keys and values are trimmed.
pub fn parse_labels(raw: &str) -> Result<BTreeMap<String, String>, ConfigError> {
    let mut labels = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ConfigError::InvalidValue {
                var: "MODEM_STATS_LOKI_LABELS",
                value: pair.to_string(),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidValue {
                var: "MODEM_STATS_LOKI_LABELS",
                value: pair.to_string(),
            });
        }
        labels.insert(key.to_string(), value.trim().to_string());
    }
    Ok(labels)
}

fn non_empty_var(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

fn parse_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match non_empty_var(var) {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}
