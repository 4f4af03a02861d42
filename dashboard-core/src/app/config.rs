//! Configuration Management

use crate::pipeline::{ClassCountPolicy, PipelineSettings};
use crate::transport::DEFAULT_CAPACITY;
use crate::usecase::{presets, UseCaseConfig, UseCaseRegistry};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Connection settings
    #[serde(default)]
    pub transport: TransportConfig,
    /// Smoothing engine settings
    #[serde(default)]
    pub smoothing: SmoothingConfig,
    /// Aggregator settings
    #[serde(default)]
    pub aggregation: AggregationConfig,
    /// Session defaults
    #[serde(default)]
    pub session: SessionConfig,
    /// User-defined use cases, merged with the built-ins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub use_cases: Vec<UseCaseConfig>,
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// WebSocket endpoint of the telemetry backend
    pub endpoint: String,
    /// Send `{"useCase": ..}` once the socket is open
    pub send_handshake: bool,
    /// Inbound queue size (power of 2)
    pub queue_capacity: usize,
}

/// Smoothing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Number of raw samples kept in the window
    pub window: usize,
    /// EMA weight of the newest sample
    pub alpha: f64,
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Maximum event log entries (0 = unbounded)
    pub event_log_capacity: usize,
    /// Metric readings kept for the trend chart
    pub trend_capacity: usize,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Use case selected at startup
    pub use_case: String,
    /// Handling of probability vectors with an unexpected length
    pub class_count_policy: ClassCountPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8000/ws".to_string(),
            send_handshake: true,
            queue_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            window: 15,
            alpha: 0.05,
        }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            event_log_capacity: 0,
            trend_capacity: 120,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            use_case: presets::OCCUPANCY.to_string(),
            class_count_policy: ClassCountPolicy::Strict,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        let endpoint = self.transport.endpoint.trim();
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(crate::Error::Config(format!(
                "endpoint must be a ws:// or wss:// URL, got '{}'",
                self.transport.endpoint
            )));
        }
        if !self.transport.queue_capacity.is_power_of_two() {
            return Err(crate::Error::Config(format!(
                "queue_capacity must be a power of 2, got {}",
                self.transport.queue_capacity
            )));
        }
        self.pipeline_settings().validate()?;
        if self.session.use_case.trim().is_empty() {
            return Err(crate::Error::Config("use_case must not be empty".to_string()));
        }
        self.registry()?.require(&self.session.use_case)?;
        Ok(())
    }

    /// Built-in use cases merged with the configured ones
    pub fn registry(&self) -> Result<UseCaseRegistry, crate::Error> {
        UseCaseRegistry::with_custom(&self.use_cases)
    }

    /// Pipeline tunables derived from this config
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            smoothing_window: self.smoothing.window,
            smoothing_alpha: self.smoothing.alpha,
            event_log_capacity: match self.aggregation.event_log_capacity {
                0 => None,
                n => Some(n),
            },
            trend_capacity: self.aggregation.trend_capacity,
            class_count_policy: self.session.class_count_policy,
        }
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".radar_dashboard").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Look up a value by dotted key (e.g. "smoothing.alpha")
    pub fn get_value(&self, key: &str) -> Result<String, crate::Error> {
        let root = self.to_value()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current
                .get(part)
                .ok_or_else(|| crate::Error::Config(format!("key '{}' not found", key)))?;
        }
        Ok(match current {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Set a scalar value by dotted key, keeping its type
    ///
    /// The updated config is validated before it replaces `self`.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), crate::Error> {
        let not_found = || crate::Error::Config(format!("key '{}' not found", key));
        let (section, leaf) = key.rsplit_once('.').ok_or_else(not_found)?;

        let mut root = self.to_value()?;
        let mut current = &mut root;
        for part in section.split('.') {
            current = current.get_mut(part).ok_or_else(not_found)?;
        }
        let table = current.as_table_mut().ok_or_else(not_found)?;
        let existing = table.get(leaf).ok_or_else(not_found)?;
        let parsed = parse_like(existing, value).map_err(|reason| {
            crate::Error::Config(format!("invalid value '{}' for {}: {}", value, key, reason))
        })?;
        table.insert(leaf.to_string(), parsed);

        let updated: Config = root
            .try_into()
            .map_err(|e: toml::de::Error| crate::Error::Config(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    fn to_value(&self) -> Result<toml::Value, crate::Error> {
        toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))
    }
}

/// Parse `raw` as the same TOML type as `existing`
fn parse_like(existing: &toml::Value, raw: &str) -> Result<toml::Value, String> {
    match existing {
        toml::Value::String(_) => Ok(toml::Value::String(raw.to_string())),
        toml::Value::Integer(_) => raw
            .parse::<i64>()
            .map(toml::Value::Integer)
            .map_err(|e| e.to_string()),
        toml::Value::Float(_) => raw
            .parse::<f64>()
            .map(toml::Value::Float)
            .map_err(|e| e.to_string()),
        toml::Value::Boolean(_) => raw
            .parse::<bool>()
            .map(toml::Value::Boolean)
            .map_err(|e| e.to_string()),
        _ => Err("only scalar values can be set".to_string()),
    }
}
