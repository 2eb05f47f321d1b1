use std::path::PathBuf;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::pipeline::producer::{OverflowPolicy, DEFAULT_BUFFER_CAPACITY};

pub const ENV_PREFIX: &str = "MULTIBINDER_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub producer: ProducerConfig,
    pub bindings: BindingsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    pub buffer_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            overflow: OverflowPolicy::FailFast,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingsConfig {
    pub text_topic: String,
    pub length_topic: String,
    pub topic_capacity: usize,
    /// Deliveries per record at the sink, first one included.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for BindingsConfig {
    fn default() -> Self {
        Self {
            text_topic: "text".to_string(),
            length_topic: "length".to_string(),
            topic_capacity: 64,
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl AppConfig {
    /// Defaults, then the YAML file if given, then `MULTIBINDER_*` env vars
    /// (`__` separates sections, e.g. `MULTIBINDER_PRODUCER__BUFFER_CAPACITY`).
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: AppConfig = figment
            .extract()
            .map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.producer.buffer_capacity == 0 {
            return Err(ConfigError::Invalid("producer.buffer_capacity must be > 0".to_string()));
        }
        if self.bindings.topic_capacity == 0 {
            return Err(ConfigError::Invalid("bindings.topic_capacity must be > 0".to_string()));
        }
        if self.bindings.max_attempts == 0 {
            return Err(ConfigError::Invalid("bindings.max_attempts must be > 0".to_string()));
        }
        if self.bindings.text_topic.is_empty() || self.bindings.length_topic.is_empty() {
            return Err(ConfigError::Invalid("topic names must not be empty".to_string()));
        }
        if self.bindings.text_topic == self.bindings.length_topic {
            return Err(ConfigError::Invalid(format!(
                "text and length topics must differ (both '{}')",
                self.bindings.text_topic
            )));
        }
        Ok(())
    }
}
