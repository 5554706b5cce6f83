// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Gateway configuration.
//!
//! Supports both programmatic and TOML file configuration.

use crate::bus::MsgId;
use crate::client::Qos;
use crate::table::PrefixPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Largest accepted topic table.
pub const MAX_TOPICS_LIMIT: usize = 1024;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway name (for identification).
    #[serde(default = "default_name")]
    pub name: String,

    /// Message id of topic table slot 0.
    #[serde(default = "default_base_msg_id")]
    pub base_msg_id: MsgId,

    /// Topic table slots.
    #[serde(default = "default_max_topics")]
    pub max_topics: usize,

    /// Bus receive pend timeout (milliseconds).
    #[serde(default = "default_bus_pend_time_ms")]
    pub bus_pend_time_ms: u64,

    /// External client processing budget per pump cycle (milliseconds).
    #[serde(default = "default_client_yield_time_ms")]
    pub client_yield_time_ms: u64,

    /// Topic pipe name.
    #[serde(default = "default_topic_pipe_name")]
    pub topic_pipe_name: String,

    /// Topic pipe depth (messages).
    #[serde(default = "default_topic_pipe_depth")]
    pub topic_pipe_depth: usize,

    /// Inbound queue depth between client and translator (messages).
    #[serde(default = "default_inbound_queue_depth")]
    pub inbound_queue_depth: usize,

    /// Topic table file (JSON).
    #[serde(default)]
    pub topic_table: Option<PathBuf>,

    /// Tie-break for overlapping topic names.
    #[serde(default)]
    pub prefix_policy: PrefixPolicy,

    /// QoS used when publishing bus messages externally.
    #[serde(default = "default_publish_qos")]
    pub publish_qos: Qos,

    /// Statistics reporting interval (seconds, 0 to disable).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "mqtt-gw".to_string()
}

fn default_base_msg_id() -> MsgId {
    0x1F50
}

fn default_max_topics() -> usize {
    32
}

fn default_bus_pend_time_ms() -> u64 {
    1000
}

fn default_client_yield_time_ms() -> u64 {
    50
}

fn default_topic_pipe_name() -> String {
    "MQTT_GW_TOPIC_PIPE".to_string()
}

fn default_topic_pipe_depth() -> usize {
    20
}

fn default_inbound_queue_depth() -> usize {
    64
}

fn default_publish_qos() -> Qos {
    Qos::AtMostOnce
}

fn default_stats_interval() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            base_msg_id: default_base_msg_id(),
            max_topics: default_max_topics(),
            bus_pend_time_ms: default_bus_pend_time_ms(),
            client_yield_time_ms: default_client_yield_time_ms(),
            topic_pipe_name: default_topic_pipe_name(),
            topic_pipe_depth: default_topic_pipe_depth(),
            inbound_queue_depth: default_inbound_queue_depth(),
            topic_table: None,
            prefix_policy: PrefixPolicy::default(),
            publish_qos: default_publish_qos(),
            stats_interval_secs: default_stats_interval(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_topics == 0 || self.max_topics > MAX_TOPICS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_topics must be 1..={} (got {})",
                MAX_TOPICS_LIMIT, self.max_topics
            )));
        }

        // slot ids run base_msg_id ..= base_msg_id + max_topics - 1
        let last = u32::try_from(self.max_topics - 1)
            .ok()
            .and_then(|span| self.base_msg_id.checked_add(span));
        if last.is_none() {
            return Err(ConfigError::Invalid(format!(
                "base_msg_id {:#x} + max_topics {} overflows the message id range",
                self.base_msg_id, self.max_topics
            )));
        }

        if self.bus_pend_time_ms == 0 {
            return Err(ConfigError::Invalid("bus_pend_time_ms must be > 0".into()));
        }
        // a zero budget never blocks and the external pump would spin
        if self.client_yield_time_ms == 0 {
            return Err(ConfigError::Invalid(
                "client_yield_time_ms must be > 0".into(),
            ));
        }
        if self.topic_pipe_depth == 0 {
            return Err(ConfigError::Invalid("topic_pipe_depth must be > 0".into()));
        }
        if self.inbound_queue_depth == 0 {
            return Err(ConfigError::Invalid(
                "inbound_queue_depth must be > 0".into(),
            ));
        }
        if self.topic_pipe_name.is_empty() {
            return Err(ConfigError::Invalid("topic_pipe_name is empty".into()));
        }

        Ok(())
    }

    pub fn bus_pend_time(&self) -> Duration {
        Duration::from_millis(self.bus_pend_time_ms)
    }

    pub fn client_yield_time(&self) -> Duration {
        Duration::from_millis(self.client_yield_time_ms)
    }

    /// Set the table file.
    pub fn topic_table(mut self, path: impl Into<PathBuf>) -> Self {
        self.topic_table = Some(path.into());
        self
    }

    /// Set the bus pend timeout.
    pub fn pend_time(mut self, pend: Duration) -> Self {
        self.bus_pend_time_ms = pend.as_millis() as u64;
        self
    }

    /// Set the client yield budget.
    pub fn yield_time(mut self, budget: Duration) -> Self {
        self.client_yield_time_ms = budget.as_millis() as u64;
        self
    }

    /// Set the prefix tie-break policy.
    pub fn prefix_policy(mut self, policy: PrefixPolicy) -> Self {
        self.prefix_policy = policy;
        self
    }
}
