//! Configuration management for the event registry.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::types::{Amount, DEFAULT_CREATION_FEE};
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The action broadcast channel needs room for at least one action
    #[error("broadcast capacity must be greater than zero")]
    ZeroBroadcastCapacity,

    /// Notifications need a topic to be published to
    #[error("notification topic must not be empty")]
    EmptyTopic,
}

/// Registry configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Exact fee for creating an event, in smallest units
    pub creation_fee: Amount,
    /// Topic notifications are published to
    pub notification_topic: String,
    /// Capacity of the store's action broadcast channel
    pub broadcast_capacity: usize,
    /// Default `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl RegistryConfig {
    /// Load configuration from environment variables
    ///
    /// Unset or unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            creation_fee: env::var("REGISTRY_CREATION_FEE")
                .ok()
                .and_then(|s| s.trim().parse::<u128>().ok())
                .map_or(defaults.creation_fee, Amount::new),
            notification_topic: env::var("REGISTRY_NOTIFICATION_TOPIC")
                .unwrap_or(defaults.notification_topic),
            broadcast_capacity: env::var("REGISTRY_BROADCAST_CAPACITY")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.broadcast_capacity),
            log_filter: env::var("REGISTRY_LOG").unwrap_or(defaults.log_filter),
        }
    }

    /// Check values that would make the registry unusable
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero broadcast capacity or an empty topic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_capacity == 0 {
            return Err(ConfigError::ZeroBroadcastCapacity);
        }
        if self.notification_topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }
        Ok(())
    }

    /// Use a different creation fee
    #[must_use]
    pub fn with_creation_fee(mut self, creation_fee: Amount) -> Self {
        self.creation_fee = creation_fee;
        self
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            creation_fee: DEFAULT_CREATION_FEE,
            notification_topic: "registry-events".to_string(),
            broadcast_capacity: 64,
            log_filter: "info,event_registry=debug".to_string(),
        }
    }
}
