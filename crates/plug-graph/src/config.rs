//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values for `EngineConfig`
pub mod defaults {
    /// Computed values kept in the value cache
    pub const VALUE_CACHE_CAPACITY: usize = 4096;
    /// (plug, context) hashes kept in the hash cache
    pub const HASH_CACHE_CAPACITY: usize = 16384;
    /// Nested hash/compute requests before evaluation is aborted
    pub const MAX_EVALUATION_DEPTH: usize = 1024;
    /// How often a thread blocked on an in-flight computation checks its canceller
    pub const WAIT_POLL_INTERVAL_MS: u64 = 10;
}

/// Configuration for an `Engine`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Maximum number of entries in the value cache
    pub value_cache_capacity: usize,
    /// Maximum number of entries in the per-plug hash cache
    pub hash_cache_capacity: usize,
    /// Maximum recursion depth of a single request
    pub max_evaluation_depth: usize,
    /// Wake-up interval for threads waiting on another thread's computation
    pub wait_poll_interval_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            value_cache_capacity: defaults::VALUE_CACHE_CAPACITY,
            hash_cache_capacity: defaults::HASH_CACHE_CAPACITY,
            max_evaluation_depth: defaults::MAX_EVALUATION_DEPTH,
            wait_poll_interval_ms: defaults::WAIT_POLL_INTERVAL_MS,
        }
    }
}

impl EngineConfig {
    /// Parse a (possibly partial) JSON configuration; missing fields keep
    /// their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_value_cache_capacity(mut self, capacity: usize) -> Self {
        self.value_cache_capacity = capacity;
        self
    }

    pub fn with_hash_cache_capacity(mut self, capacity: usize) -> Self {
        self.hash_cache_capacity = capacity;
        self
    }

    pub fn with_max_evaluation_depth(mut self, depth: usize) -> Self {
        self.max_evaluation_depth = depth;
        self
    }

    pub fn with_wait_poll_interval_ms(mut self, interval: u64) -> Self {
        self.wait_poll_interval_ms = interval;
        self
    }

    pub(crate) fn wait_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.wait_poll_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlugGraphError;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{ "valueCacheCapacity": 8 }"#).unwrap();
        assert_eq!(config.value_cache_capacity, 8);
        assert_eq!(config.hash_cache_capacity, defaults::HASH_CACHE_CAPACITY);
        assert_eq!(config.max_evaluation_depth, defaults::MAX_EVALUATION_DEPTH);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{ nope"),
            Err(PlugGraphError::Serialization(_))
        ));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::default()
            .with_value_cache_capacity(1)
            .with_wait_poll_interval_ms(0);
        assert_eq!(config.value_cache_capacity, 1);
        assert_eq!(config.wait_poll_interval(), std::time::Duration::from_millis(1));
    }
}
