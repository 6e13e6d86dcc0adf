//! Cursor configuration

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Configuration for a cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Initial capacity of each per-column cache queue, in rows
    pub initial_cache_capacity: usize,

    /// Whether to synchronize the cursor's stream after every fill that
    /// dispatched work onto it
    pub synchronize_streams: bool,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            initial_cache_capacity: 8,
            synchronize_streams: true,
        }
    }
}

impl CursorConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CursorConfig::from_json(r#"{ "initial_cache_capacity": 64 }"#).unwrap();
        assert_eq!(config.initial_cache_capacity, 64);
        assert!(config.synchronize_streams);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = CursorConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }
}
