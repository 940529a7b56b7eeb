//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Tunables for a [`Runtime`](crate::reactive::Runtime).
///
/// Missing fields fall back to their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Upper bound on propagation passes in one flush. Writes made by effects
    /// start another pass; a flush that needs more than this is treated as a
    /// write loop and stopped.
    pub max_flush_passes: usize,

    /// Number of isolated errors kept for [`Runtime::take_errors`]. Oldest
    /// entries are dropped first.
    ///
    /// [`Runtime::take_errors`]: crate::reactive::Runtime::take_errors
    pub error_history: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_flush_passes: 100,
            error_history: 64,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = RuntimeConfig::from_json(r#"{ "max_flush_passes": 8 }"#).unwrap();
        assert_eq!(config.max_flush_passes, 8);
        assert_eq!(config.error_history, RuntimeConfig::default().error_history);
    }

    #[test]
    fn empty_object_is_default() {
        assert_eq!(RuntimeConfig::from_json("{}").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(RuntimeConfig::from_json(r#"{ "error_history": "lots" }"#).is_err());
    }
}
