use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::item::Item;

// =============================================================================
// Configuration errors: rejected before any worker starts
// =============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Buffer capacity must be greater than 0")]
    ZeroCapacity,

    #[error("At least one producer is required")]
    NoProducers,

    #[error("At least one consumer is required")]
    NoConsumers,

    #[error("Invalid delay range: min {min_ms}ms is greater than max {max_ms}ms")]
    InvalidDelay { min_ms: u64, max_ms: u64 },

    #[error("Expected {expected} consumer quotas, got {actual}")]
    QuotaCount { expected: usize, actual: usize },

    #[error("Total item count does not fit in a usize")]
    TooManyItems,

    #[error("Consumer quotas sum to {consumed} but producers produce {produced} items")]
    QuotaMismatch { produced: usize, consumed: usize },

    #[error("Failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn quota_mismatch(produced: usize, consumed: usize) -> Self {
        Self::QuotaMismatch { produced, consumed }
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }
}

// =============================================================================
// Run errors
// =============================================================================

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to spawn worker thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Worker thread '{name}' panicked")]
    WorkerPanicked { name: String },

    #[error("Produced {produced} items but consumed {consumed}")]
    Conservation { produced: usize, consumed: usize },

    #[error("Item {item} was consumed more than once")]
    Duplicate { item: Item },

    #[error("Failed to render report: {0}")]
    Render(#[from] serde_json::Error),
}

impl SimulationError {
    pub fn spawn(name: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }

    pub fn worker_panicked(name: impl Into<String>) -> Self {
        Self::WorkerPanicked { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_mismatch_display() {
        let error = ConfigError::quota_mismatch(40, 39);
        let display = error.to_string();
        assert!(display.contains("39"));
        assert!(display.contains("40"));
    }

    #[test]
    fn test_config_error_converts_into_simulation_error() {
        let error: SimulationError = ConfigError::ZeroCapacity.into();
        assert!(matches!(error, SimulationError::Config(ConfigError::ZeroCapacity)));
        assert_eq!(error.to_string(), "Buffer capacity must be greater than 0");
    }

    #[test]
    fn test_json_error_converts_into_render() {
        let json_error = serde_json::from_str::<u32>("not json").unwrap_err();
        let error: SimulationError = json_error.into();
        assert!(matches!(error, SimulationError::Render(_)));
        assert!(error.to_string().starts_with("Failed to render report:"));
    }

    #[test]
    fn test_read_error_keeps_source() {
        use std::error::Error as _;
        let error = ConfigError::read(
            "missing.toml",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(error.to_string().contains("missing.toml"));
        assert!(error.source().is_some());
    }
}
