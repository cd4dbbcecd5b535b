//! Simulation configuration: defaults, TOML loading, a fluent builder and
//! validation. Everything that could leave a worker blocked forever is
//! rejected here, before any thread starts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::buffer::Capacity;
use crate::error::ConfigError;

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_PRODUCERS: usize = 2;
pub const DEFAULT_CONSUMERS: usize = 2;
pub const DEFAULT_ITEMS_PER_PRODUCER: usize = 20;
pub const DEFAULT_MIN_DELAY_MS: u64 = 100;
pub const DEFAULT_MAX_DELAY_MS: u64 = 500;

// =============================================================================
// Config structs
// =============================================================================

/// Per-item pause range, in milliseconds, applied before every put and get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DelayConfig {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayConfig {
    pub fn none() -> Self {
        DelayConfig { min_ms: 0, max_ms: 0 }
    }

    pub fn min(&self) -> Duration {
        Duration::from_millis(self.min_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }
}

impl Default for DelayConfig {
    fn default() -> Self {
        DelayConfig {
            min_ms: DEFAULT_MIN_DELAY_MS,
            max_ms: DEFAULT_MAX_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub capacity: usize,
    pub producers: usize,
    pub consumers: usize,
    pub items_per_producer: usize,
    pub delay: DelayConfig,
    /// Explicit per-consumer quotas. When absent the total is split evenly.
    pub quotas: Option<Vec<usize>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            capacity: DEFAULT_CAPACITY,
            producers: DEFAULT_PRODUCERS,
            consumers: DEFAULT_CONSUMERS,
            items_per_producer: DEFAULT_ITEMS_PER_PRODUCER,
            delay: DelayConfig::default(),
            quotas: None,
        }
    }
}

impl SimulationConfig {
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::new()
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::read(path, err))?;
        Self::from_toml_str(&content)
    }

    pub fn total_items(&self) -> Result<usize, ConfigError> {
        self.producers
            .checked_mul(self.items_per_producer)
            .ok_or(ConfigError::TooManyItems)
    }

    /// How many items each consumer takes, in consumer-id order.
    pub fn consumer_quotas(&self) -> Result<Vec<usize>, ConfigError> {
        match &self.quotas {
            Some(quotas) => Ok(quotas.clone()),
            None => Ok(split_quota(self.total_items()?, self.consumers)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Capacity::new(self.capacity)?;
        if self.producers == 0 {
            return Err(ConfigError::NoProducers);
        }
        if self.consumers == 0 {
            return Err(ConfigError::NoConsumers);
        }
        if self.delay.min_ms > self.delay.max_ms {
            return Err(ConfigError::InvalidDelay {
                min_ms: self.delay.min_ms,
                max_ms: self.delay.max_ms,
            });
        }
        if let Some(quotas) = &self.quotas {
            if quotas.len() != self.consumers {
                return Err(ConfigError::QuotaCount {
                    expected: self.consumers,
                    actual: quotas.len(),
                });
            }
        }

        let produced = self.total_items()?;
        let consumed = self
            .consumer_quotas()?
            .iter()
            .try_fold(0usize, |sum, quota| sum.checked_add(*quota))
            .ok_or(ConfigError::TooManyItems)?;
        if produced != consumed {
            return Err(ConfigError::quota_mismatch(produced, consumed));
        }
        Ok(())
    }
}

/// Splits `total` across `consumers`: everyone gets the base share and the
/// first `total % consumers` get one extra.
pub fn split_quota(total: usize, consumers: usize) -> Vec<usize> {
    if consumers == 0 {
        return Vec::new();
    }
    let base = total / consumers;
    let remainder = total % consumers;
    (0..consumers)
        .map(|id| base + usize::from(id < remainder))
        .collect()
}

// =============================================================================
// Builder
// =============================================================================

/// Fluent builder; starts from the defaults or from an existing config
/// (e.g. one loaded from a file) and validates on `build`.
#[derive(Debug, Clone, Default)]
pub struct SimulationConfigBuilder {
    config: SimulationConfig,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: SimulationConfig) -> Self {
        SimulationConfigBuilder { config }
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    pub fn producers(mut self, producers: usize) -> Self {
        self.config.producers = producers;
        self
    }

    pub fn consumers(mut self, consumers: usize) -> Self {
        self.config.consumers = consumers;
        self
    }

    pub fn items_per_producer(mut self, items: usize) -> Self {
        self.config.items_per_producer = items;
        self
    }

    pub fn delay_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.config.delay = DelayConfig { min_ms, max_ms };
        self
    }

    pub fn min_delay_ms(mut self, min_ms: u64) -> Self {
        self.config.delay.min_ms = min_ms;
        self
    }

    pub fn max_delay_ms(mut self, max_ms: u64) -> Self {
        self.config.delay.max_ms = max_ms;
        self
    }

    pub fn no_delay(mut self) -> Self {
        self.config.delay = DelayConfig::none();
        self
    }

    pub fn quotas(mut self, quotas: Vec<usize>) -> Self {
        self.config.quotas = Some(quotas);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.total_items().unwrap(), 40);
        assert_eq!(config.consumer_quotas().unwrap(), vec![20, 20]);
    }

    #[test]
    fn test_split_quota_remainder_goes_first() {
        assert_eq!(split_quota(10, 3), vec![4, 3, 3]);
        assert_eq!(split_quota(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_quota(5, 0), Vec::<usize>::new());
    }

    #[test]
    fn test_builder_rejects_zero_capacity() {
        let result = SimulationConfig::builder().capacity(0).build();
        assert!(matches!(result, Err(ConfigError::ZeroCapacity)));
    }

    #[test]
    fn test_builder_rejects_missing_workers() {
        let result = SimulationConfig::builder().producers(0).build();
        assert!(matches!(result, Err(ConfigError::NoProducers)));

        let result = SimulationConfig::builder().consumers(0).build();
        assert!(matches!(result, Err(ConfigError::NoConsumers)));
    }

    #[test]
    fn test_builder_rejects_inverted_delay() {
        let result = SimulationConfig::builder().delay_ms(50, 10).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidDelay { min_ms: 50, max_ms: 10 })
        ));
    }

    #[test]
    fn test_explicit_quotas_must_match_total() {
        let result = SimulationConfig::builder()
            .producers(2)
            .items_per_producer(5)
            .consumers(2)
            .quotas(vec![6, 3])
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::QuotaMismatch { produced: 10, consumed: 9 })
        ));

        let config = SimulationConfig::builder()
            .producers(2)
            .items_per_producer(5)
            .consumers(2)
            .quotas(vec![7, 3])
            .build()
            .unwrap();
        assert_eq!(config.consumer_quotas().unwrap(), vec![7, 3]);
    }

    #[test]
    fn test_explicit_quotas_must_cover_each_consumer() {
        let result = SimulationConfig::builder()
            .consumers(3)
            .quotas(vec![20, 20])
            .build();
        assert!(matches!(
            result,
            Err(ConfigError::QuotaCount { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_item_total_overflow_rejected() {
        let result = SimulationConfig::builder()
            .producers(usize::MAX)
            .items_per_producer(2)
            .build();
        assert!(matches!(result, Err(ConfigError::TooManyItems)));

        let config = SimulationConfig {
            producers: usize::MAX,
            items_per_producer: 2,
            ..SimulationConfig::default()
        };
        assert!(matches!(config.total_items(), Err(ConfigError::TooManyItems)));
        assert!(matches!(config.consumer_quotas(), Err(ConfigError::TooManyItems)));
    }

    #[test]
    fn test_quota_sum_overflow_rejected() {
        let result = SimulationConfig::builder()
            .consumers(2)
            .quotas(vec![usize::MAX, 1])
            .build();
        assert!(matches!(result, Err(ConfigError::TooManyItems)));
    }

    #[test]
    fn test_parse_partial_toml_keeps_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
capacity = 1
producers = 1

[delay]
max_ms = 0
min_ms = 0
"#,
        )
        .unwrap();

        assert_eq!(config.capacity, 1);
        assert_eq!(config.producers, 1);
        assert_eq!(config.consumers, DEFAULT_CONSUMERS);
        assert_eq!(config.items_per_producer, DEFAULT_ITEMS_PER_PRODUCER);
        assert_eq!(config.delay, DelayConfig::none());
    }

    #[test]
    fn test_parse_rejects_unknown_field() {
        let result = SimulationConfig::from_toml_str("capacityy = 3");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"capacity = 8\nconsumers = 3\nquotas = [20, 10, 10]\n")
            .unwrap();

        let config = SimulationConfig::from_file(file.path()).unwrap();
        assert_eq!(config.capacity, 8);
        assert_eq!(config.quotas, Some(vec![20, 10, 10]));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_missing_file() {
        let result = SimulationConfig::from_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_builder_overrides_loaded_config() {
        let loaded = SimulationConfig::from_toml_str("capacity = 9").unwrap();
        let config = SimulationConfigBuilder::from_config(loaded)
            .producers(3)
            .no_delay()
            .build()
            .unwrap();
        assert_eq!(config.capacity, 9);
        assert_eq!(config.producers, 3);
        assert_eq!(config.consumer_quotas().unwrap(), vec![30, 30]);
    }

    proptest! {
        #[test]
        fn test_split_quota_properties(total in 0usize..10_000, consumers in 1usize..64) {
            let quotas = split_quota(total, consumers);

            prop_assert_eq!(quotas.len(), consumers);
            prop_assert_eq!(quotas.iter().sum::<usize>(), total);

            let max = *quotas.iter().max().unwrap();
            let min = *quotas.iter().min().unwrap();
            prop_assert!(max - min <= 1);
        }
    }
}
