use serde::Deserialize;
use std::fmt;
use vdom::MemoCache;

/// Tunables for a [`crate::Reconciler`] and the collaborators it hands out.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Entry count above which the result cache evicts.
    pub cache_capacity: usize,
    /// Fraction of entries dropped per eviction, `0.0..=1.0`.
    pub cache_evict_ratio: f64,
    /// Per-event listener bound for event buses built from this config.
    pub max_listeners: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            cache_capacity: MemoCache::DEFAULT_CAPACITY,
            cache_evict_ratio: MemoCache::DEFAULT_EVICT_RATIO,
            max_listeners: 10,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(toml::de::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
            ConfigError::Invalid(msg) => write!(f, "invalid config: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Parse(err) => Some(err),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl ReconcilerConfig {
    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ReconcilerConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Invalid(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.cache_evict_ratio) {
            return Err(ConfigError::Invalid(format!(
                "cache_evict_ratio must be within 0.0..=1.0, got {}",
                self.cache_evict_ratio
            )));
        }
        if self.max_listeners == 0 {
            return Err(ConfigError::Invalid(
                "max_listeners must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn build_cache(&self) -> MemoCache {
        MemoCache::with_policy(self.cache_capacity, self.cache_evict_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = ReconcilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReconcilerConfig::default());
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.max_listeners, 10);
    }

    #[test]
    fn partial_document_overrides_fields() {
        let config = ReconcilerConfig::from_toml_str("cache_capacity = 32\n").unwrap();
        assert_eq!(config.cache_capacity, 32);
        assert_eq!(config.cache_evict_ratio, 0.2);
        assert_eq!(config.build_cache().capacity(), 32);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = ReconcilerConfig::from_toml_str("cache_evict_ratio = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = ReconcilerConfig::from_toml_str("max_listeners = 0").unwrap_err();
        assert!(err.to_string().contains("max_listeners"));
    }

    #[test]
    fn unknown_keys_fail_to_parse() {
        let err = ReconcilerConfig::from_toml_str("cache_size = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
