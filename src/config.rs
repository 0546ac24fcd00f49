use alloc::vec::Vec;

use serde::Deserialize;

use crate::{
    dead_nonce::DEFAULT_DEAD_NONCE_LIFETIME_MS,
    name::Name,
    store::{DEFAULT_CONTENT_STORE_CAPACITY, DEFAULT_CONTENT_STORE_RETENTION_MS},
    unsolicited::UnsolicitedDataPolicy,
};

/// Tunables of a forwarder, all optional in the TOML form.
///
/// ```toml
/// dead_nonce_lifetime_ms = 6000
/// unsolicited_data_policy = "admit-local"
/// network_regions = ["/example/region"]
/// content_store_capacity = 65536
/// content_store_retention_ms = 60000
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForwarderConfig {
    pub dead_nonce_lifetime_ms: u64,
    pub unsolicited_data_policy: UnsolicitedDataPolicy,
    pub network_regions: Vec<Name>,
    pub content_store_capacity: usize,
    pub content_store_retention_ms: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            dead_nonce_lifetime_ms: DEFAULT_DEAD_NONCE_LIFETIME_MS,
            unsolicited_data_policy: UnsolicitedDataPolicy::default(),
            network_regions: Vec::new(),
            content_store_capacity: DEFAULT_CONTENT_STORE_CAPACITY,
            content_store_retention_ms: DEFAULT_CONTENT_STORE_RETENTION_MS,
        }
    }
}

#[cfg(feature = "std")]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid forwarder configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot read forwarder configuration: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(feature = "std")]
impl ForwarderConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(
            ForwarderConfig::from_toml_str("").unwrap(),
            ForwarderConfig::default()
        );
    }

    #[test]
    fn test_full_config() {
        let config = ForwarderConfig::from_toml_str(
            r#"
            dead_nonce_lifetime_ms = 1000
            unsolicited_data_policy = "admit-all"
            network_regions = ["/net/region", "/other"]
            content_store_capacity = 10
            content_store_retention_ms = 500
            "#,
        )
        .unwrap();

        assert_eq!(
            config,
            ForwarderConfig {
                dead_nonce_lifetime_ms: 1000,
                unsolicited_data_policy: UnsolicitedDataPolicy::AdmitAll,
                network_regions: vec![
                    "/net/region".parse().unwrap(),
                    "/other".parse().unwrap()
                ],
                content_store_capacity: 10,
                content_store_retention_ms: 500,
            }
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            ForwarderConfig::from_toml_str(r#"unsolicited_data_policy = "maybe""#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ForwarderConfig::from_toml_str("content_store_capacity = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ForwarderConfig::from_toml_str("no_such_key = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            ForwarderConfig::load("/nonexistent/nfwd.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
