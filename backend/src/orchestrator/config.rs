//! Static configuration of an emulation run
//!
//! A configuration names the per-cycle token emission, the process sheet of
//! every product and the producers. It is read from JSON (camelCase keys)
//! and validated before a system is built from it:
//!
//! ```json
//! {
//!   "cycleEmission": 1000,
//!   "processSheets": [{ "product": 1, "requirements": { "power": 10 } }],
//!   "producerConfigs": [{
//!     "id": "p1", "capacityType": "power", "capacity": 100, "degradationRate": 5,
//!     "restoration": { "product": 1, "restores": 10 },
//!     "upgrade": { "product": 1, "increases": 20 }
//!   }]
//! }
//! ```

use crate::core::errors::ErrorKind;
use crate::core::types::{Capacity, CapacityType, Product, ProducerId, Tokens};
use crate::models::process_sheet::ProcessSheet;
use crate::models::producing_agent::{ProducingAgent, Restoration, Upgrade};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    /// Tokens emitted at the start of every cycle
    pub cycle_emission: Tokens,
    pub process_sheets: Vec<ProcessSheet>,
    pub producer_configs: Vec<ProducerConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProducerConfig {
    pub id: ProducerId,
    pub capacity_type: CapacityType,
    pub capacity: Capacity,
    /// Percent of current capacity lost per cycle
    pub degradation_rate: u32,
    pub restoration: Restoration,
    pub upgrade: Upgrade,
}

impl ProducerConfig {
    pub fn build(&self) -> ProducingAgent {
        ProducingAgent::new(
            self.id.clone(),
            self.capacity_type.clone(),
            self.capacity,
            self.degradation_rate,
            self.restoration.clone(),
            self.upgrade.clone(),
        )
    }
}

/// Errors raised while loading or validating a configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidConfig
    }
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

impl Configuration {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Configuration = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cycle_emission == 0 {
            return Err(invalid("cycleEmission must be > 0"));
        }

        let mut products = BTreeSet::new();
        for sheet in &self.process_sheets {
            if !products.insert(sheet.product) {
                return Err(invalid(format!("Duplicate process sheet for product {}", sheet.product)));
            }
            if sheet.requirements.is_empty() {
                return Err(invalid(format!(
                    "Process sheet for product {} has no requirements",
                    sheet.product
                )));
            }
            if let Some((capacity_type, _)) = sheet.requirements.iter().find(|(_, c)| **c == 0) {
                return Err(invalid(format!(
                    "Process sheet for product {} requires zero {}",
                    sheet.product, capacity_type
                )));
            }
        }

        let mut ids = BTreeSet::new();
        let mut produced = BTreeSet::new();
        for producer in &self.producer_configs {
            if !ids.insert(&producer.id) {
                return Err(invalid(format!("Duplicate producer ID: {}", producer.id)));
            }
            if producer.capacity == 0 {
                return Err(invalid(format!("Producer {} capacity must be > 0", producer.id)));
            }
            if producer.degradation_rate > 100 {
                return Err(invalid(format!(
                    "Producer {} degradationRate must be <= 100",
                    producer.id
                )));
            }
            for (what, product) in [
                ("restoration", producer.restoration.product),
                ("upgrade", producer.upgrade.product),
            ] {
                if !products.contains(&product) {
                    return Err(invalid(format!(
                        "Producer {} {} product {} has no process sheet",
                        producer.id, what, product
                    )));
                }
            }
            produced.insert(&producer.capacity_type);
        }

        for sheet in &self.process_sheets {
            if let Some(missing) = sheet.requirements.keys().find(|t| !produced.contains(t)) {
                return Err(invalid(format!(
                    "Capacity type {} required by product {} has no producer",
                    missing, sheet.product
                )));
            }
        }

        Ok(())
    }

    pub fn sheets_by_product(&self) -> BTreeMap<Product, ProcessSheet> {
        self.process_sheets
            .iter()
            .map(|s| (s.product, s.clone()))
            .collect()
    }

    /// SHA-256 hex digest of the JSON encoding
    ///
    /// All collections are ordered, so equal configurations always encode to
    /// the same bytes.
    pub fn fingerprint(&self) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&json);
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "cycleEmission": 100,
        "processSheets": [
            { "product": 1, "requirements": { "a": 10, "b": 5 } },
            { "product": 2, "requirements": { "a": 3 } }
        ],
        "producerConfigs": [
            { "id": "p1", "capacityType": "a", "capacity": 100, "degradationRate": 5,
              "restoration": { "product": 2, "restores": 10 },
              "upgrade": { "product": 2, "increases": 20 } },
            { "id": "p2", "capacityType": "b", "capacity": 50, "degradationRate": 0,
              "restoration": { "product": 2, "restores": 5 },
              "upgrade": { "product": 1, "increases": 5 } }
        ]
    }"#;

    fn config() -> Configuration {
        Configuration::from_json_str(CONFIG).unwrap()
    }

    fn message(err: ConfigError) -> String {
        match err {
            ConfigError::Invalid(msg) => msg,
            other => panic!("expected invalid config, got {other}"),
        }
    }

    #[test]
    fn test_parse_camel_case() {
        let config = config();
        assert_eq!(config.cycle_emission, 100);
        assert_eq!(config.producer_configs[1].capacity_type.as_str(), "b");
        assert_eq!(config.sheets_by_product()[&1].requirements.len(), 2);
    }

    #[test]
    fn test_zero_emission_rejected() {
        let mut config = config();
        config.cycle_emission = 0;
        assert!(message(config.validate().unwrap_err()).contains("cycleEmission"));
    }

    #[test]
    fn test_duplicate_product_rejected() {
        let mut config = config();
        config.process_sheets[1].product = 1;
        assert!(message(config.validate().unwrap_err()).contains("Duplicate process sheet"));
    }

    #[test]
    fn test_empty_or_zero_requirement_rejected() {
        let mut config = config();
        config.process_sheets[1].requirements.clear();
        assert!(message(config.validate().unwrap_err()).contains("no requirements"));

        let mut config = self::config();
        config.process_sheets[1]
            .requirements
            .insert(CapacityType::new("a"), 0);
        assert!(message(config.validate().unwrap_err()).contains("requires zero"));
    }

    #[test]
    fn test_producer_checks() {
        let mut config = config();
        config.producer_configs[1].id = ProducerId::new("p1");
        assert!(message(config.validate().unwrap_err()).contains("Duplicate producer"));

        let mut config = self::config();
        config.producer_configs[0].capacity = 0;
        assert!(message(config.validate().unwrap_err()).contains("capacity must be > 0"));

        let mut config = self::config();
        config.producer_configs[0].degradation_rate = 101;
        assert!(message(config.validate().unwrap_err()).contains("degradationRate"));

        let mut config = self::config();
        config.producer_configs[0].upgrade.product = 9;
        assert!(message(config.validate().unwrap_err()).contains("no process sheet"));
    }

    #[test]
    fn test_unproduced_capacity_type_rejected() {
        let mut config = config();
        config.producer_configs.remove(1);
        assert!(message(config.validate().unwrap_err()).contains("has no producer"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_sensitive() {
        let a = config().fingerprint().unwrap();
        assert_eq!(a, config().fingerprint().unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = config();
        changed.cycle_emission = 101;
        assert_ne!(a, changed.fingerprint().unwrap());
    }

    #[test]
    fn test_parse_error_kind() {
        let err = Configuration::from_json_str("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    }
}
