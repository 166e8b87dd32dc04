//! Run configuration: the struct the core consumes from its CLI collaborator.
//!
//! Parsing `argv` into this struct is out of scope here; this module covers
//! the struct itself, its defaults, YAML (de)serialization, and validation.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

fn default_num_runners() -> usize {
    8
}

fn default_max_tokens() -> u32 {
    256
}

fn default_report_freq_min() -> f64 {
    5.0
}

fn default_seed() -> u64 {
    42
}

/// Mirrors the configuration surface enumerated for the CLI collaborator:
/// endpoint, auth material, pool sizing, prompt source, and signing toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub endpoint: String,
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub account_address: Option<String>,
    #[serde(default)]
    pub private_key_hex: Option<String>,

    #[serde(default = "default_num_runners")]
    pub num_runners: usize,
    #[serde(default)]
    pub num_tasks: usize,

    #[serde(default)]
    pub prompts_file: Option<String>,
    #[serde(default)]
    pub num_prompts: Option<usize>,
    #[serde(default)]
    pub prompt_length: Option<usize>,
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_report_freq_min")]
    pub report_freq_min: f64,

    #[serde(default)]
    pub no_sign: bool,
    #[serde(default)]
    pub old_sign: bool,

    pub experiment_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl RunConfig {
    /// Deserialize from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        serde_yml::from_str(yaml).map_err(Error::ConfigSerde)
    }

    /// Deserialize from a YAML file on disk.
    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file: {e}")))?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to a YAML document.
    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yml::to_string(self).map_err(Error::ConfigSerde)
    }

    /// Validate invariants that the core depends on. Does not validate
    /// fields that are only meaningful to the external report renderer or
    /// balance-check utility.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config("endpoint must not be empty".to_string()));
        }
        if self.num_runners == 0 {
            return Err(Error::Config("num_runners must be at least 1".to_string()));
        }
        if !self.no_sign {
            if self.account_address.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(Error::Config(
                    "account_address is required when signing is enabled".to_string(),
                ));
            }
            if self.private_key_hex.as_deref().unwrap_or_default().trim().is_empty() {
                return Err(Error::Config(
                    "private_key_hex is required when signing is enabled".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Additional bounded-mode-only validation: `num_tasks` must be positive.
    pub fn validate_bounded(&self) -> Result<()> {
        self.validate()?;
        if self.num_tasks == 0 {
            return Err(Error::Config(
                "num_tasks must be at least 1 in bounded mode".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        "
endpoint: http://localhost:8000
model: test-model
experiment_name: smoke-test
no_sign: true
"
    }

    #[test]
    fn from_yaml_str_applies_defaults() {
        let config = RunConfig::from_yaml_str(minimal_yaml()).unwrap();
        assert_eq!(config.num_runners, 8);
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn validate_rejects_empty_endpoint() {
        let mut config = RunConfig::from_yaml_str(minimal_yaml()).unwrap();
        config.endpoint = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_requires_signing_material_unless_no_sign() {
        let mut config = RunConfig::from_yaml_str(minimal_yaml()).unwrap();
        config.no_sign = false;
        assert!(config.validate().is_err());
        config.account_address = Some("0xabc".to_string());
        config.private_key_hex = Some("aa".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_bounded_requires_positive_task_count() {
        let config = RunConfig::from_yaml_str(minimal_yaml()).unwrap();
        assert!(config.validate_bounded().is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let config = RunConfig::from_yaml_str(minimal_yaml()).unwrap();
        let yaml = config.to_yaml_string().unwrap();
        let reparsed = RunConfig::from_yaml_str(&yaml).unwrap();
        assert_eq!(reparsed.endpoint, config.endpoint);
        assert_eq!(reparsed.model, config.model);
    }
}
