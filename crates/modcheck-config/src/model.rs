//! Run configuration as read from `modcheck.yaml`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Top-level configuration. Every field has a default, so an empty file is
/// a valid config for the bundled ECR module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding the module under test
    pub module_dir: PathBuf,
    pub region: String,
    /// Environment variable the engine reads the region from
    pub region_env_var: String,
    pub naming: NamingConfig,
    /// Extra module variables. `region` and `name` are always set per run.
    pub vars: BTreeMap<String, serde_json::Value>,
    /// Extra engine environment
    pub env: BTreeMap<String, String>,
    pub output: OutputConfig,
    pub retry: RetrySettings,
    pub terraform: TerraformConfig,
    pub verification: VerificationConfig,
    pub aws: AwsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            module_dir: PathBuf::from("../"),
            region: "us-west-1".to_string(),
            region_env_var: "AWS_DEFAULT_REGION".to_string(),
            naming: NamingConfig::default(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
            output: OutputConfig::default(),
            retry: RetrySettings::default(),
            terraform: TerraformConfig::default(),
            verification: VerificationConfig::default(),
            aws: AwsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NamingConfig {
    pub prefix: String,
    pub suffix: String,
    pub token_length: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: "cs-pmod-".to_string(),
            suffix: "-testing".to_string(),
            token_length: 8,
        }
    }
}

/// Which output carries the identifier and how to cut it out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub key: String,
    pub delimiter: String,
    pub segment_index: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            key: "repository_url".to_string(),
            delimiter: "/".to_string(),
            segment_index: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_secs: u64,
    pub max_delay_secs: u64,
    pub backoff_multiplier: f64,
    /// Additional retryable error patterns on top of the built-in catalogue
    pub extra_patterns: Vec<RetryPattern>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_secs: 5,
            max_delay_secs: 60,
            backoff_multiplier: 2.0,
            extra_patterns: Vec::new(),
        }
    }
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryPattern {
    pub pattern: String,
    #[serde(default = "default_reason")]
    pub reason: String,
}

fn default_reason() -> String {
    "configured retryable error".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TerraformConfig {
    /// terraform executable (name on PATH or absolute path)
    pub binary: String,
    pub timeout_secs: u64,
    /// How long a cancelled command may take to exit after SIGINT
    pub interrupt_grace_secs: u64,
}

impl Default for TerraformConfig {
    fn default() -> Self {
        Self {
            binary: "terraform".to_string(),
            timeout_secs: 30 * 60,
            interrupt_grace_secs: 120,
        }
    }
}

impl TerraformConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interrupt_grace(&self) -> Duration {
        Duration::from_secs(self.interrupt_grace_secs)
    }
}

/// Provider error codes and how a run treats them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationConfig {
    pub not_found_codes: Vec<String>,
    pub transient_codes: Vec<String>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            not_found_codes: vec!["RepositoryNotFoundException".to_string()],
            transient_codes: vec!["ThrottlingException".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwsConfig {
    /// Named profile; the default credential chain when unset
    pub profile: Option<String>,
    pub operation_timeout_secs: u64,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            profile: None,
            operation_timeout_secs: 30,
        }
    }
}

impl AwsConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

impl RunConfig {
    /// Reject settings no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".to_string()));
        }
        if self.region_env_var.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "region_env_var must not be empty".to_string(),
            ));
        }
        if self.naming.token_length == 0 {
            return Err(ConfigError::Invalid(
                "naming.token_length must be at least 1".to_string(),
            ));
        }
        if self.output.key.is_empty() {
            return Err(ConfigError::Invalid("output.key must not be empty".to_string()));
        }
        if self.output.delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "output.delimiter must not be empty".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.backoff_multiplier.is_nan() || self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff_multiplier must be >= 1.0 (got {})",
                self.retry.backoff_multiplier
            )));
        }
        for extra in &self.retry.extra_patterns {
            if let Err(e) = Regex::new(&extra.pattern) {
                return Err(ConfigError::Invalid(format!(
                    "retry.extra_patterns: invalid regex '{}': {}",
                    extra.pattern, e
                )));
            }
        }
        if self.terraform.binary.is_empty() {
            return Err(ConfigError::Invalid(
                "terraform.binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
