//! Provisioning inputs and outputs

use crate::error::{LifecycleError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Everything handed to the provisioning engine for one apply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionInputs {
    /// Directory containing the module under test
    pub module_dir: PathBuf,

    /// Input variables (`-var name=value`)
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Environment variables for the engine process
    pub env: BTreeMap<String, String>,
}

impl ProvisionInputs {
    pub fn new(module_dir: impl AsRef<Path>) -> Self {
        Self {
            module_dir: module_dir.as_ref().to_path_buf(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// The `name` variable, used to label log lines and errors
    pub fn resource_name(&self) -> Option<&str> {
        self.vars.get("name").and_then(|v| v.as_str())
    }
}

/// Outputs read back from the engine after a successful apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutputs {
    values: BTreeMap<String, String>,
}

impl ProvisionOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Like [`get`](Self::get) but fails with `MissingOutput`
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| LifecycleError::MissingOutput {
            key: key.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProvisionOutputs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
