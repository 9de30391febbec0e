//! Collaborator traits: the provisioning engine and the provider's read API

use crate::error::{DescribeError, ProvisionError};
use crate::inputs::{ProvisionInputs, ProvisionOutputs};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

/// Provisioning engine abstraction
///
/// The engine is opaque: it owns plan/apply/destroy execution and its own
/// state. Implementations (e.g. the terraform CLI) only have to expose these
/// three operations.
#[async_trait]
pub trait ProvisioningEngine: Send + Sync {
    /// Returns the engine name (e.g., "terraform")
    fn name(&self) -> &str;

    /// Initialize the module and apply it.
    ///
    /// When `cancel` fires, the engine should let the in-flight work wind
    /// down (so its state records what was created) and then return
    /// [`ProvisionError::Interrupted`].
    async fn apply(
        &self,
        inputs: &ProvisionInputs,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError>;

    /// Read all declared outputs of the last apply
    async fn outputs(&self, inputs: &ProvisionInputs) -> Result<ProvisionOutputs, ProvisionError>;

    /// Tear down everything the module created
    async fn destroy(&self, inputs: &ProvisionInputs) -> Result<(), ProvisionError>;
}

/// Read-only query against the cloud provider's control-plane API
#[async_trait]
pub trait ResourceDescriber: Send + Sync {
    /// Returns the describer name (e.g., "aws-ecr")
    fn name(&self) -> &str;

    /// Describe the resource with the given identifier
    async fn describe(&self, identifier: &str) -> Result<Vec<ResourceRecord>, DescribeError>;
}

/// A single record returned by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Provider-native resource name
    pub name: String,

    /// ARN or equivalent globally-unique id
    pub arn: Option<String>,

    /// Addressable URI of the resource
    pub uri: Option<String>,

    /// Owning account / registry id
    pub owner_id: Option<String>,

    pub created_at: Option<DateTime<Utc>>,

    /// Provider-specific attributes
    pub attributes: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arn: None,
            uri: None,
            owner_id: None,
            created_at: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_arn(mut self, arn: impl Into<String>) -> Self {
        self.arn = Some(arn.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_owner_id(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
