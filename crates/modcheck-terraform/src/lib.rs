//! terraform provisioning engine for modcheck
//!
//! This crate implements the `ProvisioningEngine` trait on top of the
//! terraform CLI, and ships the catalogue of terraform errors worth retrying.
//!
//! # Requirements
//!
//! - `terraform` must be installed (or its path configured)
//! - Provider credentials are resolved by terraform from its environment
//!
//! # Example
//!
//! ```ignore
//! use modcheck_core::{ProvisionInputs, ProvisioningClient, RetryConfig};
//! use modcheck_terraform::{RetryableErrors, Terraform};
//! use std::sync::Arc;
//!
//! let client = ProvisioningClient::new(Arc::new(Terraform::default()))
//!     .with_retry(RetryConfig::default(), Arc::new(RetryableErrors::defaults()));
//!
//! let mut deployment = client.deployment(
//!     ProvisionInputs::new("../").with_var("region", "us-west-1"),
//! );
//! deployment.apply().await?;
//! deployment.destroy().await?;
//! ```

mod engine;
pub mod retryable;
pub mod terraform;

pub use retryable::{DEFAULT_RETRYABLE_ERRORS, RetryableErrors};
pub use terraform::{
    DEFAULT_COMMAND_TIMEOUT, DEFAULT_INTERRUPT_GRACE, Terraform, TerraformVersion,
};
