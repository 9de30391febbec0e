//! modcheck core
//!
//! Proves that an infrastructure module really provisions what it claims:
//! apply the module under a unique name, read the identifier back from its
//! outputs, ask the cloud provider directly whether the resource exists, and
//! always destroy afterwards.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              LifecycleController                 │
//! │  Init → Named → Applied → OutputRetrieved →      │
//! │  IdentifierExtracted → Verified → TornDown       │
//! └───────┬──────────────┬───────────────┬──────────┘
//!         │              │               │
//! ┌───────▼──────┐ ┌─────▼──────┐ ┌──────▼─────────┐
//! │ NameGenerator│ │Provisioning│ │ Verification   │
//! │              │ │  Client    │ │   Client       │
//! └──────────────┘ └─────┬──────┘ └──────┬─────────┘
//!                        │               │
//!              trait ProvisioningEngine  trait ResourceDescriber
//!              (modcheck-terraform)      (modcheck-cloud-aws)
//! ```

pub mod error;
pub mod inputs;
pub mod lifecycle;
pub mod naming;
pub mod output;
pub mod provider;
pub mod provisioning;
pub mod report;
pub mod retry;
pub mod verification;

// Re-exports
pub use error::{DescribeError, LifecycleError, ProvisionError, Result};
pub use inputs::{ProvisionInputs, ProvisionOutputs};
pub use lifecycle::{LifecycleController, LifecycleState, RunTemplate};
pub use naming::{NameGenerator, RunIdentity, is_provider_legal};
pub use output::{OutputContract, extract_identifier};
pub use provider::{ProvisioningEngine, ResourceDescriber, ResourceRecord};
pub use provisioning::{Deployment, ProvisioningClient};
pub use report::RunReport;
pub use retry::{
    NeverRetry, RetryClassifier, RetryConfig, retry_until_cancelled, retry_with_backoff,
};
pub use verification::{
    VerificationClient, VerificationFault, VerificationPolicy, VerificationResult,
};
