//! AWS verification for modcheck
//!
//! Implements `ResourceDescriber` against the ECR control plane so a run can
//! confirm that the repository a module reported is really there.
//!
//! # Authentication
//!
//! Credentials come from the standard AWS chain (environment, shared
//! config/credentials files, SSO, instance metadata). A named profile can be
//! selected through [`AwsClientConfig::with_profile`].

pub mod ecr;

pub use ecr::{AwsClientConfig, DEFAULT_OPERATION_TIMEOUT, EcrDescriber};
