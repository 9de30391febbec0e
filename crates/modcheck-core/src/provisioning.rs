//! Provisioning client and the deployment guard
//!
//! A [`Deployment`] owns the inputs of one run. Once `apply` has started,
//! the deployment must be destroyed; `destroy` is idempotent, and dropping an
//! undestroyed deployment is logged as a leak.

use crate::error::{LifecycleError, ProvisionError, Result};
use crate::inputs::{ProvisionInputs, ProvisionOutputs};
use crate::provider::ProvisioningEngine;
use crate::retry::{
    NeverRetry, RetryClassifier, RetryConfig, retry_until_cancelled, retry_with_backoff,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Wraps a provisioning engine with a retry policy
#[derive(Clone)]
pub struct ProvisioningClient {
    engine: Arc<dyn ProvisioningEngine>,
    retry: RetryConfig,
    classifier: Arc<dyn RetryClassifier>,
}

impl ProvisioningClient {
    /// Client without retries
    pub fn new(engine: Arc<dyn ProvisioningEngine>) -> Self {
        Self {
            engine,
            retry: RetryConfig::no_retry(),
            classifier: Arc::new(NeverRetry),
        }
    }

    pub fn with_retry(
        mut self,
        retry: RetryConfig,
        classifier: Arc<dyn RetryClassifier>,
    ) -> Self {
        self.retry = retry;
        self.classifier = classifier;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Start a deployment. Nothing is provisioned until [`Deployment::apply`].
    pub fn deployment(&self, inputs: ProvisionInputs) -> Deployment {
        Deployment {
            client: self.clone(),
            inputs,
            outputs: None,
            apply_started: false,
            destroyed: false,
        }
    }
}

/// Guard for one apply/destroy pair
pub struct Deployment {
    client: ProvisioningClient,
    inputs: ProvisionInputs,
    outputs: Option<ProvisionOutputs>,
    apply_started: bool,
    destroyed: bool,
}

impl Deployment {
    pub fn inputs(&self) -> &ProvisionInputs {
        &self.inputs
    }

    fn label(&self) -> String {
        self.inputs
            .resource_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.inputs.module_dir.display().to_string())
    }

    /// Whether `apply` was ever invoked (and `destroy` is therefore owed)
    pub fn apply_started(&self) -> bool {
        self.apply_started
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Apply the module and read back its outputs.
    ///
    /// Transient engine errors are retried according to the client's policy.
    pub async fn apply(&mut self) -> Result<&ProvisionOutputs> {
        self.apply_until_cancelled(&CancellationToken::new()).await
    }

    /// [`Deployment::apply`] that hands `cancel` to the engine. A cancelled
    /// apply fails with an `ApplyError` whose source is `Interrupted`, after
    /// the engine has wound down; destroy is still owed.
    pub async fn apply_until_cancelled(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<&ProvisionOutputs> {
        // Set before the engine runs: a partial apply still needs a destroy.
        self.apply_started = true;

        let engine = self.client.engine.clone();
        let classifier = self.client.classifier.clone();
        let inputs = &self.inputs;

        tracing::info!(
            engine = %engine.name(),
            module = %inputs.module_dir.display(),
            "Applying module"
        );

        let applied = retry_until_cancelled(
            &self.client.retry,
            classifier.as_ref(),
            "apply",
            cancel,
            || engine.apply(inputs, cancel),
        )
        .await;

        let outputs = match applied {
            Ok(()) => {
                retry_with_backoff(&self.client.retry, classifier.as_ref(), "output", || {
                    engine.outputs(inputs)
                })
                .await
            }
            Err(e) => Err(e),
        };

        match outputs {
            Ok(outputs) => {
                tracing::debug!("Apply produced {} output(s)", outputs.len());
                Ok(&*self.outputs.insert(outputs))
            }
            Err(source) => Err(LifecycleError::ApplyError {
                name: self.label(),
                source,
            }),
        }
    }

    /// Value of a declared output. Fails with `MissingOutput` before apply,
    /// after destroy, or when the module never declared `key`.
    pub fn output(&self, key: &str) -> Result<&str> {
        match &self.outputs {
            Some(outputs) => outputs.require(key),
            None => Err(LifecycleError::MissingOutput {
                key: key.to_string(),
            }),
        }
    }

    /// Destroy everything the apply created.
    ///
    /// Runs the engine at most once per deployment; later calls are no-ops.
    /// A deployment whose apply never started has nothing to destroy.
    pub async fn destroy(&mut self) -> Result<()> {
        if !self.apply_started {
            tracing::debug!("Apply never started for {}, nothing to destroy", self.label());
            return Ok(());
        }
        if self.destroyed {
            tracing::debug!("{} already destroyed", self.label());
            return Ok(());
        }

        // Marked up front so a failed destroy is never re-run by this guard.
        self.destroyed = true;
        self.outputs = None;

        let engine = self.client.engine.clone();
        let classifier = self.client.classifier.clone();
        let inputs = &self.inputs;

        tracing::info!(engine = %engine.name(), "Destroying {}", self.label());

        retry_with_backoff(&self.client.retry, classifier.as_ref(), "destroy", || {
            engine.destroy(inputs)
        })
        .await
        .map_err(|source: ProvisionError| LifecycleError::DestroyError {
            name: self.label(),
            source,
        })
    }
}

impl Drop for Deployment {
    fn drop(&mut self) {
        if self.apply_started && !self.destroyed {
            tracing::error!(
                "Deployment {} dropped without destroy; resources in {} may have leaked",
                self.label(),
                self.inputs.module_dir.display()
            );
        }
    }
}
