//! Lifecycle controller: name → apply → output → identifier → verify → destroy
//!
//! ```text
//! Init ─▶ Named ─▶ Applied ─▶ OutputRetrieved ─▶ IdentifierExtracted ─▶ Verified
//!             │        │              │                   │                 │
//!             └────────┴──────────────┴───────────────────┴─────────────────┴─▶ TornDown
//! ```
//!
//! Any forward failure (or cancellation) jumps straight to teardown. Exactly
//! one destroy is issued per apply that started. A cancelled apply is allowed
//! to wind down before the destroy starts, so the engine's state covers
//! everything it created.

use crate::error::{LifecycleError, Result};
use crate::inputs::ProvisionInputs;
use crate::naming::{NameGenerator, RunIdentity};
use crate::output::OutputContract;
use crate::provisioning::{Deployment, ProvisioningClient};
use crate::report::RunReport;
use crate::verification::VerificationClient;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_REGION_ENV_VAR: &str = "AWS_DEFAULT_REGION";

/// States of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Init,
    Named,
    Applied,
    OutputRetrieved,
    IdentifierExtracted,
    Verified,
    TornDown,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleState::Init => write!(f, "init"),
            LifecycleState::Named => write!(f, "named"),
            LifecycleState::Applied => write!(f, "applied"),
            LifecycleState::OutputRetrieved => write!(f, "output-retrieved"),
            LifecycleState::IdentifierExtracted => write!(f, "identifier-extracted"),
            LifecycleState::Verified => write!(f, "verified"),
            LifecycleState::TornDown => write!(f, "torn-down"),
        }
    }
}

/// Inputs shared by every run; the resource name is filled in per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunTemplate {
    pub module_dir: PathBuf,
    pub region: String,

    /// Environment variable that carries the region to the engine
    pub region_env_var: String,

    /// Module-specific variables
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Extra environment for the engine
    pub env: BTreeMap<String, String>,
}

impl RunTemplate {
    pub fn new(module_dir: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            module_dir: module_dir.into(),
            region: region.into(),
            region_env_var: DEFAULT_REGION_ENV_VAR.to_string(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    /// Inputs for one run. `region` and `name` always win over extra vars.
    pub fn inputs_for(&self, identity: &RunIdentity) -> ProvisionInputs {
        let mut inputs = ProvisionInputs::new(&self.module_dir);
        inputs.vars = self.vars.clone();
        inputs.env = self.env.clone();

        inputs
            .with_var("region", self.region.as_str())
            .with_var("name", identity.name())
            .with_env(self.region_env_var.as_str(), self.region.as_str())
    }
}

/// Drives one provision-verify-teardown run at a time
pub struct LifecycleController {
    naming: NameGenerator,
    template: RunTemplate,
    contract: OutputContract,
    provisioning: ProvisioningClient,
    verification: VerificationClient,
}

impl LifecycleController {
    pub fn new(
        template: RunTemplate,
        provisioning: ProvisioningClient,
        verification: VerificationClient,
    ) -> Self {
        Self {
            naming: NameGenerator::default(),
            template,
            contract: OutputContract::default(),
            provisioning,
            verification,
        }
    }

    pub fn with_naming(mut self, naming: NameGenerator) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_output_contract(mut self, contract: OutputContract) -> Self {
        self.contract = contract;
        self
    }

    pub fn template(&self) -> &RunTemplate {
        &self.template
    }

    /// Run once with a freshly generated name
    pub async fn run(&self) -> RunReport {
        self.run_until_cancelled(&CancellationToken::new()).await
    }

    /// Run once; `cancel` stops the forward path but never teardown
    pub async fn run_until_cancelled(&self, cancel: &CancellationToken) -> RunReport {
        let identity = self.naming.generate();
        self.run_as(identity, cancel).await
    }

    /// Run once under an explicit identity
    pub async fn run_as(&self, identity: RunIdentity, cancel: &CancellationToken) -> RunReport {
        let mut report = RunReport::new(identity.name());
        report.enter(LifecycleState::Named);
        tracing::info!(run = %identity, "Starting run");

        let mut deployment = self
            .provisioning
            .deployment(self.template.inputs_for(&identity));

        if let Err(e) = self.forward(&mut deployment, &mut report, cancel).await {
            tracing::warn!(run = %identity, kind = e.kind(), "Run failed: {}", e);
            report.failure = Some(e);
        }

        if let Err(e) = deployment.destroy().await {
            tracing::error!(run = %identity, "Teardown failed, resources may have leaked: {}", e);
            report.teardown_error = Some(e);
        }
        report.enter(LifecycleState::TornDown);
        report.finish();

        tracing::info!(
            run = %identity,
            passed = report.passed(),
            duration_ms = report.duration_ms(),
            "Run finished"
        );
        report
    }

    async fn forward(
        &self,
        deployment: &mut Deployment,
        report: &mut RunReport,
        cancel: &CancellationToken,
    ) -> Result<()> {
        checkpoint(cancel, report)?;
        deployment
            .apply_until_cancelled(cancel)
            .await
            .map_err(|e| match e {
                LifecycleError::ApplyError { ref source, .. } if source.is_interrupted() => {
                    cancelled(report)
                }
                other => other,
            })?;
        report.enter(LifecycleState::Applied);
        checkpoint(cancel, report)?;

        let raw = deployment.output(&self.contract.key)?.to_string();
        report.enter(LifecycleState::OutputRetrieved);
        tracing::info!("Output {} = {}", self.contract.key, raw);

        let identifier = self.contract.extract(&raw)?;
        report.identifier = Some(identifier.clone());
        report.enter(LifecycleState::IdentifierExtracted);
        tracing::debug!("Extracted identifier {}", identifier);

        // A read-only describe can simply be abandoned
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled(report)),
            result = self.verification.describe(&identifier) => result,
        };
        report.enter(LifecycleState::Verified);
        report.records = result.into_outcome(&identifier)?;
        Ok(())
    }
}

fn cancelled(report: &RunReport) -> LifecycleError {
    tracing::warn!(run = %report.run_name, "Run cancelled in state {}", report.state());
    LifecycleError::Cancelled {
        state: report.state(),
    }
}

fn checkpoint(cancel: &CancellationToken, report: &RunReport) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(cancelled(report));
    }
    Ok(())
}
