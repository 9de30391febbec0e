use async_trait::async_trait;
use modcheck_core::{
    DescribeError, LifecycleController, ProvisionError, ProvisionInputs, ProvisionOutputs,
    ProvisioningClient, ProvisioningEngine, ResourceDescriber, ResourceRecord, RetryConfig,
    RunTemplate, VerificationClient,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const REGION: &str = "us-west-1";
pub const ACCOUNT: &str = "123456789012";

/// What the mock module exposes as `repository_url`
#[allow(dead_code)]
pub enum OutputBehavior {
    /// `<account>.dkr.ecr.<region>.amazonaws.com/<name>`
    RegistryUrl,
    /// A fixed raw value
    Raw(String),
    /// Module declares no `repository_url`
    Missing,
}

pub fn command_failure(stderr: &str) -> ProvisionError {
    ProvisionError::CommandFailed {
        command: "terraform apply".to_string(),
        status: Some(1),
        stderr: stderr.to_string(),
        stdout: String::new(),
    }
}

pub struct MockEngine {
    pub apply_calls: AtomicU32,
    pub destroy_calls: AtomicU32,
    pub seen_inputs: Mutex<Vec<ProvisionInputs>>,
    /// Engine calls and wind-downs, in order
    pub events: Mutex<Vec<&'static str>>,
    apply_failures: Mutex<VecDeque<ProvisionError>>,
    apply_delay: Option<Duration>,
    output: OutputBehavior,
    destroy_failure: Option<String>,
}

#[allow(dead_code)]
impl MockEngine {
    pub fn new() -> Self {
        Self {
            apply_calls: AtomicU32::new(0),
            destroy_calls: AtomicU32::new(0),
            seen_inputs: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            apply_failures: Mutex::new(VecDeque::new()),
            apply_delay: None,
            output: OutputBehavior::RegistryUrl,
            destroy_failure: None,
        }
    }

    /// Fail the next apply calls with these errors, in order
    pub fn failing_apply(self, errors: Vec<ProvisionError>) -> Self {
        *self.apply_failures.lock().unwrap() = errors.into();
        self
    }

    pub fn slow_apply(mut self, delay: Duration) -> Self {
        self.apply_delay = Some(delay);
        self
    }

    pub fn with_output(mut self, output: OutputBehavior) -> Self {
        self.output = output;
        self
    }

    pub fn failing_destroy(mut self, stderr: &str) -> Self {
        self.destroy_failure = Some(stderr.to_string());
        self
    }

    pub fn applies(&self) -> u32 {
        self.apply_calls.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> u32 {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProvisioningEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn apply(
        &self,
        inputs: &ProvisionInputs,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_inputs.lock().unwrap().push(inputs.clone());
        self.events.lock().unwrap().push("apply");

        if let Some(delay) = self.apply_delay {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Give in-flight creates time to land in state
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    self.events.lock().unwrap().push("apply-wound-down");
                    return Err(ProvisionError::Interrupted {
                        command: "terraform apply".to_string(),
                    });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match self.apply_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn outputs(&self, inputs: &ProvisionInputs) -> Result<ProvisionOutputs, ProvisionError> {
        let mut outputs = ProvisionOutputs::new();
        outputs.insert("repository_arn", "arn:aws:ecr:us-west-1:123456789012:repository/x");

        match &self.output {
            OutputBehavior::RegistryUrl => {
                let name = inputs.resource_name().unwrap_or_default();
                let region = inputs.vars["region"].as_str().unwrap_or_default();
                outputs.insert(
                    "repository_url",
                    format!("{}.dkr.ecr.{}.amazonaws.com/{}", ACCOUNT, region, name),
                );
            }
            OutputBehavior::Raw(raw) => outputs.insert("repository_url", raw.clone()),
            OutputBehavior::Missing => {}
        }
        Ok(outputs)
    }

    async fn destroy(&self, _inputs: &ProvisionInputs) -> Result<(), ProvisionError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.events.lock().unwrap().push("destroy");
        match &self.destroy_failure {
            Some(stderr) => Err(ProvisionError::CommandFailed {
                command: "terraform destroy".to_string(),
                status: Some(1),
                stderr: stderr.clone(),
                stdout: String::new(),
            }),
            None => Ok(()),
        }
    }
}

/// What the mock provider answers
#[allow(dead_code)]
pub enum DescribeBehavior {
    /// One record named after the requested identifier
    Exists,
    Respond(Result<Vec<ResourceRecord>, DescribeError>),
}

pub struct MockDescriber {
    pub calls: AtomicU32,
    pub requested: Mutex<Vec<String>>,
    behavior: DescribeBehavior,
}

#[allow(dead_code)]
impl MockDescriber {
    pub fn new(behavior: DescribeBehavior) -> Self {
        Self {
            calls: AtomicU32::new(0),
            requested: Mutex::new(Vec::new()),
            behavior,
        }
    }

    pub fn describes(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceDescriber for MockDescriber {
    fn name(&self) -> &str {
        "mock-ecr"
    }

    async fn describe(&self, identifier: &str) -> Result<Vec<ResourceRecord>, DescribeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(identifier.to_string());

        match &self.behavior {
            DescribeBehavior::Exists => Ok(vec![
                ResourceRecord::new(identifier)
                    .with_owner_id(ACCOUNT)
                    .with_uri(format!(
                        "{}.dkr.ecr.{}.amazonaws.com/{}",
                        ACCOUNT, REGION, identifier
                    )),
            ]),
            DescribeBehavior::Respond(response) => response.clone(),
        }
    }
}

/// Controller wired to the mocks, retrying errors that mention throttling
pub fn controller(engine: Arc<MockEngine>, describer: Arc<MockDescriber>) -> LifecycleController {
    let retry = RetryConfig::default()
        .with_max_attempts(3)
        .with_delay(Duration::ZERO);
    let classifier = Arc::new(|e: &ProvisionError| e.diagnostic().contains("Throttling"));

    LifecycleController::new(
        RunTemplate::new("../", REGION),
        ProvisioningClient::new(engine).with_retry(retry, classifier),
        VerificationClient::new(describer),
    )
}
