//! terraform CLI wrapper
//!
//! Wraps the terraform CLI commands needed to apply, read outputs from, and
//! destroy a module.
//!
//! A cancelled command is sent SIGINT first, which makes terraform finish
//! in-flight operations, persist state and release its lock. Only if it is
//! still running after the interrupt grace period is it killed.

use modcheck_core::{ProvisionError, ProvisionInputs, ProvisionOutputs};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default upper bound for a single terraform command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default time a cancelled command gets to exit after SIGINT
pub const DEFAULT_INTERRUPT_GRACE: Duration = Duration::from_secs(120);

type Result<T> = std::result::Result<T, ProvisionError>;

/// terraform CLI wrapper
#[derive(Debug, Clone)]
pub struct Terraform {
    binary: String,
    timeout: Duration,
    interrupt_grace: Duration,
}

impl Default for Terraform {
    fn default() -> Self {
        Self::new("terraform")
    }
}

impl Terraform {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            interrupt_grace: DEFAULT_INTERRUPT_GRACE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interrupt_grace(mut self, grace: Duration) -> Self {
        self.interrupt_grace = grace;
        self
    }

    pub fn interrupt_grace(&self) -> Duration {
        self.interrupt_grace
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Check that terraform is installed and return its version
    pub async fn version(&self) -> Result<TerraformVersion> {
        let args = strings(&["version", "-json"]);
        let output = self
            .run_command(None, &BTreeMap::new(), &args, &CancellationToken::new())
            .await?;
        let version: TerraformVersion = serde_json::from_str(&output)?;
        Ok(version)
    }

    /// Run a terraform command in the module directory and return stdout
    async fn run_command(
        &self,
        dir: Option<&std::path::Path>,
        env: &BTreeMap<String, String>,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.envs(env);
        cmd.env("TF_IN_AUTOMATION", "1");
        cmd.env("TF_INPUT", "0");
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches only us, so terraform
        // sees exactly one SIGINT (a second one makes it exit immediately)
        #[cfg(unix)]
        cmd.process_group(0);

        let command = format!("{} {}", self.binary, args.join(" "));
        tracing::debug!("Running: {}", command);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ProvisionError::NotInstalled(self.binary.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = self.wait(&mut child, &command, cancel).await?;

        let stdout = collect(stdout).await?;
        if !status.success() {
            return Err(ProvisionError::CommandFailed {
                command,
                status: status.code(),
                stderr: collect(stderr).await?,
                stdout,
            });
        }

        Ok(stdout)
    }

    /// Wait for `child` within the command timeout, interrupting it if
    /// `cancel` fires first
    async fn wait(
        &self,
        child: &mut Child,
        command: &str,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        let cancelled = tokio::select! {
            biased;
            status = child.wait() => return Ok(status?),
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.timeout) => false,
        };

        if !cancelled {
            tracing::warn!("{} timed out after {:?}, killing it", command, self.timeout);
            kill(child).await;
            return Err(ProvisionError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            });
        }

        if interrupt(child) {
            tracing::info!(
                "Interrupted {}, waiting up to {:?} for it to exit",
                command,
                self.interrupt_grace
            );
            match tokio::time::timeout(self.interrupt_grace, child.wait()).await {
                Ok(Ok(status)) => tracing::info!("{} exited after interrupt ({})", command, status),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    tracing::warn!(
                        "{} still running {:?} after interrupt, killing it",
                        command,
                        self.interrupt_grace
                    );
                    kill(child).await;
                }
            }
        } else {
            kill(child).await;
        }

        Err(ProvisionError::Interrupted {
            command: command.to_string(),
        })
    }

    async fn run_in_module(
        &self,
        inputs: &ProvisionInputs,
        args: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !inputs.module_dir.is_dir() {
            return Err(ProvisionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("module directory not found: {}", inputs.module_dir.display()),
            )));
        }
        self.run_command(Some(&inputs.module_dir), &inputs.env, &args, cancel).await
    }

    /// Run an arbitrary terraform subcommand in the module directory
    pub async fn run_raw(
        &self,
        inputs: &ProvisionInputs,
        args: &[&str],
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.run_in_module(inputs, strings(args), cancel).await
    }

    /// `terraform init`
    pub async fn init(&self, inputs: &ProvisionInputs, cancel: &CancellationToken) -> Result<()> {
        self.run_in_module(inputs, init_args(), cancel).await?;
        Ok(())
    }

    /// `terraform apply` with the inputs' variables
    pub async fn apply(&self, inputs: &ProvisionInputs, cancel: &CancellationToken) -> Result<()> {
        self.run_in_module(inputs, apply_args(inputs), cancel).await?;
        Ok(())
    }

    /// `terraform output -json`, flattened to strings
    pub async fn output_all(&self, inputs: &ProvisionInputs) -> Result<ProvisionOutputs> {
        let args = strings(&["output", "-json", "-no-color"]);
        let output = self
            .run_in_module(inputs, args, &CancellationToken::new())
            .await?;
        parse_outputs(&output)
    }

    /// `terraform destroy` with the inputs' variables. Never cancelled.
    pub async fn destroy(&self, inputs: &ProvisionInputs) -> Result<()> {
        let never = CancellationToken::new();
        self.run_in_module(inputs, destroy_args(inputs), &never).await?;
        Ok(())
    }
}

/// Drain a child pipe on its own task so a chatty command cannot block on a
/// full pipe while we wait for it
fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok(buf)
    })
}

async fn collect(reader: JoinHandle<std::io::Result<Vec<u8>>>) -> Result<String> {
    let bytes = reader.await.map_err(std::io::Error::other)??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Send SIGINT, terraform's graceful-stop signal. Returns false when the
/// child has already been reaped or the signal could not be delivered.
#[cfg(unix)]
fn interrupt(child: &Child) -> bool {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return false;
    };
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGINT) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!("Failed to send SIGINT to {}: {}", pid, e);
            false
        }
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) -> bool {
    false
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill child: {}", e);
    }
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

pub fn init_args() -> Vec<String> {
    strings(&["init", "-upgrade=false", "-input=false", "-no-color"])
}

pub fn apply_args(inputs: &ProvisionInputs) -> Vec<String> {
    let mut args = strings(&[
        "apply",
        "-auto-approve",
        "-input=false",
        "-lock=true",
        "-no-color",
    ]);
    args.extend(var_args(&inputs.vars));
    args
}

pub fn destroy_args(inputs: &ProvisionInputs) -> Vec<String> {
    let mut args = strings(&[
        "destroy",
        "-auto-approve",
        "-input=false",
        "-lock=true",
        "-no-color",
    ]);
    args.extend(var_args(&inputs.vars));
    args
}

/// `-var name=value` pairs. Strings are passed raw; everything else as JSON,
/// which terraform accepts for numbers, bools, lists and maps.
pub fn var_args(vars: &BTreeMap<String, serde_json::Value>) -> Vec<String> {
    vars.iter()
        .flat_map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ["-var".to_string(), format!("{}={}", key, value)]
        })
        .collect()
}

/// One entry of `terraform output -json`
#[derive(Debug, Deserialize)]
struct OutputEntry {
    value: serde_json::Value,
    #[serde(default)]
    sensitive: bool,
}

/// Parse `terraform output -json`. String values are kept as-is, other
/// values are carried as their JSON encoding.
pub fn parse_outputs(json: &str) -> Result<ProvisionOutputs> {
    if json.trim().is_empty() {
        return Ok(ProvisionOutputs::new());
    }

    let entries: BTreeMap<String, OutputEntry> = serde_json::from_str(json)?;
    Ok(entries
        .into_iter()
        .map(|(key, entry)| {
            if entry.sensitive {
                tracing::debug!("Output {} is sensitive", key);
            }
            let value = match entry.value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect())
}

/// `terraform version -json`
#[derive(Debug, Clone, Deserialize)]
pub struct TerraformVersion {
    pub terraform_version: String,
    #[serde(default)]
    pub platform: Option<String>,
}
