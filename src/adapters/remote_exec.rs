//! Command execution inside a single container

use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Status;
use kube::api::AttachParams;
use kube::{Api, Client};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::adapters::pod_lister::ContainerIdentity;
use crate::reconcilers::aggregate::MAX_OUTPUT_BYTES;

/// Why a command did not complete successfully in a container
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ExecFailure {
    /// The exec session could not be established or broke mid-stream
    #[error("connection failed: {0}")]
    Connection(String),
    /// The command ran and exited non-zero
    #[error("command exited with code {}: {}", exit_code_label(.code), .detail)]
    NonZeroExit { code: Option<i32>, detail: String },
    /// The command binary does not exist in the container
    #[error("command not found: {0}")]
    CommandNotFound(String),
    /// The command did not finish within its timeout
    #[error("timed out after {}", rounded_duration(.0))]
    TimedOut(Duration),
    /// The pass ran out of time before this container was reached
    #[error("not executed: pass deadline exceeded")]
    DeadlineExceeded,
    /// The pass was cancelled while the command was running
    #[error("cancelled")]
    Cancelled,
}

impl ExecFailure {
    /// Short label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ExecFailure::Connection(_) => "connection",
            ExecFailure::NonZeroExit { .. } => "non_zero_exit",
            ExecFailure::CommandNotFound(_) => "command_not_found",
            ExecFailure::TimedOut(_) => "timed_out",
            ExecFailure::DeadlineExceeded => "deadline_exceeded",
            ExecFailure::Cancelled => "cancelled",
        }
    }
}

/// Whole seconds when exact, otherwise whole milliseconds
fn rounded_duration(d: &Duration) -> String {
    if d.subsec_nanos() == 0 {
        format!("{}s", d.as_secs())
    } else {
        format!("{}ms", d.as_millis())
    }
}

fn exit_code_label(code: &Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Captured result of one execution
///
/// `stdout` holds whatever was read before a failure, so a command that ran
/// and then failed keeps its partial output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub error: Option<ExecFailure>,
}

impl ExecOutput {
    pub fn succeeded(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            error: None,
        }
    }

    pub fn failed(stdout: impl Into<String>, error: ExecFailure) -> Self {
        Self {
            stdout: stdout.into(),
            error: Some(error),
        }
    }
}

/// Runs a command inside one container
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` in `target`, giving up after `timeout` or when
    /// `cancel` fires
    async fn exec(
        &self,
        target: &ContainerIdentity,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ExecOutput;
}

/// RemoteExecutor using the pod `exec` subresource over websocket
pub struct KubeRemoteExecutor {
    client: Client,
}

impl KubeRemoteExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

enum Drain {
    Finished(std::io::Result<()>, Option<Status>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl RemoteExecutor for KubeRemoteExecutor {
    async fn exec(
        &self,
        target: &ContainerIdentity,
        command: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> ExecOutput {
        let argv = split_command(command);
        if argv.is_empty() {
            return ExecOutput::failed("", ExecFailure::CommandNotFound("empty command".into()));
        }

        let deadline = Instant::now() + timeout;
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &target.namespace);
        let params = AttachParams::default()
            .container(target.container_name.clone())
            .stdout(true)
            .stderr(true);

        debug!("Executing {:?} in {}/{}", argv, target.namespace, target);

        let mut attached = tokio::select! {
            res = tokio::time::timeout_at(deadline, pods.exec(&target.pod_name, argv, &params)) => {
                match res {
                    Ok(Ok(attached)) => attached,
                    Ok(Err(e)) => return ExecOutput::failed("", classify_connect_error(&e)),
                    Err(_) => return ExecOutput::failed("", ExecFailure::TimedOut(timeout)),
                }
            }
            _ = cancel.cancelled() => return ExecOutput::failed("", ExecFailure::Cancelled),
        };

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let stdout_reader = attached.stdout();
        let stderr_reader = attached.stderr();
        let status = attached.take_status();

        let drained = {
            let collect = async {
                let (out, err) = tokio::join!(
                    drain_into(stdout_reader, &mut stdout),
                    drain_into(stderr_reader, &mut stderr)
                );
                let status = match status {
                    Some(status) => status.await,
                    None => None,
                };
                Drain::Finished(out.and(err), status)
            };
            tokio::select! {
                drained = collect => drained,
                _ = tokio::time::sleep_until(deadline) => Drain::TimedOut,
                _ = cancel.cancelled() => Drain::Cancelled,
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        match drained {
            Drain::TimedOut => {
                attached.abort();
                ExecOutput::failed(stdout, ExecFailure::TimedOut(timeout))
            }
            Drain::Cancelled => {
                attached.abort();
                ExecOutput::failed(stdout, ExecFailure::Cancelled)
            }
            Drain::Finished(io, status) => {
                if let Ok(Err(e)) = tokio::time::timeout_at(deadline, attached.join()).await {
                    warn!("Exec session for {} closed with error: {}", target, e);
                }
                let failure = match (io, status) {
                    (Err(e), _) => Some(ExecFailure::Connection(format!("stream error: {}", e))),
                    (Ok(()), Some(status)) => classify_status(&status, &stderr),
                    (Ok(()), None) => Some(ExecFailure::Connection(
                        "exec stream closed without a status".to_string(),
                    )),
                };
                ExecOutput {
                    stdout,
                    error: failure,
                }
            }
        }
    }
}

/// Read a stream to its end, keeping at most one byte past `MAX_OUTPUT_BYTES`
///
/// The extra byte lets the report mark the output as truncated. Everything
/// beyond it is read and discarded so the remote side never blocks on a full
/// pipe.
async fn drain_into<R>(reader: Option<R>, buf: &mut Vec<u8>) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let limit = MAX_OUTPUT_BYTES + 1;
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..n.min(room)]);
    }
}

/// Split a command string into argv on whitespace
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

/// Classify the status returned on the exec error channel
///
/// Returns `None` for a successful run.
pub fn classify_status(status: &Status, stderr: &str) -> Option<ExecFailure> {
    if status.status.as_deref() == Some("Success") {
        return None;
    }

    let message = status.message.clone().unwrap_or_default();
    let code = status
        .details
        .as_ref()
        .and_then(|d| d.causes.as_ref())
        .and_then(|causes| {
            causes
                .iter()
                .find(|c| c.reason.as_deref() == Some("ExitCode"))
                .and_then(|c| c.message.as_deref())
                .and_then(|m| m.trim().parse::<i32>().ok())
        });

    let detail = if stderr.trim().is_empty() {
        message.clone()
    } else {
        stderr.trim().to_string()
    };

    if matches!(code, Some(126) | Some(127)) || is_not_found_message(&message) {
        return Some(ExecFailure::CommandNotFound(detail));
    }

    if code.is_some() || status.reason.as_deref() == Some("NonZeroExitCode") {
        return Some(ExecFailure::NonZeroExit { code, detail });
    }

    Some(ExecFailure::Connection(detail))
}

fn classify_connect_error(err: &kube::Error) -> ExecFailure {
    let message = err.to_string();
    if is_not_found_message(&message) {
        ExecFailure::CommandNotFound(message)
    } else {
        ExecFailure::Connection(message)
    }
}

fn is_not_found_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("executable file not found") || message.contains("no such file or directory")
}
