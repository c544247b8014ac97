use crate::domain::model::{ActionRequest, Actuation};
use crate::domain::ports::Actuator;
use crate::utils::error::{AgentError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Logs every action and reports it unverified.
#[derive(Debug, Clone, Default)]
pub struct DryRunActuator;

#[async_trait]
impl Actuator for DryRunActuator {
    async fn perform(&self, request: &ActionRequest) -> Result<Actuation> {
        tracing::info!(
            "🔍 DRY RUN - {:?} from ({}, {}) to ({}, {}), motion {}ms, hover {}",
            request.method,
            request.origin.x,
            request.origin.y,
            request.destination.x,
            request.destination.y,
            request.motion_ms,
            request.hover.is_some()
        );
        Ok(Actuation::Unverified)
    }
}

/// Hands the request, as JSON on stdin, to an external pointer helper.
///
/// The helper's first stdout word decides the report: `landed` or
/// `missed`; anything else on a zero exit status is unverified. A non-zero
/// exit status is an actuation error.
#[derive(Debug, Clone)]
pub struct CommandActuator {
    program: String,
    args: Vec<String>,
}

impl CommandActuator {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Actuator for CommandActuator {
    async fn perform(&self, request: &ActionRequest) -> Result<Actuation> {
        let payload = serde_json::to_vec(request)?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::ActuationError {
                message: format!("cannot start {}: {}", self.program, e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(AgentError::ActuationError {
                message: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = match stdout.split_whitespace().next().map(str::to_ascii_lowercase).as_deref() {
            Some("landed") => Actuation::Landed,
            Some("missed") => Actuation::Missed,
            _ => Actuation::Unverified,
        };
        tracing::debug!(?report, "actuator helper finished");
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{DevicePoint, MoveMethod};

    fn request() -> ActionRequest {
        ActionRequest {
            origin: DevicePoint::new(550, 750),
            destination: DevicePoint::new(550, 550),
            method: MoveMethod::Drag,
            pre_delay_ms: 0,
            motion_ms: 400,
            settle_ms: 200,
            jitter_radius: 3,
            hover: None,
        }
    }

    #[tokio::test]
    async fn test_dry_run_is_unverified() {
        assert_eq!(DryRunActuator.perform(&request()).await.unwrap(), Actuation::Unverified);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_reports() {
        let sh = |script: &str| CommandActuator::new("sh", vec!["-c".to_string(), script.to_string()]);

        let landed = sh("cat > /dev/null; echo landed");
        assert_eq!(landed.perform(&request()).await.unwrap(), Actuation::Landed);

        let missed = sh("cat > /dev/null; echo MISSED by 3px");
        assert_eq!(missed.perform(&request()).await.unwrap(), Actuation::Missed);

        let silent = sh("cat > /dev/null");
        assert_eq!(silent.perform(&request()).await.unwrap(), Actuation::Unverified);

        let failing = sh("cat > /dev/null; echo boom >&2; exit 4");
        assert!(matches!(
            failing.perform(&request()).await,
            Err(AgentError::ActuationError { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_helper_receives_json() {
        let echo = CommandActuator::new(
            "sh",
            vec!["-c".to_string(), "grep -q '\"method\":\"drag\"' && echo landed".to_string()],
        );
        assert_eq!(echo.perform(&request()).await.unwrap(), Actuation::Landed);
    }
}
