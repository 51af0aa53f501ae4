//! Bounded invocation of the device-control utility

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::error::ExecError;
use crate::config::ToolConfig;

/// Runs the utility with an argument list and returns its stdout
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<String, ExecError>;
}

/// [`CommandRunner`] backed by a local program
///
/// Each call spawns the program once. A run that outlives `timeout` is killed
/// and reported as [`ExecError::Timeout`]; no retries happen here.
#[derive(Debug, Clone)]
pub struct SysfsTool {
    program: String,
    timeout: Duration,
}

impl SysfsTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.program.clone(), config.timeout())
    }

    fn launch_error(&self, source: std::io::Error) -> ExecError {
        ExecError::Launch {
            program: self.program.clone(),
            source,
        }
    }
}

#[async_trait]
impl CommandRunner for SysfsTool {
    async fn run(&self, args: &[String]) -> Result<String, ExecError> {
        debug!("Executing {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.launch_error(e))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| self.launch_error(e))?,
            Err(_) => {
                warn!("{} did not finish within {:?}", self.program, self.timeout);
                return Err(ExecError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(ExecError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no error output".to_string()
                } else {
                    stderr
                },
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("Command response received: {:?}", stdout);
        Ok(stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn captures_stdout_on_success() {
        let tool = SysfsTool::new("echo", Duration::from_secs(5));
        let stdout = tool.run(&args(&["show", "gpiob/din0"])).await.unwrap();
        assert_eq!(stdout, "show gpiob/din0\n");
    }

    #[tokio::test]
    async fn nonzero_exit_carries_tool_error_text() {
        let tool = SysfsTool::new("sh", Duration::from_secs(5));
        let err = tool
            .run(&args(&["-c", "echo 'no such object' >&2; exit 3"]))
            .await
            .unwrap_err();

        match &err {
            ExecError::Failed { status, stderr, .. } => {
                assert!(status.contains('3'), "unexpected status {}", status);
                assert_eq!(stderr, "no such object");
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(err.to_string().contains("no such object"));
    }

    #[tokio::test]
    async fn silent_failure_still_reports_status() {
        let tool = SysfsTool::new("false", Duration::from_secs(5));
        let err = tool.run(&[]).await.unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }));
        assert!(err.to_string().contains("no error output"));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let tool = SysfsTool::new("mtsio-bridge-no-such-program", Duration::from_secs(5));
        let err = tool.run(&args(&["show", "gpiob/din0"])).await.unwrap_err();
        assert!(matches!(err, ExecError::Launch { .. }));
    }

    #[tokio::test]
    async fn hung_program_times_out() {
        let tool = SysfsTool::new("sleep", Duration::from_millis(100));
        let started = std::time::Instant::now();
        let err = tool.run(&args(&["5"])).await.unwrap_err();
        assert!(matches!(err, ExecError::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
