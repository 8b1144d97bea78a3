use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use super::{Request, Response, Transport};
use crate::error::{InvocationError, Result};

/// How to launch the engine bridge.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ProcessConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Talks to a bridge process over its stdin/stdout: one JSON request per
/// line out, one JSON response per line back. The child is killed when
/// the transport is dropped.
pub struct ProcessTransport {
    child: Child,
    /// Closed after `Exit` so the bridge sees end of input.
    stdin: Option<ChildStdin>,
    lines: Lines<BufReader<ChildStdout>>,
}

impl ProcessTransport {
    pub fn spawn(config: &ProcessConfig) -> Result<Self> {
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            InvocationError::disconnected(format!(
                "failed to start bridge '{}': {e}",
                config.program
            ))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| InvocationError::disconnected("bridge stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| InvocationError::disconnected("bridge stdout unavailable"))?;

        tracing::debug!(program = %config.program, pid = ?child.id(), "bridge started");

        Ok(Self {
            child,
            stdin: Some(stdin),
            lines: BufReader::new(stdout).lines(),
        })
    }

    async fn finish(&mut self) -> Result<()> {
        self.stdin = None;
        let status = self.child.wait().await?;
        tracing::debug!(%status, "bridge finished");
        Ok(())
    }
}

#[async_trait]
impl Transport for ProcessTransport {
    async fn send(&mut self, request: Request) -> Result<Response> {
        let exiting = matches!(request, Request::Exit);

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| InvocationError::disconnected("bridge input already closed"))?;

        let mut line = serde_json::to_string(&request)?;
        line.push('\n');
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        match self.lines.next_line().await? {
            Some(reply) => {
                let response: Response = serde_json::from_str(reply.trim()).map_err(|e| {
                    InvocationError::protocol(format!("unreadable bridge reply: {e}"))
                })?;
                if exiting {
                    self.finish().await?;
                }
                Ok(response)
            }
            // A bridge that closes its output while exiting did what was asked.
            None if exiting => {
                self.finish().await?;
                Ok(Response::Exited)
            }
            None => {
                tracing::warn!("bridge closed its output");
                Err(InvocationError::disconnected("bridge closed its output"))
            }
        }
    }

    fn abort(&mut self) {
        self.stdin = None;
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "bridge already gone");
        }
        tracing::warn!("bridge killed after an abandoned request");
    }
}
