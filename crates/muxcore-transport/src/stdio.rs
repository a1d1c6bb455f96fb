//! Child-process transport: newline-delimited JSON over stdin/stdout.

use crate::Transport;
use crate::error::{TransportError, TransportResult};
use crate::framing::ndjson_framed;
use crate::handle::TransportHandle;
use crate::spec::TransportLimits;
use async_trait::async_trait;
use muxcore_core::Deadline;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// A tool server reached by launching it as a child process and speaking
/// newline-delimited JSON over its stdin/stdout pipes.
#[derive(Debug)]
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    limits: TransportLimits,
}

impl StdioTransport {
    /// Build a transport for the given command.
    #[must_use]
    pub fn new(
        command: String,
        args: Vec<String>,
        env: Vec<(String, String)>,
        limits: TransportLimits,
    ) -> Self {
        Self {
            command,
            args,
            env,
            limits,
        }
    }

    fn spawn_child(&self) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(self.env.iter().cloned())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        cmd.spawn()
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn open(&self, deadline: Deadline) -> TransportResult<TransportHandle> {
        if deadline.is_expired() {
            return Err(TransportError::Unavailable(format!(
                "connect deadline already elapsed before spawning `{}`",
                self.command
            )));
        }

        let mut child = self.spawn_child().map_err(|e| {
            TransportError::Unavailable(format!("failed to spawn `{}`: {e}", self.command))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Unavailable("child stdin not piped".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Unavailable("child stdout not piped".into()))?;
        let stderr = child.stderr.take();

        if let Some(stderr) = stderr {
            tokio::spawn(drain_stderr(stderr, self.command.clone()));
        }

        // Keep the child alive for the lifetime of the transport; once the
        // handle (and its reader/writer tasks) are dropped, `kill_on_drop`
        // reaps the process.
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(%status, "stdio transport child exited"),
                Err(e) => warn!(error = %e, "failed to wait on stdio transport child"),
            }
        });

        let (stream, sink) = ndjson_framed(stdout, stdin);
        Ok(TransportHandle::spawn(
            stream,
            sink,
            self.limits.outbound_high_water_mark,
        ))
    }
}

async fn drain_stderr(stderr: tokio::process::ChildStderr, server: String) {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(server = %server, stderr = %line, "tool server stderr");
    }
}
