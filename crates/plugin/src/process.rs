// SPDX-License-Identifier: MIT

//! `PluginProcess`: the lifecycle of one spawned plugin binary, grounded in
//! the Go original's `Process`/`NewProcess`/`Start`/`Wait`/`WaitCh`/`Stop`
//! in `plugin/process.go`.
//!
//! Readiness is the same handshake as the original: the plugin writes one
//! line to stdout once its listener is bound ("Plugin socket: ..." in the
//! Go original; ours doesn't need to parse the line's content since the
//! host already chose the socket path, only that the line arrived at all).
//! Every later stdout/stderr line is re-emitted through `tracing` tagged
//! with the plugin's name, same as the original's `[Plugin name] ...` log
//! lines.

use std::process::Stdio;

use receptor_core::{CloseSignal, SetupError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub struct PluginProcess {
    actor_name: String,
    stop_tx: mpsc::Sender<()>,
    done: CloseSignal,
}

impl PluginProcess {
    /// Spawns `path args...`, then blocks until the plugin signals
    /// readiness by writing its first stdout line.
    pub async fn spawn(path: &std::path::Path, args: &[&str], actor_name: impl Into<String>) -> Result<Self, SetupError> {
        let actor_name = actor_name.into();
        let mut cmd = Command::new(path);
        cmd.args(args).stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn().map_err(SetupError::ProcessSpawn)?;

        let missing_stdio = || {
            std::io::Error::new(std::io::ErrorKind::Other, "spawned plugin process has no piped stdio")
        };
        let mut stdout = BufReader::new(
            child.stdout.take().ok_or_else(missing_stdio).map_err(SetupError::ReadinessFailed)?,
        );
        let mut readiness_line = String::new();
        if stdout.read_line(&mut readiness_line).await.map_err(SetupError::ReadinessFailed)? == 0 {
            let _ = child.start_kill();
            return Err(SetupError::ReadinessFailed(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "plugin exited before signalling readiness",
            )));
        }
        info!(plugin = %actor_name, line = readiness_line.trim(), "plugin ready");

        let stderr = BufReader::new(
            child.stderr.take().ok_or_else(missing_stdio).map_err(SetupError::ReadinessFailed)?,
        );

        let (stop_tx, mut stop_rx) = mpsc::channel(1);
        let (done_signal, done_handle) = CloseSignal::new();
        let task_name = actor_name.clone();

        tokio::spawn(copy_lines(stdout, task_name.clone()));
        tokio::spawn(copy_lines(stderr, task_name.clone()));

        tokio::spawn(async move {
            tokio::select! {
                status = child.wait() => {
                    match status {
                        Ok(status) => info!(plugin = %task_name, %status, "plugin process exited"),
                        Err(err) => error!(plugin = %task_name, %err, "failed to wait on plugin process"),
                    }
                }
                _ = stop_rx.recv() => {
                    if let Err(err) = child.start_kill() {
                        warn!(plugin = %task_name, %err, "failed to kill plugin process");
                    }
                    let _ = child.wait().await;
                    info!(plugin = %task_name, "plugin process stopped");
                }
            }
            done_handle.fire();
        });

        Ok(Self { actor_name, stop_tx, done: done_signal })
    }

    pub fn name(&self) -> &str {
        &self.actor_name
    }

    /// Kills the process. Idempotent — a second call just fails to send on
    /// an already-drained channel, which is silently ignored.
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    pub async fn wait_done(&self) {
        self.done.fired().await;
    }
}

async fn copy_lines<R: tokio::io::AsyncBufRead + Unpin>(mut reader: R, actor_name: String) {
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => info!(plugin = %actor_name, "{}", line.trim_end()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn spawns_and_signals_done_after_stop() {
        let proc = PluginProcess::spawn(
            std::path::Path::new("/bin/sh"),
            &["-c", "echo ready; sleep 30"],
            "test-plugin",
        )
        .await
        .unwrap();

        proc.stop();
        tokio::time::timeout(Duration::from_secs(5), proc.wait_done()).await.unwrap();
    }

    #[tokio::test]
    async fn natural_exit_also_signals_done() {
        let proc =
            PluginProcess::spawn(std::path::Path::new("/bin/sh"), &["-c", "echo ready"], "test-plugin").await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), proc.wait_done()).await.unwrap();
    }

    #[tokio::test]
    async fn missing_readiness_line_is_an_error() {
        let result =
            PluginProcess::spawn(std::path::Path::new("/bin/sh"), &["-c", "exit 0"], "test-plugin").await;
        assert!(result.is_err());
    }
}
