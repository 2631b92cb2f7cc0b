// SPDX-License-Identifier: MIT

//! `Lookup`: plugin discovery, startup, and teardown (spec §4.9), grounded
//! in the Go original's `Lookup`/`NewLookup`/`Watcher`/`Reactor`/
//! `findExecutable`/`Cleanup` in `plugin/lookup.go`.
//!
//! Unlike the Go original's package-level `Watchers`/`Reactors` maps in
//! `receptor.go`, every lookup a daemon does goes through one `Lookup`
//! instance it owns — there is no global mutable plugin registry anywhere
//! in this crate.

use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use receptor_core::{Reactor, SetupError, Watcher};
use tracing::warn;

use crate::host::{ControlClient, RpcReactor, RpcWatcher};
use crate::process::PluginProcess;
use crate::socket::alloc_socket_path;

pub const FILE_WATCHER_PREFIX: &str = "receptor-watcher-";
pub const FILE_REACTOR_PREFIX: &str = "receptor-reactor-";

struct Started {
    process: PluginProcess,
    socket_path: PathBuf,
}

/// Looks up plugins by name under a single plugin directory, caches the
/// ones it has already started, and tears every one of them down together.
pub struct Lookup {
    plugin_path: PathBuf,
    watchers: Mutex<HashMap<String, Arc<dyn Watcher>>>,
    reactors: Mutex<HashMap<String, Arc<dyn Reactor>>>,
    started: Mutex<Vec<Started>>,
}

impl Lookup {
    pub fn new(plugin_path: impl Into<PathBuf>) -> Self {
        Self {
            plugin_path: plugin_path.into(),
            watchers: Mutex::new(HashMap::new()),
            reactors: Mutex::new(HashMap::new()),
            started: Mutex::new(Vec::new()),
        }
    }

    pub async fn watcher(&self, name: &str) -> Result<Arc<dyn Watcher>, SetupError> {
        if let Some(watcher) = self.watchers.lock().get(name).cloned() {
            return Ok(watcher);
        }
        let (control, socket_path) = self.start_plugin(FILE_WATCHER_PREFIX, name).await?;
        let watcher: Arc<dyn Watcher> = Arc::new(RpcWatcher::new(socket_path, control));
        self.watchers.lock().insert(name.to_string(), watcher.clone());
        Ok(watcher)
    }

    pub async fn reactor(&self, name: &str) -> Result<Arc<dyn Reactor>, SetupError> {
        if let Some(reactor) = self.reactors.lock().get(name).cloned() {
            return Ok(reactor);
        }
        let (control, socket_path) = self.start_plugin(FILE_REACTOR_PREFIX, name).await?;
        let reactor: Arc<dyn Reactor> = Arc::new(RpcReactor::new(socket_path, control));
        self.reactors.lock().insert(name.to_string(), reactor.clone());
        Ok(reactor)
    }

    async fn start_plugin(&self, prefix: &str, name: &str) -> Result<(Arc<ControlClient>, PathBuf), SetupError> {
        let executable = find_executable(&self.plugin_path, &format!("{prefix}{name}"))?;
        let socket_path = alloc_socket_path();
        let socket_arg = socket_path.to_string_lossy().into_owned();
        let process = PluginProcess::spawn(&executable, &["unix", &socket_arg], name).await?;
        let control = Arc::new(ControlClient::connect(&socket_path).await?);
        self.started.lock().push(Started { process, socket_path: socket_path.clone() });
        Ok((control, socket_path))
    }

    /// Kills every started plugin process and removes its socket, each
    /// step bounded by `timeout` but run in parallel, same tradeoff as the
    /// original: the whole cleanup can still take up to `timeout` even
    /// though every process is asked to stop at once.
    pub async fn cleanup(&self, timeout: Duration) {
        let started = std::mem::take(&mut *self.started.lock());
        let waiters = started.into_iter().map(|entry| async move {
            entry.process.stop();
            if tokio::time::timeout(timeout, entry.process.wait_done()).await.is_err() {
                warn!(plugin = entry.process.name(), "plugin process timed out during cleanup");
            }
            if let Err(err) = std::fs::remove_file(&entry.socket_path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(socket = %entry.socket_path.display(), %err, "could not remove plugin socket");
                }
            }
        });
        futures_util::future::join_all(waiters).await;
    }
}

fn find_executable(plugin_path: &Path, filename: &str) -> Result<PathBuf, SetupError> {
    let file_path = plugin_path.join(filename);
    let metadata = std::fs::metadata(&file_path).map_err(|_| SetupError::ExecutableNotFound(file_path.clone()))?;
    if !metadata.is_file() {
        return Err(SetupError::NotARegularFile(file_path));
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(SetupError::NotExecutable(file_path));
    }
    Ok(file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt as _;

    #[test]
    fn rejects_a_missing_executable() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_executable(dir.path(), "receptor-watcher-nope").unwrap_err();
        assert!(matches!(err, SetupError::ExecutableNotFound(_)));
    }

    #[test]
    fn rejects_a_non_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receptor-watcher-dummy");
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o644);
        std::fs::set_permissions(&path, perms).unwrap();

        let err = find_executable(dir.path(), "receptor-watcher-dummy").unwrap_err();
        assert!(matches!(err, SetupError::NotExecutable(_)));
    }

    #[test]
    fn accepts_an_executable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receptor-watcher-dummy");
        std::fs::write(&path, b"#!/bin/sh\necho ready\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();

        assert!(find_executable(dir.path(), "receptor-watcher-dummy").is_ok());
    }
}
