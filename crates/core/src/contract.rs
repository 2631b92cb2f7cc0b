// SPDX-License-Identifier: MIT

//! The Watcher/Reactor plugin contract (spec §4.1). Both roles share the
//! same two-method shape; only the direction of `Endpoint::handle`'s event
//! flow differs, and that difference is carried by the role, not the trait.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Opaque config payload, passed verbatim from the daemon's config file to
/// `setup`/`accept`. Plugins and in-process implementations each parse the
/// shape they expect.
#[derive(Debug, Clone, Default)]
pub struct RawConfig(pub JsonValue);

impl RawConfig {
    pub fn null() -> Self {
        Self(JsonValue::Null)
    }

    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, SetupError> {
        serde_json::from_value(self.0.clone()).map_err(SetupError::BadConfig)
    }
}

/// Errors from `Setup`/`Accept`, fatal to the owning service's startup
/// (spec §4.1, §7).
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("actor rejected its configuration: {0}")]
    BadConfig(#[source] serde_json::Error),
    #[error("actor setup failed: {0}")]
    Rejected(String),
    #[error("plugin executable {0:?} not found")]
    ExecutableNotFound(std::path::PathBuf),
    #[error("plugin executable {0:?} is not a regular file")]
    NotARegularFile(std::path::PathBuf),
    #[error("plugin executable {0:?} is not executable")]
    NotExecutable(std::path::PathBuf),
    #[error("could not allocate a plugin socket: {0}")]
    SocketAllocation(#[source] std::io::Error),
    #[error("plugin process failed to start: {0}")]
    ProcessSpawn(#[source] std::io::Error),
    #[error("plugin did not signal readiness: {0}")]
    ReadinessFailed(#[source] std::io::Error),
    #[error("transport error talking to plugin: {0}")]
    Transport(#[from] crate::TransportError),
}

/// A running Watcher coroutine body, produced once per `accept`. Sends
/// events on `event_tx` until `close` fires, then returns — dropping
/// `event_tx` closes it, so there is no separate "close the event channel"
/// call to remember.
#[async_trait]
pub trait WatcherEndpoint: Send + Sync {
    async fn handle(&self, event_tx: tokio::sync::mpsc::Sender<crate::Event>, close: CloseSignal);
}

/// A running Reactor coroutine body. Receives events from `event_rx` until
/// it closes (upstream is done) or `close` fires. Never closes `event_rx`
/// itself — it only owns a receiver, which has no close method, so this
/// is enforced by the type system rather than by convention.
///
/// `event_rx` is always the output side of a `Merger`: the Service
/// topology places one in front of every reactor, and its receive-gated
/// delivery is what makes the coalesce-under-pressure guarantee (spec §4.2)
/// hold — a plain buffered channel would let one event slip through
/// unmerged before the reactor has asked for anything.
#[async_trait]
pub trait ReactorEndpoint: Send + Sync {
    async fn handle(&self, event_rx: crate::RendezvousReceiver<crate::Event>, close: CloseSignal);
}

/// Cooperative close signal: fires (once) when the owning `ManagedEndpoint`
/// wants this body to exit.
#[derive(Clone)]
pub struct CloseSignal {
    notify: std::sync::Arc<tokio::sync::Notify>,
    fired: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CloseSignal {
    pub fn new() -> (Self, CloseHandle) {
        let notify = std::sync::Arc::new(tokio::sync::Notify::new());
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        (Self { notify: notify.clone(), fired: fired.clone() }, CloseHandle { notify, fired })
    }

    /// Resolves once the close handle has fired. Safe to await repeatedly
    /// and from multiple tasks.
    pub async fn fired(&self) {
        if self.fired.load(std::sync::atomic::Ordering::Acquire) {
            return;
        }
        self.notify.notified().await;
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(std::sync::atomic::Ordering::Acquire)
    }
}

/// The close-out half, owned by `ManagedEndpoint`. `fire` is idempotent —
/// calling it twice is a no-op, satisfying the "Stop must be safe to call
/// multiple times" invariant. `Clone` because a `Service`'s failure hook
/// needs to fire the same handle from whichever endpoint's watcher task
/// notices trouble first.
#[derive(Clone)]
pub struct CloseHandle {
    notify: std::sync::Arc<tokio::sync::Notify>,
    fired: std::sync::Arc<std::sync::atomic::AtomicBool>,
}

impl CloseHandle {
    pub fn fire(&self) {
        if !self.fired.swap(true, std::sync::atomic::Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }
}

/// A watcher observes external membership changes and produces events.
#[async_trait]
pub trait Watcher: Send + Sync {
    async fn setup(&self, global_cfg: RawConfig) -> Result<(), SetupError>;
    async fn accept(&self, service_cfg: RawConfig) -> Result<std::sync::Arc<dyn WatcherEndpoint>, SetupError>;
}

/// A reactor consumes consolidated events and re-renders downstream state.
#[async_trait]
pub trait Reactor: Send + Sync {
    async fn setup(&self, global_cfg: RawConfig) -> Result<(), SetupError>;
    async fn accept(&self, service_cfg: RawConfig) -> Result<std::sync::Arc<dyn ReactorEndpoint>, SetupError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_signal_fire_is_idempotent() {
        let (_sig, handle) = CloseSignal::new();
        handle.fire();
        handle.fire();
    }

    #[tokio::test]
    async fn close_signal_observes_fire() {
        let (sig, handle) = CloseSignal::new();
        assert!(!sig.is_fired());
        handle.fire();
        sig.fired().await;
        assert!(sig.is_fired());
    }
}
