// SPDX-License-Identifier: MIT

//! `ManagedEndpoint`: wraps a Watcher or Reactor endpoint body with the
//! close-signal / done-signal lifecycle machinery spec §3/§4.2 describes.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use receptor_core::{CloseSignal, Event, ReactorEndpoint, RendezvousReceiver, WatcherEndpoint};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::error;

#[derive(Debug, Error)]
#[error("endpoint did not stop within its close timeout")]
pub struct HandlerWaitTimeout;

/// A running endpoint plus its lifecycle channels: `close` (signal-out,
/// fired at most once) and a `done` watch (signal-in, flips to `true` once
/// the endpoint body returns — by normal completion, close signal, or
/// caught panic, unconditionally).
pub struct ManagedEndpoint {
    name: String,
    close: receptor_core::CloseHandle,
    done_rx: watch::Receiver<bool>,
}

impl ManagedEndpoint {
    pub fn spawn_watcher(
        name: impl Into<String>,
        endpoint: Arc<dyn WatcherEndpoint>,
        event_tx: mpsc::Sender<Event>,
    ) -> Self {
        let name = name.into();
        let (close_signal, close_handle) = CloseSignal::new();
        let (done_tx, done_rx) = watch::channel(false);
        let task_name = name.clone();
        tokio::spawn(async move {
            let body = AssertUnwindSafe(endpoint.handle(event_tx, close_signal));
            if let Err(panic) = body.catch_unwind().await {
                error!(endpoint = %task_name, panic = ?panic_message(&panic), "watcher endpoint panicked");
            }
            let _ = done_tx.send(true);
        });
        Self { name, close: close_handle, done_rx }
    }

    pub fn spawn_reactor(
        name: impl Into<String>,
        endpoint: Arc<dyn ReactorEndpoint>,
        event_rx: RendezvousReceiver<Event>,
    ) -> Self {
        let name = name.into();
        let (close_signal, close_handle) = CloseSignal::new();
        let (done_tx, done_rx) = watch::channel(false);
        let task_name = name.clone();
        tokio::spawn(async move {
            let body = AssertUnwindSafe(endpoint.handle(event_rx, close_signal));
            if let Err(panic) = body.catch_unwind().await {
                error!(endpoint = %task_name, panic = ?panic_message(&panic), "reactor endpoint panicked");
            }
            let _ = done_tx.send(true);
        });
        Self { name, close: close_handle, done_rx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Signals the endpoint to exit. Idempotent — safe to call more than
    /// once (guarded inside `CloseHandle`).
    pub fn stop_signal(&self) {
        self.close.fire();
    }

    /// A cloned handle to this endpoint's done signal, for observing
    /// completion without taking ownership (used by `Service`'s failure
    /// hook, which must watch every endpoint concurrently).
    pub fn done_rx(&self) -> watch::Receiver<bool> {
        self.done_rx.clone()
    }

    pub fn is_done(&self) -> bool {
        *self.done_rx.borrow()
    }

    /// Signals close and waits up to `timeout` for the endpoint to finish.
    /// Takes `&self`, not `&mut self`: a `Service`'s failure hook and an
    /// external `RunningService::stop` both need to call this on the same
    /// endpoint from different tasks.
    pub async fn stop(&self, timeout: Duration) -> Result<(), HandlerWaitTimeout> {
        self.stop_signal();
        let mut done_rx = self.done_rx.clone();
        match tokio::time::timeout(timeout, done_rx.wait_for(|done| *done)).await {
            Ok(_) => Ok(()),
            Err(_) => Err(HandlerWaitTimeout),
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use receptor_core::NodeInfo;
    use receptor_core::NodeStatus;

    struct EchoOnceWatcher;

    #[async_trait]
    impl WatcherEndpoint for EchoOnceWatcher {
        async fn handle(&self, event_tx: mpsc::Sender<Event>, close: CloseSignal) {
            let ev = Event::with_node(NodeInfo::new("n1", NodeStatus::Up, "h", 1));
            let _ = event_tx.send(ev).await;
            close.fired().await;
        }
    }

    struct PanickingReactor;

    #[async_trait]
    impl ReactorEndpoint for PanickingReactor {
        async fn handle(&self, _event_rx: RendezvousReceiver<Event>, _close: CloseSignal) {
            panic!("boom");
        }
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_waits_for_done() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut ep = ManagedEndpoint::spawn_watcher("w1", Arc::new(EchoOnceWatcher), tx);
        let got = rx.recv().await.unwrap();
        assert_eq!(got.get("n1").unwrap().status(), NodeStatus::Up);

        ep.stop_signal();
        ep.stop_signal(); // idempotent
        assert!(ep.stop(Duration::from_secs(1)).await.is_ok());
        assert!(ep.is_done());
    }

    /// Spec §7 EndpointPanic: a panicking reactor body completes (done
    /// fires) rather than poisoning the task or the Service.
    #[tokio::test]
    async fn panic_in_reactor_body_is_caught_and_marks_done() {
        let (_tx, rx) = receptor_core::rendezvous::<Event>();
        let mut ep = ManagedEndpoint::spawn_reactor("r1", Arc::new(PanickingReactor), rx);
        assert!(ep.stop(Duration::from_secs(1)).await.is_ok());
        assert!(ep.is_done());
    }
}
