// SPDX-License-Identifier: MIT

//! `Service`: assembles watchers and reactors into the running pipeline
//! topology (spec §4.6), grounded in the Go original's `Service`/
//! `NewService`/`AddReactorEndpoint`/`AddWatcherEndpoint`/`Start`/`Stop`.
//!
//! The topology is unchanged from the original: a `Forwarder` fans every
//! watcher's events into one shared channel, a `Broadcaster` fans that out
//! to one channel per reactor, and each reactor's channel passes through
//! its own `Merger` before the reactor ever sees it.
//!
//! Two deliberate departures from the Go original, both spelled out in the
//! spec's Open Questions:
//!
//! - `RunningService::stop` stops every endpoint in parallel rather than
//!   watchers-then-reactors sequentially. Nothing in the topology depends
//!   on stop order once every endpoint has its own close signal, and
//!   parallel stop bounds total shutdown time by the slowest endpoint
//!   instead of the sum of all of them.
//! - Any endpoint completing on its own — a watcher's natural end of
//!   stream, a reactor returning, or a caught panic — counts as the
//!   service failing, unless that completion was caused by `stop` itself.
//!   The Go original has no equivalent signal; a daemon with multiple
//!   services needs one to know when a service has gone quiet for reasons
//!   other than being told to.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::select_all;
use receptor_core::{CloseSignal, ReactorEndpoint, WatcherEndpoint};
use tokio::sync::mpsc;

use crate::broadcaster::broadcaster;
use crate::endpoint::{HandlerWaitTimeout, ManagedEndpoint};
use crate::forwarder::Forwarder;
use crate::merger::merger;

/// Builder for a service's topology. Not itself running; call `start` to
/// wire everything up and spawn it.
pub struct Service {
    name: String,
    watchers: Vec<(String, Arc<dyn WatcherEndpoint>)>,
    reactors: Vec<(String, Arc<dyn ReactorEndpoint>)>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), watchers: Vec::new(), reactors: Vec::new() }
    }

    pub fn add_watcher(&mut self, name: impl Into<String>, endpoint: Arc<dyn WatcherEndpoint>) {
        self.watchers.push((name.into(), endpoint));
    }

    pub fn add_reactor(&mut self, name: impl Into<String>, endpoint: Arc<dyn ReactorEndpoint>) {
        self.reactors.push((name.into(), endpoint));
    }

    /// Wires the topology and spawns every endpoint. Does not block.
    pub fn start(self) -> RunningService {
        let (event_tx, event_rx) = mpsc::channel(1);
        let mut forwarder = Forwarder::new(event_tx);

        let mut out_txs = Vec::with_capacity(self.reactors.len());
        let mut endpoints = Vec::with_capacity(self.watchers.len() + self.reactors.len());

        for (name, endpoint) in self.reactors {
            let (out_tx, out_rx) = mpsc::channel(1);
            out_txs.push(out_tx);
            let merged_rx = merger(out_rx);
            endpoints.push(ManagedEndpoint::spawn_reactor(name, endpoint, merged_rx));
        }

        broadcaster(event_rx, out_txs);

        for (name, endpoint) in self.watchers {
            let (watcher_tx, watcher_rx) = mpsc::channel(1);
            forwarder.forward(watcher_rx);
            endpoints.push(ManagedEndpoint::spawn_watcher(name, endpoint, watcher_tx));
        }

        forwarder.wait_close();

        RunningService::new(self.name, endpoints)
    }
}

/// A live service: its endpoints are all spawned and running. Tracks two
/// independent signals — `failed` (something ended on its own) and `done`
/// (every endpoint has finished, which `stop` causes deliberately).
pub struct RunningService {
    name: String,
    endpoints: Arc<Vec<ManagedEndpoint>>,
    stopping: Arc<AtomicBool>,
    failed: CloseSignal,
    done: CloseSignal,
}

impl RunningService {
    fn new(name: String, endpoints: Vec<ManagedEndpoint>) -> Self {
        let endpoints = Arc::new(endpoints);
        let stopping = Arc::new(AtomicBool::new(false));
        let (failed_signal, failed_handle) = CloseSignal::new();
        let (done_signal, done_handle) = CloseSignal::new();

        if !endpoints.is_empty() {
            let watch_endpoints = endpoints.clone();
            let watch_stopping = stopping.clone();
            tokio::spawn(async move {
                let waiters = watch_endpoints.iter().map(|ep| {
                    let mut done_rx = ep.done_rx();
                    Box::pin(async move {
                        let _ = done_rx.wait_for(|done| *done).await;
                    }) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>
                });
                select_all(waiters).await;
                if !watch_stopping.load(Ordering::Acquire) {
                    failed_handle.fire();
                    for ep in watch_endpoints.iter() {
                        ep.stop_signal();
                    }
                }
            });
        } else {
            // A service with no endpoints has nothing left to fail; treat
            // it as immediately failed so callers don't wait forever.
            failed_handle.fire();
        }

        {
            let done_endpoints = endpoints.clone();
            tokio::spawn(async move {
                for ep in done_endpoints.iter() {
                    let mut done_rx = ep.done_rx();
                    let _ = done_rx.wait_for(|done| *done).await;
                }
                done_handle.fire();
            });
        }

        Self { name, endpoints, stopping, failed: failed_signal, done: done_signal }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the first time an endpoint completes for a reason other
    /// than `stop` having been called.
    pub async fn failed(&self) {
        self.failed.fired().await;
    }

    /// Resolves once every endpoint has finished, by any means.
    pub async fn wait_done(&self) {
        self.done.fired().await;
    }

    /// Signals every endpoint to stop and waits, in parallel, for each to
    /// finish within `timeout`. Returns the names of endpoints that missed
    /// their deadline, if any.
    pub async fn stop(&self, timeout: Duration) -> Result<(), Vec<String>> {
        self.stopping.store(true, Ordering::Release);
        let results = futures_util::future::join_all(
            self.endpoints.iter().map(|ep| async move { (ep.name().to_string(), ep.stop(timeout).await) }),
        )
        .await;
        let missed: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(()) => None,
                Err(HandlerWaitTimeout) => Some(name),
            })
            .collect();
        if missed.is_empty() {
            Ok(())
        } else {
            Err(missed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use receptor_core::{CloseSignal as EndpointCloseSignal, Event, NodeInfo, NodeStatus, RendezvousReceiver};
    use tokio::sync::mpsc::Sender;

    struct OnceWatcher {
        node: String,
    }

    #[async_trait]
    impl WatcherEndpoint for OnceWatcher {
        async fn handle(&self, event_tx: Sender<Event>, close: EndpointCloseSignal) {
            let ev = Event::with_node(NodeInfo::new(&self.node, NodeStatus::Up, "h", 1));
            let _ = event_tx.send(ev).await;
            close.fired().await;
        }
    }

    struct CollectingReactor {
        seen: Arc<parking_lot::Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl ReactorEndpoint for CollectingReactor {
        async fn handle(&self, mut event_rx: RendezvousReceiver<Event>, close: EndpointCloseSignal) {
            loop {
                tokio::select! {
                    ev = event_rx.recv() => {
                        match ev {
                            Some(ev) => self.seen.lock().push(ev),
                            None => return,
                        }
                    }
                    _ = close.fired() => return,
                }
            }
        }
    }

    struct ImmediateReactor;

    #[async_trait]
    impl ReactorEndpoint for ImmediateReactor {
        async fn handle(&self, _event_rx: RendezvousReceiver<Event>, _close: EndpointCloseSignal) {}
    }

    #[tokio::test]
    async fn wires_watcher_events_through_to_reactor() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut svc = Service::new("svc1");
        svc.add_watcher("w1", Arc::new(OnceWatcher { node: "n1".to_string() }));
        svc.add_reactor("r1", Arc::new(CollectingReactor { seen: seen.clone() }));

        let running = svc.start();

        // Give the watcher -> forwarder -> broadcaster -> merger -> reactor
        // chain a few scheduling turns to carry the single event through.
        for _ in 0..20 {
            tokio::task::yield_now().await;
            if !seen.lock().is_empty() {
                break;
            }
        }
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(seen.lock()[0].get("n1").unwrap().status(), NodeStatus::Up);

        assert!(running.stop(Duration::from_secs(1)).await.is_ok());
        running.wait_done().await;
    }

    /// A reactor that returns on its own (not via `stop`) must flip `failed`.
    #[tokio::test]
    async fn unexpected_endpoint_completion_marks_service_failed() {
        let mut svc = Service::new("svc2");
        svc.add_reactor("r1", Arc::new(ImmediateReactor));
        let running = svc.start();

        running.failed().await;
        running.wait_done().await;
    }

    /// Stopping deliberately must not also flip `failed`.
    #[tokio::test]
    async fn deliberate_stop_does_not_mark_service_failed() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut svc = Service::new("svc3");
        svc.add_reactor("r1", Arc::new(CollectingReactor { seen }));
        let running = svc.start();

        assert!(running.stop(Duration::from_secs(1)).await.is_ok());
        running.wait_done().await;

        // failed() must not have fired: give it a moment, then confirm it's
        // still unresolved by racing it against a short timeout.
        let raced = tokio::time::timeout(Duration::from_millis(50), running.failed()).await;
        assert!(raced.is_err(), "failed() resolved after a deliberate stop");
    }
}
