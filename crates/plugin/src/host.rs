// SPDX-License-Identifier: MIT

//! Host side of the plugin transport: dials a plugin's control socket and
//! exposes it as an ordinary `Watcher`/`Reactor`, grounded in the Go
//! original's `RPCWatcher`/`RPCWatcherEndpoint` (`plugin/watcherclient.go`)
//! and `RPCReactor`/`RPCReactorEndpoint` (`plugin/reactorclient.go`).
//!
//! `ControlClient` is this module's one real addition over the Go
//! original. `net/rpc` multiplexes concurrent calls over a connection by
//! sequence number internally; since nothing in `std`/`tokio` gives us
//! that for free, `ControlClient` reimplements the same idea directly: a
//! background reader task dispatches each `RpcResponse` to whichever
//! pending call is waiting on its `seq`, so a long-blocked `Handle` call
//! and a later `CloseHandle` call can share one connection exactly like
//! the original's client does.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use receptor_core::{
    CloseSignal, Event, Reactor, ReactorEndpoint, RendezvousReceiver, SetupError, TransportError, Watcher,
    WatcherEndpoint,
};
use receptor_wire::{read_frame, write_frame, RpcArg, RpcMethod, RpcOutcome, RpcReply, RpcRole, SessionId, WireEvent};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tracing::error;

type Pending = Arc<SyncMutex<HashMap<u64, oneshot::Sender<RpcOutcome>>>>;

/// One multiplexed control connection to a plugin. Shared (`Arc`) between
/// the `Watcher`/`Reactor` handle and every endpoint it hands out, since
/// `Handle`/`CloseHandle` calls on a session outlive `accept` returning.
pub struct ControlClient {
    writer: AsyncMutex<tokio::net::unix::OwnedWriteHalf>,
    pending: Pending,
    next_seq: AtomicU64,
}

impl ControlClient {
    pub async fn connect(socket_path: &Path) -> Result<Self, TransportError> {
        let stream = UnixStream::connect(socket_path).await.map_err(TransportError::Io)?;
        let (mut read_half, write_half) = stream.into_split();
        let pending: Pending = Arc::new(SyncMutex::new(HashMap::new()));

        let reader_pending = pending.clone();
        tokio::spawn(async move {
            loop {
                match read_frame::<_, receptor_wire::RpcResponse>(&mut read_half).await {
                    Ok(resp) => {
                        if let Some(tx) = reader_pending.lock().remove(&resp.seq) {
                            let _ = tx.send(resp.outcome);
                        }
                    }
                    Err(_) => {
                        for (_, tx) in reader_pending.lock().drain() {
                            let _ = tx.send(RpcOutcome::Err("control connection closed".to_string()));
                        }
                        return;
                    }
                }
            }
        });

        Ok(Self { writer: AsyncMutex::new(write_half), pending, next_seq: AtomicU64::new(1) })
    }

    pub async fn call(&self, role: RpcRole, method: RpcMethod, arg: RpcArg) -> Result<RpcReply, TransportError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(seq, tx);

        let request = receptor_wire::RpcRequest { seq, role, method, arg };
        {
            let mut writer = self.writer.lock().await;
            if let Err(err) = write_frame(&mut *writer, &request).await {
                self.pending.lock().remove(&seq);
                return Err(err.into());
            }
        }

        match rx.await {
            Ok(RpcOutcome::Ok(reply)) => Ok(reply),
            Ok(RpcOutcome::Err(reason)) => {
                Err(TransportError::RpcFailed { method: format!("{method:?}"), reason })
            }
            Err(_) => Err(TransportError::Eof),
        }
    }
}

/// A watcher or reactor exposed by an out-of-process plugin.
pub struct RpcWatcher {
    socket_path: PathBuf,
    control: Arc<ControlClient>,
}

impl RpcWatcher {
    pub fn new(socket_path: PathBuf, control: Arc<ControlClient>) -> Self {
        Self { socket_path, control }
    }
}

#[async_trait]
impl Watcher for RpcWatcher {
    async fn setup(&self, global_cfg: receptor_core::RawConfig) -> Result<(), SetupError> {
        self.control.call(RpcRole::Watcher, RpcMethod::Setup, RpcArg::Config(global_cfg.0)).await?;
        Ok(())
    }

    async fn accept(&self, service_cfg: receptor_core::RawConfig) -> Result<Arc<dyn WatcherEndpoint>, SetupError> {
        let reply = self.control.call(RpcRole::Watcher, RpcMethod::Accept, RpcArg::Config(service_cfg.0)).await?;
        let session = expect_session(reply)?;
        Ok(Arc::new(RpcWatcherEndpoint { socket_path: self.socket_path.clone(), control: self.control.clone(), session }))
    }
}

struct RpcWatcherEndpoint {
    socket_path: PathBuf,
    control: Arc<ControlClient>,
    session: SessionId,
}

#[async_trait]
impl WatcherEndpoint for RpcWatcherEndpoint {
    async fn handle(&self, event_tx: mpsc::Sender<Event>, close: CloseSignal) {
        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(session = self.session, %err, "could not dial plugin event socket");
                return;
            }
        };
        let (mut read_half, mut write_half) = stream.into_split();
        if let Err(err) = write_frame(&mut write_half, &self.session).await {
            error!(session = self.session, %err, "could not send session handshake");
            return;
        }

        let event_task = tokio::spawn(async move {
            loop {
                match read_frame::<_, WireEvent>(&mut read_half).await {
                    Ok(wire_event) => {
                        let event: Event = (&wire_event).into();
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => return,
                }
            }
        });

        let close_task = {
            let control = self.control.clone();
            let session = self.session;
            let close = close.clone();
            tokio::spawn(async move {
                close.fired().await;
                let _ = control.call(RpcRole::Watcher, RpcMethod::CloseHandle, RpcArg::Session(session)).await;
            })
        };

        let _ = self.control.call(RpcRole::Watcher, RpcMethod::Handle, RpcArg::Session(self.session)).await;
        event_task.abort();
        close_task.abort();
    }
}

pub struct RpcReactor {
    socket_path: PathBuf,
    control: Arc<ControlClient>,
}

impl RpcReactor {
    pub fn new(socket_path: PathBuf, control: Arc<ControlClient>) -> Self {
        Self { socket_path, control }
    }
}

#[async_trait]
impl Reactor for RpcReactor {
    async fn setup(&self, global_cfg: receptor_core::RawConfig) -> Result<(), SetupError> {
        self.control.call(RpcRole::Reactor, RpcMethod::Setup, RpcArg::Config(global_cfg.0)).await?;
        Ok(())
    }

    async fn accept(&self, service_cfg: receptor_core::RawConfig) -> Result<Arc<dyn ReactorEndpoint>, SetupError> {
        let reply = self.control.call(RpcRole::Reactor, RpcMethod::Accept, RpcArg::Config(service_cfg.0)).await?;
        let session = expect_session(reply)?;
        Ok(Arc::new(RpcReactorEndpoint { socket_path: self.socket_path.clone(), control: self.control.clone(), session }))
    }
}

struct RpcReactorEndpoint {
    socket_path: PathBuf,
    control: Arc<ControlClient>,
    session: SessionId,
}

#[async_trait]
impl ReactorEndpoint for RpcReactorEndpoint {
    async fn handle(&self, mut event_rx: RendezvousReceiver<Event>, close: CloseSignal) {
        let stream = match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => stream,
            Err(err) => {
                error!(session = self.session, %err, "could not dial plugin event socket");
                return;
            }
        };
        let (_read_half, mut write_half) = stream.into_split();
        if let Err(err) = write_frame(&mut write_half, &self.session).await {
            error!(session = self.session, %err, "could not send session handshake");
            return;
        }

        let event_task = tokio::spawn(async move {
            loop {
                match event_rx.recv().await {
                    Some(event) => {
                        let wire_event = WireEvent::from(&event);
                        if write_frame(&mut write_half, &wire_event).await.is_err() {
                            return;
                        }
                    }
                    None => return,
                }
            }
        });

        let close_task = {
            let control = self.control.clone();
            let session = self.session;
            let close = close.clone();
            tokio::spawn(async move {
                close.fired().await;
                let _ = control.call(RpcRole::Reactor, RpcMethod::CloseHandle, RpcArg::Session(session)).await;
            })
        };

        let _ = self.control.call(RpcRole::Reactor, RpcMethod::Handle, RpcArg::Session(self.session)).await;
        event_task.abort();
        close_task.abort();
    }
}

fn expect_session(reply: RpcReply) -> Result<SessionId, SetupError> {
    match reply {
        RpcReply::Session(session) => Ok(session),
        RpcReply::Unit => Err(SetupError::Rejected("accept did not return a session id".to_string())),
    }
}
