// SPDX-License-Identifier: MIT

//! The plugin side of the transport: `serve_watcher`/`serve_reactor` run
//! inside a plugin binary and expose a local `Watcher`/`Reactor` over the
//! same control-RPC + event-stream protocol `receptor_plugin::host` speaks
//! from the daemon side. Grounded in the Go original's
//! `watcherServer`/`reactorServer` (`plugin/watcherserver.go`,
//! `plugin/reactorserver.go`) and `endpointManager` (`plugin/util.go`).
//!
//! Each `Accept`ed session gets its own `Merger` between the network and
//! the endpoint body, on whichever side faces the socket — exactly where
//! the Go original places one (`pipe.Merger(mergeIn, eventCh)` for a
//! watcher, `pipe.Merger(eventCh, mergeOut)` for a reactor): the socket is
//! the slowest link in the pipeline, and coalescing in front of it keeps a
//! lagging connection from ever seeing more than the latest state per
//! node.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex as SyncMutex;
use receptor_core::{
    CloseHandle, CloseSignal, Event, RawConfig, Reactor, ReactorEndpoint, RendezvousReceiver, TransportError, Watcher,
    WatcherEndpoint,
};
use receptor_pipeline::merger;
use receptor_wire::{
    read_frame, write_frame, RpcArg, RpcMethod, RpcOutcome, RpcReply, RpcRequest, RpcResponse, RpcRole, SessionId,
    WireEvent,
};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{error, warn};

const SUPPORTED_TRANSPORT: &str = "unix";

/// Starts serving `watcher` on `socket_path`. Blocks for the process
/// lifetime (or until the listener errors); the daemon's `PluginProcess`
/// kills the subprocess to stop it rather than asking it to return.
pub async fn serve_watcher(watcher: Arc<dyn Watcher>, transport: &str, socket_path: &Path) -> Result<(), TransportError> {
    serve(transport, socket_path, Role::Watcher(watcher)).await
}

/// Starts serving `reactor` on `socket_path`. See [`serve_watcher`].
pub async fn serve_reactor(reactor: Arc<dyn Reactor>, transport: &str, socket_path: &Path) -> Result<(), TransportError> {
    serve(transport, socket_path, Role::Reactor(reactor)).await
}

enum Role {
    Watcher(Arc<dyn Watcher>),
    Reactor(Arc<dyn Reactor>),
}

async fn serve(transport: &str, socket_path: &Path, role: Role) -> Result<(), TransportError> {
    if transport != SUPPORTED_TRANSPORT {
        return Err(TransportError::Codec(format!(
            "unsupported transport {transport:?}, only {SUPPORTED_TRANSPORT:?} is supported"
        )));
    }
    let listener = UnixListener::bind(socket_path).map_err(TransportError::Io)?;

    // Publish the socket path via stdout; the host blocks on this line as
    // its readiness signal, matching the Go original's
    // `fmt.Printf("Plugin socket: %s://%s\n", lnet, laddr)`.
    println!("Plugin socket: {SUPPORTED_TRANSPORT}://{}", socket_path.display());
    use std::io::Write;
    let _ = std::io::stdout().flush();

    let manager = Arc::new(EndpointManager::default());
    let role = Arc::new(role);

    // First accepted connection is reserved for the control RPC channel.
    let (control_stream, _) = listener.accept().await.map_err(TransportError::Io)?;
    let control_task = tokio::spawn(run_control(control_stream, role, manager.clone()));

    // Every later connection is a per-session event stream.
    let events_task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(handle_event_connection(stream, manager.clone()));
                }
                Err(err) => {
                    error!(%err, "error accepting plugin connection");
                    return;
                }
            }
        }
    });

    let _ = tokio::join!(control_task, events_task);
    Ok(())
}

async fn run_control(stream: UnixStream, role: Arc<Role>, manager: Arc<EndpointManager>) {
    let (mut read_half, write_half) = stream.into_split();
    let write_half = Arc::new(AsyncMutex::new(write_half));
    loop {
        let request: RpcRequest = match read_frame(&mut read_half).await {
            Ok(req) => req,
            Err(_) => return,
        };
        let role = role.clone();
        let manager = manager.clone();
        let write_half = write_half.clone();
        // Each request is dispatched on its own task: `Handle` blocks for
        // the endpoint's entire lifetime, and `CloseHandle` for the same
        // session must still reach the server while that call is in
        // flight on the same connection.
        tokio::spawn(async move {
            let outcome = dispatch(request.role, request.method, request.arg, &role, &manager).await;
            let response = RpcResponse { seq: request.seq, outcome };
            let mut writer = write_half.lock().await;
            if let Err(err) = write_frame(&mut *writer, &response).await {
                warn!(%err, "failed to write rpc response");
            }
        });
    }
}

async fn dispatch(req_role: RpcRole, method: RpcMethod, arg: RpcArg, role: &Role, manager: &EndpointManager) -> RpcOutcome {
    match (method, arg) {
        (RpcMethod::Setup, RpcArg::Config(cfg)) => match (role, req_role) {
            (Role::Watcher(w), RpcRole::Watcher) => to_outcome(w.setup(RawConfig(cfg)).await.map(|()| RpcReply::Unit)),
            (Role::Reactor(r), RpcRole::Reactor) => to_outcome(r.setup(RawConfig(cfg)).await.map(|()| RpcReply::Unit)),
            _ => RpcOutcome::Err("role mismatch for Setup".to_string()),
        },
        (RpcMethod::Accept, RpcArg::Config(cfg)) => match (role, req_role) {
            (Role::Watcher(w), RpcRole::Watcher) => match w.accept(RawConfig(cfg)).await {
                Ok(endpoint) => RpcOutcome::Ok(RpcReply::Session(manager.add_watcher(endpoint))),
                Err(err) => RpcOutcome::Err(err.to_string()),
            },
            (Role::Reactor(r), RpcRole::Reactor) => match r.accept(RawConfig(cfg)).await {
                Ok(endpoint) => RpcOutcome::Ok(RpcReply::Session(manager.add_reactor(endpoint))),
                Err(err) => RpcOutcome::Err(err.to_string()),
            },
            _ => RpcOutcome::Err("role mismatch for Accept".to_string()),
        },
        (RpcMethod::Handle, RpcArg::Session(session_id)) => match manager.get(session_id) {
            Some(session) => run_handle(session).await,
            None => RpcOutcome::Err(format!("unknown session {session_id}")),
        },
        (RpcMethod::CloseHandle, RpcArg::Session(session_id)) => match manager.get(session_id) {
            Some(session) => {
                session.close().fire();
                RpcOutcome::Ok(RpcReply::Unit)
            }
            None => RpcOutcome::Err(format!("unknown session {session_id}")),
        },
        _ => RpcOutcome::Err("malformed rpc request".to_string()),
    }
}

fn to_outcome<E: std::fmt::Display>(result: Result<RpcReply, E>) -> RpcOutcome {
    match result {
        Ok(reply) => RpcOutcome::Ok(reply),
        Err(err) => RpcOutcome::Err(err.to_string()),
    }
}

async fn run_handle(session: Arc<Session>) -> RpcOutcome {
    match &*session {
        Session::Watcher(ws) => {
            let taken = ws.body.lock().await.take();
            let Some((endpoint, event_tx, close_signal)) = taken else {
                return RpcOutcome::Err("Handle already called for this session".to_string());
            };
            let body = AssertUnwindSafe(endpoint.handle(event_tx, close_signal));
            match body.catch_unwind().await {
                Ok(()) => RpcOutcome::Ok(RpcReply::Unit),
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(panic = %message, "watcher endpoint panicked");
                    RpcOutcome::Err(format!("endpoint panicked: {message}"))
                }
            }
        }
        Session::Reactor(rs) => {
            let taken = rs.body.lock().await.take();
            let Some((endpoint, event_rx, close_signal)) = taken else {
                return RpcOutcome::Err("Handle already called for this session".to_string());
            };
            let body = AssertUnwindSafe(endpoint.handle(event_rx, close_signal));
            match body.catch_unwind().await {
                Ok(()) => RpcOutcome::Ok(RpcReply::Unit),
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(panic = %message, "reactor endpoint panicked");
                    RpcOutcome::Err(format!("endpoint panicked: {message}"))
                }
            }
        }
    }
}

async fn handle_event_connection(stream: UnixStream, manager: Arc<EndpointManager>) {
    let (mut read_half, mut write_half) = stream.into_split();
    let session_id: SessionId = match read_frame(&mut read_half).await {
        Ok(id) => id,
        Err(_) => {
            warn!("could not read session id on event connection");
            return;
        }
    };
    let Some(session) = manager.get(session_id) else {
        warn!(session = session_id, "event connection for unknown session");
        return;
    };

    match &*session {
        Session::Watcher(ws) => {
            let events_out = ws.events_out.lock().await.take();
            let Some(mut events_out) = events_out else { return };
            while let Some(event) = events_out.recv().await {
                let wire = WireEvent::from(&event);
                if write_frame(&mut write_half, &wire).await.is_err() {
                    return;
                }
            }
        }
        Session::Reactor(rs) => {
            let events_in = rs.events_in.lock().await.take();
            let Some(events_in) = events_in else { return };
            loop {
                match read_frame::<_, WireEvent>(&mut read_half).await {
                    Ok(wire) => {
                        let event: Event = (&wire).into();
                        if events_in.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => {
                        // Decode failure or peer hangup: drop the sender,
                        // which closes the session's Merger input and
                        // lets the reactor body see its event channel
                        // close, same as the Go original's
                        // `close(eventCh)` on decode error.
                        return;
                    }
                }
            }
        }
    }
}

enum Session {
    Watcher(WatcherSession),
    Reactor(ReactorSession),
}

impl Session {
    fn close(&self) -> &CloseHandle {
        match self {
            Session::Watcher(ws) => &ws.close,
            Session::Reactor(rs) => &rs.close,
        }
    }
}

struct WatcherSession {
    body: AsyncMutex<Option<(Arc<dyn WatcherEndpoint>, mpsc::Sender<Event>, CloseSignal)>>,
    events_out: AsyncMutex<Option<RendezvousReceiver<Event>>>,
    close: CloseHandle,
}

struct ReactorSession {
    body: AsyncMutex<Option<(Arc<dyn ReactorEndpoint>, RendezvousReceiver<Event>, CloseSignal)>>,
    events_in: AsyncMutex<Option<mpsc::Sender<Event>>>,
    close: CloseHandle,
}

/// Maps sequential session ids to the endpoint, its channel halves, and
/// its close signal — the Rust analogue of the Go original's
/// `endpointManager`/`endpointWrapper`.
#[derive(Default)]
struct EndpointManager {
    next_id: AtomicU64,
    sessions: SyncMutex<HashMap<SessionId, Arc<Session>>>,
}

impl EndpointManager {
    fn add_watcher(&self, endpoint: Arc<dyn WatcherEndpoint>) -> SessionId {
        let (merge_in_tx, merge_in_rx) = mpsc::channel(1);
        let events_out = merger(merge_in_rx);
        let (close_signal, close_handle) = CloseSignal::new();
        let session = Session::Watcher(WatcherSession {
            body: AsyncMutex::new(Some((endpoint, merge_in_tx, close_signal))),
            events_out: AsyncMutex::new(Some(events_out)),
            close: close_handle,
        });
        self.insert(session)
    }

    fn add_reactor(&self, endpoint: Arc<dyn ReactorEndpoint>) -> SessionId {
        let (events_in_tx, events_in_rx) = mpsc::channel(1);
        let merged = merger(events_in_rx);
        let (close_signal, close_handle) = CloseSignal::new();
        let session = Session::Reactor(ReactorSession {
            body: AsyncMutex::new(Some((endpoint, merged, close_signal))),
            events_in: AsyncMutex::new(Some(events_in_tx)),
            close: close_handle,
        });
        self.insert(session)
    }

    fn insert(&self, session: Session) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sessions.lock().insert(id, Arc::new(session));
        id
    }

    fn get(&self, id: SessionId) -> Option<Arc<Session>> {
        self.sessions.lock().get(&id).cloned()
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
    use receptor_core::{NodeInfo, NodeStatus, SetupError};
    use tempfile::tempdir;

    struct OnceWatcher;

    #[async_trait]
    impl Watcher for OnceWatcher {
        async fn setup(&self, _global_cfg: RawConfig) -> Result<(), SetupError> {
            Ok(())
        }
        async fn accept(&self, _service_cfg: RawConfig) -> Result<Arc<dyn WatcherEndpoint>, SetupError> {
            Ok(Arc::new(OnceWatcherEndpoint))
        }
    }

    struct OnceWatcherEndpoint;

    #[async_trait]
    impl WatcherEndpoint for OnceWatcherEndpoint {
        async fn handle(&self, event_tx: mpsc::Sender<Event>, close: CloseSignal) {
            let ev = Event::with_node(NodeInfo::new("localhost", NodeStatus::Up, "127.0.0.1", 80));
            let _ = event_tx.send(ev).await;
            close.fired().await;
        }
    }

    /// S5: a reactor plugin round trip. Here exercised from the guest side
    /// alone: accept a session, run Handle in the background, push one
    /// event through the event connection, and confirm the endpoint body
    /// observed it.
    #[tokio::test]
    async fn watcher_session_round_trips_through_the_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let watcher: Arc<dyn Watcher> = Arc::new(OnceWatcher);
        let socket_path_clone = socket_path.clone();
        tokio::spawn(async move {
            let _ = serve_watcher(watcher, "unix", &socket_path_clone).await;
        });

        // Give the listener a moment to bind.
        for _ in 0..50 {
            if socket_path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let control = UnixStream::connect(&socket_path).await.unwrap();
        let (mut control_read, mut control_write) = control.into_split();

        write_frame(
            &mut control_write,
            &RpcRequest { seq: 1, role: RpcRole::Watcher, method: RpcMethod::Accept, arg: RpcArg::Config(serde_json::Value::Null) },
        )
        .await
        .unwrap();
        let resp: RpcResponse = read_frame(&mut control_read).await.unwrap();
        let session = match resp.outcome {
            RpcOutcome::Ok(RpcReply::Session(id)) => id,
            other => panic!("unexpected accept outcome: {other:?}"),
        };

        tokio::spawn(async move {
            write_frame(
                &mut control_write,
                &RpcRequest { seq: 2, role: RpcRole::Watcher, method: RpcMethod::Handle, arg: RpcArg::Session(session) },
            )
            .await
            .unwrap();
            let _: RpcResponse = read_frame(&mut control_read).await.unwrap();
        });

        let event_conn = UnixStream::connect(&socket_path).await.unwrap();
        let (mut event_read, mut event_write) = event_conn.into_split();
        write_frame(&mut event_write, &session).await.unwrap();

        let wire: WireEvent = read_frame(&mut event_read).await.unwrap();
        let event: Event = (&wire).into();
        assert_eq!(event.get("localhost").unwrap().status(), NodeStatus::Up);
    }
}
