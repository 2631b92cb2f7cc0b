// SPDX-License-Identifier: MIT

//! The control-connection RPC envelope (spec §4.8), grounded in the Go
//! original's `net/rpc` usage in `plugin/watcherserver.go`/`reactorserver.go`
//! (method names `Watcher.Setup`/`Accept`/`Handle`/`CloseHandle` and their
//! `Reactor.*` mirrors) and `plugin/watcherclient.go`/`reactorclient.go`.
//!
//! `net/rpc` multiplexes concurrent calls over one connection by sequence
//! number so that `Handle` (which blocks for the endpoint's whole lifetime)
//! and `CloseHandle` (which must reach the server while `Handle` is still
//! in flight) can share a connection. `RpcRequest`/`RpcResponse` carry the
//! same `seq` field for the same reason — see `receptor_plugin::host`'s
//! `ControlClient` for the multiplexing reader.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A plugin session id, handed back by `Accept` and used by every later
/// `Handle`/`CloseHandle` call. Mirrors the Go original's `int` session,
/// widened since nothing here depends on matching its exact width.
pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcRole {
    Watcher,
    Reactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RpcMethod {
    Setup,
    Accept,
    Handle,
    CloseHandle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcArg {
    Config(JsonValue),
    Session(SessionId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub seq: u64,
    pub role: RpcRole,
    pub method: RpcMethod,
    pub arg: RpcArg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcReply {
    Unit,
    Session(SessionId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcOutcome {
    Ok(RpcReply),
    Err(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub seq: u64,
    pub outcome: RpcOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_and_response_round_trip_through_msgpack() {
        let req = RpcRequest {
            seq: 1,
            role: RpcRole::Reactor,
            method: RpcMethod::Accept,
            arg: RpcArg::Config(serde_json::json!({"k": "v"})),
        };
        let bytes = rmp_serde::to_vec_named(&req).unwrap();
        let back: RpcRequest = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(back.seq, 1);
        assert!(matches!(back.method, RpcMethod::Accept));

        let resp = RpcResponse { seq: 1, outcome: RpcOutcome::Ok(RpcReply::Session(42)) };
        let bytes = rmp_serde::to_vec_named(&resp).unwrap();
        let back: RpcResponse = rmp_serde::from_slice(&bytes).unwrap();
        assert!(matches!(back.outcome, RpcOutcome::Ok(RpcReply::Session(42))));
    }
}
