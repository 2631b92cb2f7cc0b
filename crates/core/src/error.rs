// SPDX-License-Identifier: MIT

//! Error taxonomy shared across the transport and pipeline layers.

use thiserror::Error;

/// Socket I/O failure talking to a plugin, on either the control or an
/// event-stream connection. Treated as endpoint termination by the caller.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(String),
    #[error("rpc call {method} failed: {reason}")]
    RpcFailed { method: String, reason: String },
    #[error("unexpected end of stream")]
    Eof,
}
