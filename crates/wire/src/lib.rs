// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! receptor-wire: the plugin transport's on-the-wire shapes — DTOs for
//! `NodeInfo`/`Event`, the control-connection RPC envelope, and the
//! length-prefixed msgpack framing both run over (spec §4.8).

pub mod framing;
pub mod rpc;
pub mod types;

pub use framing::{read_frame, write_frame, ProtocolError, MAX_FRAME_LEN};
pub use rpc::{RpcArg, RpcMethod, RpcOutcome, RpcReply, RpcRequest, RpcResponse, RpcRole, SessionId};
pub use types::{WireEvent, WireNodeInfo, WireNodeStatus};
