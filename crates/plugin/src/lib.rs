// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! receptor-plugin: the out-of-process Watcher/Reactor transport (spec
//! §4.7). `host` dials a spawned plugin and exposes it as an ordinary
//! `Watcher`/`Reactor`; `guest` is the other half, run inside a plugin
//! binary to expose a local `Watcher`/`Reactor` over the same protocol;
//! `lookup` discovers and manages plugin subprocesses; `process`/`socket`
//! are the supporting subprocess and socket-path plumbing.

pub mod guest;
pub mod host;
pub mod lookup;
pub mod process;
pub mod socket;

pub use guest::{serve_reactor, serve_watcher};
pub use host::{ControlClient, RpcReactor, RpcWatcher};
pub use lookup::{Lookup, FILE_REACTOR_PREFIX, FILE_WATCHER_PREFIX};
pub use process::PluginProcess;
pub use socket::alloc_socket_path;
