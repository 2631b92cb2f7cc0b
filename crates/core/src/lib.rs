// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! receptor-core: the data model (`NodeInfo`, `Event`, `Book`) and the
//! Watcher/Reactor plugin contract that the rest of the workspace builds on.

pub mod book;
pub mod contract;
pub mod error;
pub mod event;
pub mod node;
pub mod rendezvous;

pub use book::Book;
pub use contract::{
    CloseHandle, CloseSignal, RawConfig, Reactor, ReactorEndpoint, SetupError, Watcher, WatcherEndpoint,
};
pub use error::TransportError;
pub use event::Event;
pub use node::{NodeInfo, NodeStatus};
pub use rendezvous::{rendezvous, RendezvousReceiver, RendezvousSender};
