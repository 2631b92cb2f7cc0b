// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! receptor-pipeline: the event-flow middleware (spec §4.2-§4.7) that sits
//! between Watcher/Reactor endpoints and turns them into a running Service —
//! merger, broadcaster, forwarder, bookkeeper, and the endpoint/service
//! lifecycle wrappers around them.

pub mod bookkeeper;
pub mod broadcaster;
pub mod endpoint;
pub mod forwarder;
pub mod merger;
pub mod service;

pub use bookkeeper::{bookkeeper, bookkeeper_receiver};
pub use broadcaster::broadcaster;
pub use endpoint::{HandlerWaitTimeout, ManagedEndpoint};
pub use forwarder::Forwarder;
pub use merger::merger;
pub use service::{RunningService, Service};
