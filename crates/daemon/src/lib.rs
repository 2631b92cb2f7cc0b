// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! receptor-daemon: config loading and the top-level `Receptor`
//! orchestrator (spec §4.8-§4.9, §6) that ties `receptor-plugin`'s `Lookup`
//! and `receptor-pipeline`'s `Service` together into a running daemon.

pub mod config;
pub mod env;
pub mod receptor;

pub use config::{ActorConfig, Config, ConfigError, ServiceConfig};
pub use receptor::{InitError, Receptor};
