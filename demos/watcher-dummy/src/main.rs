// SPDX-License-Identifier: MIT

//! Reference watcher plugin, grounded in
//! `examples/original_source/plugins/watcher/dummy/dummy/dummy.go`: a
//! single configured node toggling between `Up` and `Down` every two
//! seconds. Exists so the plugin transport (spec §4.7) has a real,
//! spawnable watcher to dial.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use receptor_core::{CloseSignal, Event, NodeInfo, NodeStatus, RawConfig, SetupError, Watcher, WatcherEndpoint};
use serde::Deserialize;
use tokio::sync::mpsc::Sender;

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { name: default_name(), host: default_host(), port: default_port() }
    }
}

fn default_name() -> String {
    "TestNode".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    80
}

struct DummyWatcher;

#[async_trait]
impl Watcher for DummyWatcher {
    async fn setup(&self, _global_cfg: RawConfig) -> Result<(), SetupError> {
        Ok(())
    }

    async fn accept(&self, service_cfg: RawConfig) -> Result<Arc<dyn WatcherEndpoint>, SetupError> {
        let cfg = if service_cfg.0.is_null() { ServiceConfig::default() } else { service_cfg.parse()? };
        Ok(Arc::new(DummyWatcherEndpoint { cfg }))
    }
}

struct DummyWatcherEndpoint {
    cfg: ServiceConfig,
}

#[async_trait]
impl WatcherEndpoint for DummyWatcherEndpoint {
    async fn handle(&self, event_tx: Sender<Event>, close: CloseSignal) {
        let up = Event::with_node(NodeInfo::new(
            self.cfg.name.as_str(),
            NodeStatus::Up,
            self.cfg.host.as_str(),
            self.cfg.port,
        ));
        let down = Event::with_node(NodeInfo::new(
            self.cfg.name.as_str(),
            NodeStatus::Down,
            self.cfg.host.as_str(),
            self.cfg.port,
        ));

        let mut up_next = true;
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(2)) => {
                    let ev = if up_next { up.clone() } else { down.clone() };
                    if event_tx.send(ev).await.is_err() {
                        return;
                    }
                    up_next = !up_next;
                }
                () = close.fired() => return,
            }
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let [_, transport, socket_path] = args.as_slice() else {
        eprintln!("this is a receptor plugin, it is not meant to be run directly");
        std::process::exit(1);
    };

    let watcher: Arc<dyn Watcher> = Arc::new(DummyWatcher);
    if let Err(err) = receptor_plugin::serve_watcher(watcher, transport, &PathBuf::from(socket_path.as_str())).await {
        tracing::error!(%err, "plugin exited with an error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
