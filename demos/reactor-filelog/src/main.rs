// SPDX-License-Identifier: MIT

//! Reference reactor plugin, grounded in
//! `examples/original_source/plugins/reactor/filelogger/filelog/filelog.go`:
//! appends one line per node per event to a configured file. Exists so the
//! plugin transport (spec §4.7) has a real, spawnable reactor to dial.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use receptor_core::{
    CloseSignal, Event, RawConfig, Reactor, ReactorEndpoint, RendezvousReceiver, SetupError,
};
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Deserialize)]
struct ServiceConfig {
    filename: String,
    #[serde(default)]
    unbuffered: bool,
}

struct FileLogReactor;

#[async_trait]
impl Reactor for FileLogReactor {
    async fn setup(&self, _global_cfg: RawConfig) -> Result<(), SetupError> {
        Ok(())
    }

    async fn accept(&self, service_cfg: RawConfig) -> Result<Arc<dyn ReactorEndpoint>, SetupError> {
        let cfg: ServiceConfig = service_cfg.parse()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cfg.filename)
            .map_err(|err| SetupError::Rejected(format!("could not open log file {:?}: {err}", cfg.filename)))?;
        Ok(Arc::new(FileLogEndpoint { writer: AsyncMutex::new(BufWriter::new(file)), unbuffered: cfg.unbuffered }))
    }
}

struct FileLogEndpoint {
    writer: AsyncMutex<BufWriter<File>>,
    unbuffered: bool,
}

#[async_trait]
impl ReactorEndpoint for FileLogEndpoint {
    async fn handle(&self, mut event_rx: RendezvousReceiver<Event>, close: CloseSignal) {
        loop {
            tokio::select! {
                ev = event_rx.recv() => {
                    match ev {
                        Some(event) => self.log_event(&event).await,
                        None => break,
                    }
                }
                () = close.fired() => break,
            }
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.flush();
    }
}

impl FileLogEndpoint {
    async fn log_event(&self, event: &Event) {
        let mut writer = self.writer.lock().await;
        let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        for (_, node) in event {
            let _ = writeln!(writer, "{now}: {node}");
        }
        if self.unbuffered {
            let _ = writer.flush();
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

    let reactor: Arc<dyn Reactor> = Arc::new(FileLogReactor);
    if let Err(err) = receptor_plugin::serve_reactor(reactor, transport, &PathBuf::from(socket_path.as_str())).await {
        tracing::error!(%err, "plugin exited with an error");
        std::process::exit(1);
    }
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
