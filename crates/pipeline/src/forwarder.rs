// SPDX-License-Identifier: MIT

//! `Forwarder`: N→1 fanin (spec §4.4), grounded in the Go original's
//! `Forwarder`/`NewForwarder`/`Forward`/`WaitClose`. Each `forward` call
//! adds one more input to copy into the shared output; `wait_close`
//! mirrors the original's `sync.WaitGroup` with a set of join handles,
//! since a `WaitGroup` has no async-aware `Wait`.

use receptor_core::Event;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct Forwarder {
    out_tx: mpsc::Sender<Event>,
    handles: Vec<JoinHandle<()>>,
}

impl Forwarder {
    pub fn new(out_tx: mpsc::Sender<Event>) -> Self {
        Self { out_tx, handles: Vec::new() }
    }

    /// Adds one more input to forward into the shared output. May be
    /// called any number of times before `wait_close`.
    pub fn forward(&mut self, mut in_rx: mpsc::Receiver<Event>) {
        let out_tx = self.out_tx.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = in_rx.recv().await {
                if out_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        self.handles.push(handle);
    }

    /// Waits, in a background task, for every forwarded input to close,
    /// then closes the output. Does not block the caller.
    pub fn wait_close(self) {
        tokio::spawn(async move {
            for handle in self.handles {
                let _ = handle.await;
            }
            drop(self.out_tx);
        });
    }
}
