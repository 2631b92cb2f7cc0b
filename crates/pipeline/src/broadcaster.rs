// SPDX-License-Identifier: MIT

//! `Broadcaster`: 1→N fanout (spec §4.3), grounded in the Go original's
//! `Broadcaster(inCh, outChs)`. Every event is copied to every output, in
//! the order the outputs were given; closing the input closes every
//! output (dropping each `Sender`, here, rather than an explicit `close`).
//!
//! Per the spec's Open Question on blocking vs. dropping: this always
//! blocks on a slow consumer rather than dropping events for it. The
//! Service topology is the thing that keeps one slow reactor from
//! starving the others — each output here is the input side of that
//! reactor's own `Merger`, which is always promptly drained.

use receptor_core::Event;
use tokio::sync::mpsc;

/// Spawns the broadcaster task. Returns nothing — like the Go original,
/// this runs purely for its side effect on `out_txs`.
pub fn broadcaster(mut in_rx: mpsc::Receiver<Event>, out_txs: Vec<mpsc::Sender<Event>>) {
    tokio::spawn(async move {
        while let Some(event) = in_rx.recv().await {
            for out_tx in &out_txs {
                // A closed output is only possible if that output's owner
                // has already torn down its side of the topology; there is
                // nothing useful to do but skip it and keep broadcasting to
                // the rest.
                let _ = out_tx.send(event.clone()).await;
            }
        }
        // out_txs drops here, closing every output.
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use receptor_core::{NodeInfo, NodeStatus};

    fn single(name: &str, status: NodeStatus) -> Event {
        Event::with_node(NodeInfo::new(name, status, "h", 1))
    }

    #[tokio::test]
    async fn copies_every_event_to_every_output() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out1_tx, mut out1_rx) = mpsc::channel(4);
        let (out2_tx, mut out2_rx) = mpsc::channel(4);
        broadcaster(in_rx, vec![out1_tx, out2_tx]);

        in_tx.send(single("n1", NodeStatus::Up)).await.unwrap();
        in_tx.send(single("n2", NodeStatus::Down)).await.unwrap();

        for rx in [&mut out1_rx, &mut out2_rx] {
            assert_eq!(rx.recv().await.unwrap().get("n1").unwrap().status(), NodeStatus::Up);
            assert_eq!(rx.recv().await.unwrap().get("n2").unwrap().status(), NodeStatus::Down);
        }
    }

    #[tokio::test]
    async fn closing_input_closes_every_output() {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out1_tx, mut out1_rx) = mpsc::channel(1);
        let (out2_tx, mut out2_rx) = mpsc::channel(1);
        broadcaster(in_rx, vec![out1_tx, out2_tx]);

        drop(in_tx);

        assert!(out1_rx.recv().await.is_none());
        assert!(out2_rx.recv().await.is_none());
    }
}
