// SPDX-License-Identifier: MIT

//! `Merger`: single-input, single-output coalescing buffer (spec §4.2).
//!
//! Mirrors `pipe.Merger` from the Go original: while an output send would
//! block, further inputs are folded into the pending event via
//! `Event::update` instead of being queued. On input close, the pending
//! event (if any) is discarded and the output is closed — only forward
//! progress matters during shutdown.
//!
//! The output side is a `RendezvousReceiver` rather than a plain
//! `mpsc::Receiver`: the Go original's `mergeOut` is an unbuffered channel,
//! and a buffered stand-in would let the first pending event flush through
//! before anything asked for it, silently breaking the coalesce-under-
//! pressure guarantee the reactor side depends on.

use receptor_core::{rendezvous, Event, RendezvousReceiver};
use tokio::sync::mpsc;

/// Spawns the merger task and returns the output receiver.
pub fn merger(mut in_rx: mpsc::Receiver<Event>) -> RendezvousReceiver<Event> {
    let (mut out_tx, out_rx) = rendezvous::<Event>();
    tokio::spawn(async move {
        let mut pending: Option<Event> = None;
        loop {
            match pending.take() {
                None => match in_rx.recv().await {
                    Some(ev) => pending = Some(ev),
                    None => return,
                },
                Some(cur) => {
                    tokio::select! {
                        biased;

                        incoming = in_rx.recv() => {
                            match incoming {
                                Some(ev) => {
                                    let mut merged = cur;
                                    merged.update(&ev);
                                    pending = Some(merged);
                                }
                                None => {
                                    // Input closed with a pending event: the
                                    // event is expendable, only the close
                                    // propagates.
                                    return;
                                }
                            }
                        }
                        send_result = out_tx.send(cur.clone()) => {
                            if send_result.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    });
    out_rx
}
