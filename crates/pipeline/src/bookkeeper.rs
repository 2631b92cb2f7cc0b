// SPDX-License-Identifier: MIT

//! `Bookkeeper`/`BookkeeperReceiver` (spec §4.5), grounded in the Go
//! original's functions of the same name in `pipe/bookkeeper.go`. Both wrap
//! a private `Book` and exist to let a watcher that only ever produces full
//! snapshots, or a reactor that only ever wants a full snapshot, interop
//! with the rest of the pipeline without doing their own diffing.

use receptor_core::{rendezvous, Book, Event, RendezvousReceiver};
use tokio::sync::mpsc;

/// Maintains a `Book` fed by two input streams — incremental updates and
/// occasional full replacements — and emits only the diff for each update
/// on the returned channel. Closing either input closes the output, same
/// as the Go original: a flush can happen on one source without needing
/// the other to agree it's done.
pub fn bookkeeper(mut inc_rx: mpsc::Receiver<Event>, mut full_rx: mpsc::Receiver<Event>) -> mpsc::Receiver<Event> {
    let (out_tx, out_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let book = Book::new();
        loop {
            tokio::select! {
                inc = inc_rx.recv() => {
                    match inc {
                        Some(ev) => {
                            if let Some(diff) = book.update_inc(&ev) {
                                if out_tx.send(diff).await.is_err() {
                                    return;
                                }
                            }
                        }
                        None => return,
                    }
                }
                full = full_rx.recv() => {
                    match full {
                        Some(ev) => {
                            if let Some(diff) = book.update_full(&ev) {
                                if out_tx.send(diff).await.is_err() {
                                    return;
                                }
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    });
    out_rx
}

/// Maintains a `Book` fed by an incremental update stream, and serves a
/// full snapshot on demand through the returned receiver. Receive-gated
/// (`RendezvousReceiver`), mirroring the Go original's unbuffered
/// `fullOutCh`: each request gets whatever the book looks like at the
/// moment of the request, not a stale queued copy.
pub fn bookkeeper_receiver(mut inc_rx: mpsc::Receiver<Event>) -> RendezvousReceiver<Event> {
    let (mut full_tx, full_rx) = rendezvous::<Event>();
    tokio::spawn(async move {
        let book = Book::new();
        loop {
            tokio::select! {
                biased;

                inc = inc_rx.recv() => {
                    match inc {
                        Some(ev) => {
                            book.update_inc(&ev);
                        }
                        None => return,
                    }
                }
                send_result = full_tx.send(book.full()) => {
                    if send_result.is_err() {
                        return;
                    }
                }
            }
        }
    });
    full_rx
}
