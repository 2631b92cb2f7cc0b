// SPDX-License-Identifier: MIT

//! A single-value, receive-gated channel: `send` does not resolve until a
//! receiver is actively waiting to take the value.
//!
//! This is the closest available primitive to Go's unbuffered channel,
//! which is what the original `mergeOut` between a `Merger` and a reactor's
//! `Handle` body is. `tokio::sync::mpsc` always needs a capacity of at
//! least one, and that one slot of free buffering is enough to let a
//! Merger flush its pending event into the channel before anything has
//! actually asked for it — silently defeating the coalesce-under-pressure
//! guarantee. Gating delivery on an explicit pull from the receiver avoids
//! that.

use tokio::sync::{mpsc, oneshot};

/// Producer half. Only `Merger` constructs one of these.
pub struct RendezvousSender<T> {
    requests: mpsc::Receiver<oneshot::Sender<T>>,
}

/// Consumer half, handed to a `ReactorEndpoint::handle` body in place of a
/// plain `mpsc::Receiver`.
pub struct RendezvousReceiver<T> {
    requests: mpsc::Sender<oneshot::Sender<T>>,
}

pub fn rendezvous<T: Send + 'static>() -> (RendezvousSender<T>, RendezvousReceiver<T>) {
    let (requests_tx, requests_rx) = mpsc::channel(1);
    (RendezvousSender { requests: requests_rx }, RendezvousReceiver { requests: requests_tx })
}

impl<T: Send + 'static> RendezvousSender<T> {
    /// Waits for a receiver to ask for a value, then hands this one over.
    /// Returns the value back if every receiver has been dropped.
    pub async fn send(&mut self, value: T) -> Result<(), T> {
        match self.requests.recv().await {
            Some(reply) => {
                // The receiver is still awaiting `reply_rx`; a failed send
                // here would mean it was dropped between asking and now,
                // which only happens on receiver cancellation.
                let _ = reply.send(value);
                Ok(())
            }
            None => Err(value),
        }
    }
}

impl<T: Send + 'static> RendezvousReceiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests.send(reply_tx).await.ok()?;
        reply_rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_waits_for_a_receiver() {
        let (mut tx, mut rx) = rendezvous::<u32>();
        let sent = tokio::spawn(async move { tx.send(7).await });
        tokio::task::yield_now().await;
        assert!(!sent.is_finished(), "send must not resolve before a recv() is pending");
        assert_eq!(rx.recv().await, Some(7));
        assert!(sent.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropping_the_receiver_fails_pending_sends() {
        let (mut tx, rx) = rendezvous::<u32>();
        drop(rx);
        assert_eq!(tx.send(1).await, Err(1));
    }

    #[tokio::test]
    async fn dropping_the_sender_closes_recv() {
        let (tx, mut rx) = rendezvous::<u32>();
        drop(tx);
        assert_eq!(rx.recv().await, None);
    }
}
