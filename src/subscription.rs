// src/subscription.rs

//! Signal subscriptions handed out by the bus transports
//!
//! A [`Subscription`] is a stream of decoded signals. Dropping it removes
//! the subscription: the task that forwards bus messages is aborted, so no
//! signal of a finished operation leaks into the next one. The stream ends
//! (`recv` returns `None`) when the service connection goes away.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sending side used by transports to feed a subscription
pub type SignalSender<T> = mpsc::UnboundedSender<T>;

/// A live signal subscription
#[derive(Debug)]
pub struct Subscription<T> {
    signals: mpsc::UnboundedReceiver<T>,
    forwarder: Option<JoinHandle<()>>,
}

/// Create a subscription together with the sender that feeds it
pub fn channel<T>() -> (SignalSender<T>, Subscription<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Subscription::new(rx))
}

impl<T> Subscription<T> {
    /// Wrap a receiver
    pub fn new(signals: mpsc::UnboundedReceiver<T>) -> Self {
        Self {
            signals,
            forwarder: None,
        }
    }

    /// Tie the lifetime of a forwarding task to this subscription
    pub fn with_forwarder(mut self, forwarder: JoinHandle<()>) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    /// Wait for the next signal; `None` once the connection is gone
    pub async fn recv(&mut self) -> Option<T> {
        self.signals.recv().await
    }

    /// Take an already delivered signal without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        self.signals.try_recv().ok()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}
