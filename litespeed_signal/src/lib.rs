//! One-shot signal used to tear down in-flight work.
//!
//! The exporter runs short-lived collection tasks on every scrape and a
//! long-lived HTTP accept loop. Both need to learn that the process is
//! shutting down so that they can stop delivering results nobody will read.
//!
//! The mechanism has two halves, a `Broadcaster` and any number of `Watcher`
//! instances. The `Broadcaster` fires exactly once. Watchers observe the
//! firing either by awaiting [`Watcher::recv`] or by polling
//! [`Watcher::try_recv`]. Observation is cooperative: a task that never checks
//! its `Watcher` is never interrupted.

use tokio::sync::broadcast::{self, error};
use tracing::debug;

/// Construct a `Watcher` and `Broadcaster` pair.
#[must_use]
pub fn signal() -> (Watcher, Broadcaster) {
    // Nothing is ever sent on this channel. Dropping the sender closes it and
    // every receiver, present or future, observes the close.
    let (sender, receiver) = broadcast::channel(1);

    let w = Watcher {
        receiver,
        signal_received: false,
    };
    let b = Broadcaster { sender };

    (w, b)
}

#[derive(Debug)]
/// Fires the signal for every `Watcher` derived from the same pair.
pub struct Broadcaster {
    sender: broadcast::Sender<()>,
}

impl Broadcaster {
    /// Send the signal to all `Watcher` instances. Does not wait for them to
    /// react.
    pub fn signal(self) {
        debug!(
            watchers = self.sender.receiver_count(),
            "broadcasting signal"
        );
        drop(self.sender);
    }

    /// Create a new `Watcher` attached to this `Broadcaster`.
    #[must_use]
    pub fn watcher(&self) -> Watcher {
        Watcher {
            receiver: self.sender.subscribe(),
            signal_received: false,
        }
    }
}

/// Errors for `Watcher::try_recv`.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// The signal has been received and yet `try_recv` was called.
    #[error("signal has been received")]
    SignalReceived,
}

#[derive(Debug)]
/// Observes the signal fired by a `Broadcaster`.
pub struct Watcher {
    receiver: broadcast::Receiver<()>,
    /// Set once the signal has been observed by this instance.
    signal_received: bool,
}

impl Watcher {
    /// Wait for the signal. Returns immediately if the signal was already
    /// fired, including before this `Watcher` was created.
    pub async fn recv(mut self) {
        if self.signal_received {
            // Keep `select!` loops fair once the signal is known.
            tokio::task::yield_now().await;
            return;
        }

        match self.receiver.recv().await {
            Ok(()) | Err(error::RecvError::Closed | error::RecvError::Lagged(_)) => {
                self.signal_received = true;
            }
        }
    }

    /// Check whether the signal has fired without blocking.
    ///
    /// Returns `Ok(true)` the first time the signal is observed and
    /// `Ok(false)` while it has not fired.
    ///
    /// # Errors
    ///
    /// Returns `TryRecvError::SignalReceived` on every call after the one
    /// that observed the signal.
    pub fn try_recv(&mut self) -> Result<bool, TryRecvError> {
        if self.signal_received {
            return Err(TryRecvError::SignalReceived);
        }

        match self.receiver.try_recv() {
            Ok(())
            | Err(error::TryRecvError::Closed | error::TryRecvError::Lagged(_)) => {
                self.signal_received = true;
                Ok(true)
            }
            Err(error::TryRecvError::Empty) => Ok(false),
        }
    }
}

impl Clone for Watcher {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.resubscribe(),
            signal_received: self.signal_received,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn recv_returns_after_signal() {
        let (watcher, broadcaster) = signal();
        let handle = tokio::spawn(watcher.recv());
        broadcaster.signal();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("watcher did not observe signal")
            .expect("watcher task panicked");
    }

    #[tokio::test]
    async fn clones_observe_signal() {
        let (watcher, broadcaster) = signal();
        let clones: Vec<Watcher> = (0..4).map(|_| watcher.clone()).collect();
        broadcaster.signal();
        for w in clones {
            tokio::time::timeout(Duration::from_secs(1), w.recv())
                .await
                .expect("clone did not observe signal");
        }
    }

    #[test]
    fn try_recv_reports_state() {
        let (mut watcher, broadcaster) = signal();
        let mut late = broadcaster.watcher();
        assert_eq!(watcher.try_recv(), Ok(false));

        broadcaster.signal();
        assert_eq!(watcher.try_recv(), Ok(true));
        assert_eq!(watcher.try_recv(), Err(TryRecvError::SignalReceived));
        assert_eq!(late.try_recv(), Ok(true));
    }

    #[test]
    fn clone_after_signal_sees_it() {
        let (mut watcher, broadcaster) = signal();
        broadcaster.signal();
        let mut clone = watcher.clone();
        assert_eq!(clone.try_recv(), Ok(true));
        assert_eq!(watcher.try_recv(), Ok(true));
    }
}
