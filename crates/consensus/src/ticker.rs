//! Timeout scheduling for the state machine.
//!
//! Exactly one timeout is pending at a time: scheduling a new one aborts
//! whatever was pending. Fired timeouts are delivered on a capacity-1
//! channel that the dispatcher selects on alongside the message queues.

use crate::step::Step;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A scheduled timeout: how long to wait and which state asked for it.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutInfo {
    /// Sleep duration.
    pub duration: Duration,
    /// The state the timeout was scheduled for (logging only; the active
    /// state at delivery time handles it).
    pub step: Step,
}

/// Schedules and delivers the single pending timeout.
#[derive(Debug)]
pub struct TimeoutTicker {
    tock_tx: mpsc::Sender<TimeoutInfo>,
    pending: Option<JoinHandle<()>>,
}

impl TimeoutTicker {
    /// Create a ticker and the channel its timeouts fire on.
    pub fn new() -> (Self, mpsc::Receiver<TimeoutInfo>) {
        let (tock_tx, tock_rx) = mpsc::channel(1);
        (
            Self {
                tock_tx,
                pending: None,
            },
            tock_rx,
        )
    }

    /// Schedule a timeout, superseding any pending one.
    pub fn schedule(&mut self, info: TimeoutInfo) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }

        let tock_tx = self.tock_tx.clone();
        self.pending = Some(tokio::spawn(async move {
            trace!(step = ?info.step, duration = ?info.duration, "timeout armed");
            tokio::time::sleep(info.duration).await;
            if tock_tx.send(info).await.is_err() {
                trace!("timeout channel closed, dropping tick");
            }
        }));
        debug!(step = ?info.step, duration = ?info.duration, "timeout scheduled");
    }

    /// Cancel the pending timeout, if any.
    pub fn stop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
            debug!("pending timeout cancelled");
        }
    }
}

impl Drop for TimeoutTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeout_fires() {
        let (mut ticker, mut tock_rx) = TimeoutTicker::new();
        ticker.schedule(TimeoutInfo {
            duration: Duration::from_millis(10),
            step: Step::Init,
        });

        let info = tokio::time::timeout(Duration::from_millis(100), tock_rx.recv())
            .await
            .expect("timeout")
            .expect("channel closed");
        assert_eq!(info.step, Step::Init);
    }

    #[tokio::test]
    async fn schedule_supersedes_pending() {
        let (mut ticker, mut tock_rx) = TimeoutTicker::new();

        // Long timeout replaced by a short one: only the short one fires.
        ticker.schedule(TimeoutInfo {
            duration: Duration::from_millis(200),
            step: Step::Init,
        });
        ticker.schedule(TimeoutInfo {
            duration: Duration::from_millis(10),
            step: Step::Voting,
        });

        let info = tokio::time::timeout(Duration::from_millis(100), tock_rx.recv())
            .await
            .expect("timeout - replacement did not fire quickly")
            .expect("channel closed");
        assert_eq!(info.step, Step::Voting);

        // The superseded timeout must not fire afterwards.
        let extra = tokio::time::timeout(Duration::from_millis(250), tock_rx.recv()).await;
        assert!(extra.is_err(), "superseded timeout fired");
    }

    #[tokio::test]
    async fn stop_cancels_pending() {
        let (mut ticker, mut tock_rx) = TimeoutTicker::new();
        ticker.schedule(TimeoutInfo {
            duration: Duration::from_millis(20),
            step: Step::Init,
        });
        ticker.stop();

        let result = tokio::time::timeout(Duration::from_millis(100), tock_rx.recv()).await;
        assert!(result.is_err(), "cancelled timeout fired");
    }
}
