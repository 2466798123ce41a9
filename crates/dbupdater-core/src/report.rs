//! Status reporting from the worker to the presentation side.
//!
//! The controller constructs a [`StatusEvent`] per stage transition and hands
//! it over; it never reads anything back. Any hand-off between execution
//! contexts is the reporter's business.

use tokio::sync::mpsc;

use crate::types::StatusEvent;

/// Sink for status events.
pub trait StatusReporter: Send + Sync {
    fn report(&self, event: StatusEvent);
}

impl<F> StatusReporter for F
where
    F: Fn(StatusEvent) + Send + Sync,
{
    fn report(&self, event: StatusEvent) {
        self(event);
    }
}

/// Forwards events over an unbounded channel to whatever task renders them.
#[derive(Debug, Clone)]
pub struct ChannelReporter {
    tx: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelReporter {
    /// Create a reporter and the receiving end for the presentation loop.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl StatusReporter for ChannelReporter {
    fn report(&self, event: StatusEvent) {
        // The presentation side going away must not disturb the run.
        if self.tx.send(event).is_err() {
            tracing::debug!("Status receiver closed; dropping event");
        }
    }
}
