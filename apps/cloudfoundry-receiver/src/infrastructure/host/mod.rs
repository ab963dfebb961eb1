//! Channel Host
//!
//! Delivers fatal receiver errors to the process supervisor over an mpsc
//! channel.

use tokio::sync::mpsc;

use crate::application::ports::Host;
use crate::application::services::ReceiverError;

/// Host that forwards fatal errors to a channel.
#[derive(Debug, Clone)]
pub struct ChannelHost {
    tx: mpsc::UnboundedSender<ReceiverError>,
}

impl ChannelHost {
    /// Create a host and the receiving end for its fatal errors.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReceiverError>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Host for ChannelHost {
    fn report_fatal_error(&self, error: ReceiverError) {
        if let Err(mpsc::error::SendError(error)) = self.tx.send(error) {
            tracing::error!(error = %error, "Fatal receiver error reported after supervisor exited");
        }
    }
}
