//! The seam between a session and the peer channel
//!
//! Handing a message to the transport never blocks: a transport that cannot
//! accept a message right now reports [`SendError::Full`], which sessions
//! surface as a retryable backpressure error.

use tokio::sync::mpsc;

use crate::sync::protocol::Envelope;

/// Why a transport refused a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// Not ready; the message may be retried
    Full,
    /// The peer side is gone
    Closed,
}

/// Non-blocking outbound channel to the peer
pub trait Transport: Send + Sync {
    fn try_send(&self, envelope: Envelope) -> Result<(), SendError>;
}

impl Transport for mpsc::Sender<Envelope> {
    fn try_send(&self, envelope: Envelope) -> Result<(), SendError> {
        mpsc::Sender::try_send(self, envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }
}

impl Transport for mpsc::UnboundedSender<Envelope> {
    fn try_send(&self, envelope: Envelope) -> Result<(), SendError> {
        self.send(envelope).map_err(|_| SendError::Closed)
    }
}
