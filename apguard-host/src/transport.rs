use apguard_core::{FirmwareTransport, RejectSnapshot};
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TrySendError;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Firmware queue is full")]
    QueueFull,

    #[error("Firmware endpoint is gone")]
    Closed,
}

/// Delivers JSON-encoded snapshots to the firmware task over a bounded
/// queue. Never blocks: a full queue is reported as a failure.
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn new(tx: Sender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl FirmwareTransport for ChannelTransport {
    type Error = TransportError;

    fn send_reject_list(&self, snapshot: &RejectSnapshot) -> Result<(), TransportError> {
        let frame = serde_json::to_vec(snapshot)?;

        self.tx.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::QueueFull,
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
