//! In-memory duplex connection
//!
//! Two endpoints joined by a pair of FIFO channels. Messages are
//! framed with the serde_json codec, so the in-memory path exercises
//! the same encode/decode boundary a network transport would.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Mutex;

use super::errors::{TransportError, TransportResult};
use super::messages::ReplicationMessage;
use super::{MessagePoll, Messenger};

/// One endpoint of an in-memory duplex connection.
pub struct MemoryConnection {
    outbound: Sender<Vec<u8>>,
    inbound: Mutex<Receiver<Vec<u8>>>,
}

/// Create a connected pair of endpoints.
///
/// Everything sent on one endpoint is delivered to the other, in
/// order.
pub fn memory_pair() -> (MemoryConnection, MemoryConnection) {
    let (a_tx, b_rx) = mpsc::channel();
    let (b_tx, a_rx) = mpsc::channel();
    (
        MemoryConnection {
            outbound: a_tx,
            inbound: Mutex::new(a_rx),
        },
        MemoryConnection {
            outbound: b_tx,
            inbound: Mutex::new(b_rx),
        },
    )
}

impl Messenger for MemoryConnection {
    fn send(&self, message: ReplicationMessage) -> TransportResult<()> {
        let frame = serde_json::to_vec(&message)?;
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::connection_closed("peer endpoint dropped"))
    }
}

impl MessagePoll for MemoryConnection {
    fn poll(&self) -> TransportResult<Option<ReplicationMessage>> {
        let inbound = self.inbound.lock().unwrap();
        match inbound.try_recv() {
            Ok(frame) => {
                let message = serde_json::from_slice(&frame)?;
                Ok(Some(message))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(TransportError::connection_closed("peer endpoint dropped"))
            }
        }
    }
}
