use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;

use system::ConnectionId;

use crate::connection::ConnectionEvent;

pub type ConnectionTx = tokio::sync::mpsc::Sender<ConnectionEvent>;

/// Per-connection egress queue depth. Stroke and cursor traffic is
/// supersede-able, so overflowing entries can be dropped.
pub const OUTBOX_CAPACITY: usize = 64;

/// Bounded, non-blocking delivery to a set of connections. A slow
/// consumer loses events instead of stalling the loop that owns this.
pub struct Outbox {
    txs: HashMap<ConnectionId, ConnectionTx>,
}

impl Outbox {
    pub fn new() -> Self {
        Self {
            txs: HashMap::new(),
        }
    }

    pub fn insert(&mut self, connection_id: ConnectionId, tx: ConnectionTx) {
        self.txs.insert(connection_id, tx);
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<ConnectionTx> {
        self.txs.remove(connection_id)
    }

    pub fn tx(&self, connection_id: &ConnectionId) -> Option<&ConnectionTx> {
        self.txs.get(connection_id)
    }

    pub fn send(&mut self, to: ConnectionId, event: ConnectionEvent) {
        let Some(tx) = self.txs.get(&to) else {
            log::warn!("no outbox for connection {}", to);
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!("outbox of connection {} full; dropping {:?}", to, event);
            }
            Err(TrySendError::Closed(_)) => {
                self.txs.remove(&to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use system::ServerEvent;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (tx, mut rx) = tokio::sync::mpsc::channel(1);
        let mut outbox = Outbox::new();
        outbox.insert(7, tx);

        outbox.send(7, ConnectionEvent::Event(ServerEvent::Unauthorized));
        outbox.send(7, ConnectionEvent::Event(ServerEvent::Unauthorized));
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_receiver_is_evicted() {
        let (tx, rx) = tokio::sync::mpsc::channel(1);
        let mut outbox = Outbox::new();
        outbox.insert(7, tx);
        drop(rx);

        outbox.send(7, ConnectionEvent::Event(ServerEvent::Unauthorized));
        assert!(outbox.tx(&7).is_none());
    }
}
