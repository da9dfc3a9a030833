use tokio::sync::broadcast;

use gridbook_core::Address;

/// Published after an edit commits, once per persisted cell whose computed
/// value changed. Consumers must be idempotent; delivery is fire-and-forget.
#[derive(Debug, Clone)]
pub struct CellChanged {
    pub sheet_id: i64,
    pub address: Address,
    pub version: i64,
    pub computed_value: String,
}

/// Fan-out for cell change events. The update coordinator never waits on
/// consumers; a full channel drops the oldest events for lagging receivers.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<CellChanged>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CellChanged> {
        self.tx.subscribe()
    }

    pub fn notify(&self, event: CellChanged) {
        // Ignore errors if no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}
