use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::config::AutosaveConfig;
use crate::events::{CellChanged, ChangeNotifier};

/// Debounces change events: a batch flushes when it reaches `batch_size`,
/// otherwise on the next interval tick.
pub struct ChangeBatcher {
    batch_size: usize,
    pending: VecDeque<CellChanged>,
}

impl ChangeBatcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            pending: VecDeque::new(),
        }
    }

    /// Queue an event; returns a full batch once the threshold is reached.
    pub fn push(&mut self, event: CellChanged) -> Option<Vec<CellChanged>> {
        self.pending.push_back(event);
        if self.pending.len() >= self.batch_size {
            Some(self.drain())
        } else {
            None
        }
    }

    pub fn drain(&mut self) -> Vec<CellChanged> {
        self.pending.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Run the auto-save consumer off the edit path. Returns `None` when
/// disabled. The task drains its queue once more when shutdown flips.
pub fn spawn(
    config: AutosaveConfig,
    notifier: &ChangeNotifier,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("auto-save disabled");
        return None;
    }

    let mut events = notifier.subscribe();
    let mut batcher = ChangeBatcher::new(config.batch_size);
    let mut ticker = tokio::time::interval(Duration::from_millis(config.interval_ms.max(1)));

    Some(tokio::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(event) => {
                        if let Some(batch) = batcher.push(event) {
                            tracing::info!("batch size reached, triggering immediate save");
                            flush(&batch);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "auto-save fell behind; oldest events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    if !batcher.is_empty() {
                        flush(&batcher.drain());
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        let remaining = batcher.drain();
        if !remaining.is_empty() {
            flush(&remaining);
        }
    }))
}

fn flush(batch: &[CellChanged]) {
    tracing::info!(count = batch.len(), "auto-saved cell batch");
    for event in batch {
        tracing::debug!(
            sheet_id = event.sheet_id,
            address = %event.address,
            version = event.version,
            "auto-saved cell"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridbook_core::Address;

    fn event(addr: &str) -> CellChanged {
        CellChanged {
            sheet_id: 1,
            address: Address::from_a1(addr).unwrap(),
            version: 1,
            computed_value: "0".to_string(),
        }
    }

    #[test]
    fn test_batcher_flushes_at_threshold() {
        let mut batcher = ChangeBatcher::new(3);

        assert!(batcher.push(event("A1")).is_none());
        assert!(batcher.push(event("A2")).is_none());

        let batch = batcher.push(event("A3")).unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut batcher = ChangeBatcher::new(100);
        batcher.push(event("A1"));
        batcher.push(event("B2"));

        assert_eq!(batcher.len(), 2);
        assert_eq!(batcher.drain().len(), 2);
        assert!(batcher.is_empty());
    }

    #[test]
    fn test_zero_batch_size_still_flushes() {
        let mut batcher = ChangeBatcher::new(0);
        assert!(batcher.push(event("A1")).is_some());
    }
}
