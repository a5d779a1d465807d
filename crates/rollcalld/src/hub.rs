//! Best-effort hand-off of recognition batches from the capture loop to pollers.

use crate::processor::RecognitionBatch;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};

pub const DEFAULT_HUB_CAPACITY: usize = 10;

/// Small bounded FIFO of recent batches.
///
/// `publish` drops the incoming batch when full instead of waiting for a
/// consumer, so a slow poller can only make results stale, never stall the
/// capture loop. This is a UI signal, not a delivery guarantee. Neither
/// operation needs a runtime or blocks.
#[derive(Debug)]
pub struct RecognitionHub {
    tx: mpsc::Sender<RecognitionBatch>,
    rx: Mutex<mpsc::Receiver<RecognitionBatch>>,
}

impl RecognitionHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Queue `batch`. Returns `false` if the hub was full and the batch was dropped.
    pub fn publish(&self, batch: RecognitionBatch) -> bool {
        match self.tx.try_send(batch) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => false,
            // The receiver lives as long as the hub
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Oldest pending batch, if any.
    pub fn try_consume(&self) -> Option<RecognitionBatch> {
        self.rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_recv()
            .ok()
    }

    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

impl Default for RecognitionHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}
