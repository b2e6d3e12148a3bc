//! Single-slot trace-data buffer for the endpoint-2 IN path
//!
//! Trace capture hands the server at most one buffer at a time; a newly
//! queued buffer replaces an unconsumed one. No queuing beyond one in
//! flight.

use std::sync::Mutex;

/// Holds the one pending trace buffer, if any
#[derive(Debug, Default)]
pub struct TraceSlot {
    slot: Mutex<Option<Vec<u8>>>,
}

impl TraceSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pending buffer, replacing any unconsumed one
    pub fn queue(&self, data: Vec<u8>) {
        *self.slot.lock().unwrap() = Some(data);
    }

    /// Take the pending buffer, leaving the slot empty
    pub fn take(&self) -> Option<Vec<u8>> {
        self.slot.lock().unwrap().take()
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slot_semantics() {
        let slot = TraceSlot::new();
        assert!(!slot.is_pending());
        assert!(slot.take().is_none());

        slot.queue(vec![1, 2]);
        slot.queue(vec![3, 4]); // replaces, never queues behind
        assert!(slot.is_pending());
        assert_eq!(slot.take(), Some(vec![3, 4]));
        assert!(slot.take().is_none());
    }
}
