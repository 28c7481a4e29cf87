//! Single-flight guard for inference.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// At most one inference in flight. Requests made while one is running
/// are dropped, not queued.
#[derive(Debug, Clone, Default)]
pub struct InferenceGate {
    busy: Arc<AtomicBool>,
}

impl InferenceGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. None if an inference is already in flight.
    pub fn try_begin(&self) -> Option<InflightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InflightGuard { busy: Arc::clone(&self.busy) })
    }

    pub fn is_in_flight(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped, including on error and unwind.
#[derive(Debug)]
pub struct InflightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
