//! Single-flight gate for analyses.
//!
//! Only one analysis may be outstanding at a time. A new request while the
//! flag is set is refused rather than queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "analyzing" flag
#[derive(Debug, Clone, Default)]
pub struct AnalysisGate {
    busy: Arc<AtomicBool>,
}

impl AnalysisGate {
    /// Create an idle gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. Returns `None` while another analysis holds it.
    pub fn try_begin(&self) -> Option<AnalysisGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AnalysisGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    /// Whether an analysis is running
    pub fn is_analyzing(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the gate when dropped
#[derive(Debug)]
pub struct AnalysisGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for AnalysisGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
