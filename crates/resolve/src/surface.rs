//! Per-surface in-flight flags and liveness.
//!
//! A surface is one screen instance. Its flags only stop that instance from
//! running the same flow twice at once; they are not a lock across
//! instances and say nothing about concurrent changes made elsewhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Single-flight flag for one flow on one surface.
///
/// A second `try_enter` while a guard is alive fails instead of queueing.
#[derive(Debug, Clone, Default)]
pub struct InFlightGate {
    busy: Arc<AtomicBool>,
}

impl InFlightGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate. `None` when an attempt is already running.
    pub fn try_enter(&self) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                busy: self.busy.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases its gate on drop, including on early return and panic unwind.
#[derive(Debug)]
pub struct InFlightGuard {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Whether the surface that started a flow is still showing.
///
/// Results of a flow that finishes after `close` must be discarded, not
/// applied to the stale view.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Default for Liveness {
    fn default() -> Self {
        Liveness {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        self.alive.store(false, Ordering::Release);
    }

    pub fn is_live(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}
