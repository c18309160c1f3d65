use core::sync::atomic::{AtomicBool, Ordering};

/// Edge-triggered "new data" flag shared between the READY interrupt and the
/// station loop. Assertions that arrive before the loop takes the flag
/// collapse into one.
#[derive(Debug, Default)]
pub struct ReadySignal {
    asserted: AtomicBool,
}

impl ReadySignal {
    pub const fn new() -> Self {
        Self {
            asserted: AtomicBool::new(false),
        }
    }

    /// Safe to call from interrupt context.
    pub fn assert(&self) {
        self.asserted.store(true, Ordering::Release);
    }

    /// Returns whether the flag was set and clears it.
    pub fn take(&self) -> bool {
        self.asserted.swap(false, Ordering::AcqRel)
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted.load(Ordering::Acquire)
    }
}
