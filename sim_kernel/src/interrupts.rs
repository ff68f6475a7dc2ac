//! # Simulated Interrupt Controller
//!
//! A hosted stand-in for the CPU interrupt flag. The blocking core owns
//! the controller through its critical section; tests keep an
//! [`InterruptProbe`] to observe the mask from outside.

use hal::InterruptHal;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Default)]
struct MaskState {
    enabled: Cell<bool>,
    masks: Cell<u64>,
    unmasks: Cell<u64>,
}

/// Simulated interrupt flag
///
/// Starts with interrupts enabled, like a kernel after boot.
#[derive(Debug)]
pub struct SimInterruptController {
    state: Rc<MaskState>,
}

impl SimInterruptController {
    pub fn new() -> Self {
        let state = MaskState::default();
        state.enabled.set(true);
        Self {
            state: Rc::new(state),
        }
    }

    /// Returns a read-only view of this controller's mask
    pub fn probe(&self) -> InterruptProbe {
        InterruptProbe {
            state: self.state.clone(),
        }
    }
}

impl Default for SimInterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHal for SimInterruptController {
    fn enable_interrupts(&mut self) {
        self.state.enabled.set(true);
        self.state.unmasks.set(self.state.unmasks.get() + 1);
    }

    fn disable_interrupts(&mut self) {
        self.state.enabled.set(false);
        self.state.masks.set(self.state.masks.get() + 1);
    }

    fn interrupts_enabled(&self) -> bool {
        self.state.enabled.get()
    }
}

/// Observer for a [`SimInterruptController`]
#[derive(Debug, Clone)]
pub struct InterruptProbe {
    state: Rc<MaskState>,
}

impl InterruptProbe {
    pub fn interrupts_enabled(&self) -> bool {
        self.state.enabled.get()
    }

    /// Number of times interrupts were masked
    pub fn mask_count(&self) -> u64 {
        self.state.masks.get()
    }

    /// Number of times interrupts were re-enabled
    pub fn unmask_count(&self) -> u64 {
        self.state.unmasks.get()
    }
}
