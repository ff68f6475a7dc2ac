//! Critical Section Guard
//!
//! Interrupt masking used as the single lock of the blocking core. Every
//! mutation of a wait queue, the timeout ledger, or a thread's state runs
//! while an [`IrqKey`] is alive.
//!
//! Nesting is safe: an inner `acquire` sees interrupts already masked, so
//! its key will not unmask them on release. Only the outermost key restores
//! the interrupt state it found.

use hal::InterruptHal;

/// Proof that the critical section is held
///
/// Only [`CriticalSection::acquire`] can produce one, so operations that
/// must run under the guard take `&IrqKey`.
#[must_use = "dropping an IrqKey leaves interrupts masked; pass it to release()"]
#[derive(Debug)]
pub struct IrqKey {
    was_enabled: bool,
    depth: usize,
}

impl IrqKey {
    /// Returns true if releasing this key re-enables interrupts
    pub fn restores_interrupts(&self) -> bool {
        self.was_enabled
    }

    /// Nesting depth at which this key was taken (1 = outermost)
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Reentrant interrupt-masking guard
pub struct CriticalSection {
    irq: Box<dyn InterruptHal>,
    depth: usize,
}

impl CriticalSection {
    /// Creates a guard over the given interrupt controller
    pub fn new(irq: Box<dyn InterruptHal>) -> Self {
        Self { irq, depth: 0 }
    }

    /// Masks interrupts and returns the key that will restore them
    pub fn acquire(&mut self) -> IrqKey {
        let was_enabled = self.irq.interrupts_enabled();
        self.irq.disable_interrupts();
        self.depth += 1;
        IrqKey {
            was_enabled,
            depth: self.depth,
        }
    }

    /// Releases a key, restoring interrupts if it was the one that masked them
    pub fn release(&mut self, key: IrqKey) {
        debug_assert_eq!(
            key.depth, self.depth,
            "critical section released out of order"
        );
        self.depth = self.depth.saturating_sub(1);
        if key.was_enabled {
            self.irq.enable_interrupts();
        }
    }

    /// Returns true while any key is outstanding
    pub fn is_held(&self) -> bool {
        self.depth > 0
    }

    /// Number of outstanding keys
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns whether interrupts are currently enabled
    pub fn interrupts_enabled(&self) -> bool {
        self.irq.interrupts_enabled()
    }
}

impl std::fmt::Debug for CriticalSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriticalSection")
            .field("depth", &self.depth)
            .field("interrupts_enabled", &self.irq.interrupts_enabled())
            .finish()
    }
}
