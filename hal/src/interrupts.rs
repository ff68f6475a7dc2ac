//! Interrupt masking abstraction

/// Local interrupt mask of a single core
///
/// This trait abstracts the "disable interrupts / restore interrupts"
/// instruction pair. On a single core, masking is sufficient for mutual
/// exclusion between thread context and interrupt handlers; there is no
/// contention and no backoff.
pub trait InterruptHal {
    /// Enables interrupts
    fn enable_interrupts(&mut self);

    /// Disables interrupts
    fn disable_interrupts(&mut self);

    /// Returns whether interrupts are enabled
    fn interrupts_enabled(&self) -> bool;
}
