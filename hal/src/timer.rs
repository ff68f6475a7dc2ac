//! # Timer Device
//!
//! Hardware abstraction for the kernel tick source.
//!
//! ## Philosophy
//!
//! **Time is a service, not a global variable.**
//!
//! This trait provides access to a free-running tick counter. It does NOT:
//! - Provide wall-clock time
//! - Block or sleep (polling only)
//! - Expire timeouts (that's for the kernel's timeout ledger)
//!
//! ## Design Principles
//!
//! 1. **Wrapping**: The counter is fixed-width and wraps; consumers work
//!    with wrapping differences only
//! 2. **Non-blocking**: Always returns immediately
//! 3. **Frequency-agnostic**: No assumptions about tick rate at this layer

use core_types::Tick;

/// Hardware timer device trait
///
/// # Implementation Notes
///
/// - Must not block
/// - Tick frequency is implementation-defined
/// - The counter wraps at `u32::MAX`; consumers must poll at least once
///   per half wrap period to observe elapsed time correctly
///
/// # Examples
///
/// ```
/// use core_types::Tick;
/// use hal::TimerDevice;
///
/// fn elapsed<T: TimerDevice>(timer: &mut T, since: Tick) -> u32 {
///     timer.poll_ticks().ticks_since(since)
/// }
/// ```
pub trait TimerDevice {
    /// Returns the current value of the free-running tick counter
    fn poll_ticks(&mut self) -> Tick;
}
