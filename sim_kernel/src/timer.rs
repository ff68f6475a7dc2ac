//! # Simulated Timer Device
//!
//! Deterministic tick source for testing.
//!
//! ## Philosophy
//!
//! **Determinism enables thorough testing.**
//!
//! This timer provides controllable, deterministic time progression.
//! Unlike real hardware timers, this timer only advances when explicitly
//! told to do so. Like real hardware it is a fixed-width counter that
//! wraps, so tests can drive the kernel across the wrap boundary.

use core_types::Tick;
use hal::TimerDevice;
use wait_core::{Kernel, Scheduler, TimeoutLedger};

/// Simulated timer device with controllable time progression
///
/// # Examples
///
/// ```
/// use core_types::Tick;
/// use hal::TimerDevice;
/// use sim_kernel::timer::SimTimerDevice;
///
/// let mut timer = SimTimerDevice::new();
/// assert_eq!(timer.poll_ticks(), Tick(0));
///
/// timer.advance_ticks(100);
/// assert_eq!(timer.poll_ticks(), Tick(100));
///
/// timer.advance_ticks(50);
/// assert_eq!(timer.poll_ticks(), Tick(150));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SimTimerDevice {
    ticks: Tick,
}

impl SimTimerDevice {
    /// Creates a new simulated timer starting at tick 0
    pub fn new() -> Self {
        Self { ticks: Tick::ZERO }
    }

    /// Creates a new simulated timer starting at a specific tick
    ///
    /// Useful for tests that start just short of the wrap boundary.
    pub fn with_initial_ticks(ticks: Tick) -> Self {
        Self { ticks }
    }

    /// Advances the timer by `delta` ticks, wrapping
    pub fn advance_ticks(&mut self, delta: u32) {
        self.ticks = self.ticks.wrapping_add(delta);
    }

    /// Returns the current tick without requiring mutable access
    pub fn current_ticks(&self) -> Tick {
        self.ticks
    }
}

impl TimerDevice for SimTimerDevice {
    fn poll_ticks(&mut self) -> Tick {
        self.ticks
    }
}

/// Turns timer readings into tick announcements
///
/// Plays the role of the timer interrupt handler: each `poll` reads the
/// device and announces whatever elapsed since the previous reading.
#[derive(Debug)]
pub struct TickDriver<T: TimerDevice> {
    timer: T,
    last: Tick,
}

impl<T: TimerDevice> TickDriver<T> {
    /// Creates a driver; the device's current reading is the baseline
    pub fn new(mut timer: T) -> Self {
        let last = timer.poll_ticks();
        Self { timer, last }
    }

    /// Announces the ticks elapsed since the last poll
    ///
    /// Returns the number of waits that expired.
    pub fn poll<S: Scheduler, L: TimeoutLedger>(&mut self, kernel: &mut Kernel<S, L>) -> usize {
        let current = self.timer.poll_ticks();
        let elapsed = current.ticks_since(self.last);
        self.last = current;
        if elapsed == 0 {
            return 0;
        }
        log::trace!("timer: {} tick(s) elapsed", elapsed);
        kernel.tick_announce(elapsed)
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}
