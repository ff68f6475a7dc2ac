//! Tick arithmetic

use core::ops::Add;
use serde::{Deserialize, Serialize};

/// An absolute point on the kernel's tick line
///
/// Ticks are a fixed-width wrapping counter. Two ticks can only be ordered
/// relative to each other through their wrapping difference, never by
/// comparing raw values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tick(pub u32);

impl Tick {
    /// Tick zero, the boot-time value of the counter
    pub const ZERO: Tick = Tick(0);

    /// Returns the raw counter value
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the tick `ticks` after this one, wrapping
    pub const fn wrapping_add(self, ticks: u32) -> Tick {
        Tick(self.0.wrapping_add(ticks))
    }

    /// Returns the number of ticks elapsed since `earlier`, wrapping
    pub const fn ticks_since(self, earlier: Tick) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

impl Add<u32> for Tick {
    type Output = Tick;

    fn add(self, ticks: u32) -> Self::Output {
        self.wrapping_add(ticks)
    }
}

/// How long a thread is willing to stay blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeout {
    /// Bounded wait of this many ticks
    Ticks(u32),
    /// Unbounded wait; no timeout ledger entry is ever created
    Forever,
}

impl Timeout {
    /// Bounded wait that expires on the next tick announcement
    pub const NO_WAIT: Timeout = Timeout::Ticks(0);

    /// Returns true if this timeout is bounded
    pub const fn is_bounded(&self) -> bool {
        matches!(self, Timeout::Ticks(_))
    }

    /// Returns the absolute deadline of this timeout when started at `now`
    pub fn deadline_from(&self, now: Tick) -> Deadline {
        match self {
            Timeout::Ticks(ticks) => Deadline::At(now.wrapping_add(*ticks)),
            Timeout::Forever => Deadline::Unbounded,
        }
    }

    /// Returns what is left of this timeout given its absolute `limit`
    ///
    /// Kernel objects that loop after a wake (the object was taken by
    /// someone else first) call this before blocking again, so the total
    /// wait never exceeds the caller's original bound. A limit that has
    /// already passed leaves nothing. Limits are interpreted within half
    /// the tick range of `now`.
    pub fn remaining(&self, limit: Tick, now: Tick) -> Timeout {
        match self {
            Timeout::Forever => Timeout::Forever,
            Timeout::Ticks(_) => {
                let left = limit.0.wrapping_sub(now.0) as i32;
                Timeout::Ticks(left.max(0) as u32)
            }
        }
    }
}

impl From<u32> for Timeout {
    fn from(ticks: u32) -> Self {
        Timeout::Ticks(ticks)
    }
}

/// An absolute expiry, or none
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Deadline {
    /// Expires at this tick
    At(Tick),
    /// Nothing pending
    Unbounded,
}

impl Deadline {
    /// Returns the tick, if bounded
    pub fn tick(&self) -> Option<Tick> {
        match self {
            Deadline::At(tick) => Some(*tick),
            Deadline::Unbounded => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_wrapping_add() {
        assert_eq!(Tick(10).wrapping_add(5), Tick(15));
        assert_eq!(Tick(u32::MAX).wrapping_add(1), Tick(0));
        assert_eq!(Tick(u32::MAX - 2) + 5, Tick(2));
    }

    #[test]
    fn test_ticks_since_across_wrap() {
        assert_eq!(Tick(15).ticks_since(Tick(10)), 5);
        assert_eq!(Tick(2).ticks_since(Tick(u32::MAX - 2)), 5);
    }

    #[test]
    fn test_deadline_from() {
        assert_eq!(
            Timeout::Ticks(5).deadline_from(Tick(100)),
            Deadline::At(Tick(105))
        );
        assert_eq!(Timeout::Forever.deadline_from(Tick(100)), Deadline::Unbounded);
        assert_eq!(
            Timeout::Ticks(10).deadline_from(Tick(u32::MAX - 4)),
            Deadline::At(Tick(5))
        );
    }

    #[test]
    fn test_remaining_counts_down() {
        let limit = Tick(110);
        assert_eq!(Timeout::Ticks(10).remaining(limit, Tick(100)), Timeout::Ticks(10));
        assert_eq!(Timeout::Ticks(10).remaining(limit, Tick(104)), Timeout::Ticks(6));
        assert_eq!(Timeout::Ticks(10).remaining(limit, Tick(110)), Timeout::Ticks(0));
    }

    #[test]
    fn test_remaining_after_limit_is_zero() {
        assert_eq!(
            Timeout::Ticks(10).remaining(Tick(110), Tick(115)),
            Timeout::NO_WAIT
        );
    }

    #[test]
    fn test_remaining_across_wrap() {
        let limit = Tick(3);
        let now = Tick(u32::MAX - 1);
        assert_eq!(Timeout::Ticks(8).remaining(limit, now), Timeout::Ticks(5));
    }

    #[test]
    fn test_remaining_forever_stays_forever() {
        assert_eq!(
            Timeout::Forever.remaining(Tick(0), Tick(1_000)),
            Timeout::Forever
        );
    }

    #[test]
    fn test_bounded() {
        assert!(Timeout::NO_WAIT.is_bounded());
        assert!(Timeout::from(7).is_bounded());
        assert!(!Timeout::Forever.is_bounded());
        assert_eq!(Deadline::At(Tick(4)).tick(), Some(Tick(4)));
        assert_eq!(Deadline::Unbounded.tick(), None);
    }
}
