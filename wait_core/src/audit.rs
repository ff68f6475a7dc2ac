//! Wait Audit Log
//!
//! Records block/wake/expire transitions for test verification and
//! debugging. Not a production trace; it exists to prove the protocol
//! hands out exactly one outcome per wait.

use core_types::{Deadline, ThreadId, Tick, WaitOutcome, WaitQueueId};
use serde::{Deserialize, Serialize};

/// One transition of the block/unblock protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitEvent {
    /// Thread pended on a queue
    Blocked {
        thread: ThreadId,
        queue: WaitQueueId,
        deadline: Deadline,
        tick: Tick,
    },
    /// Thread taken off a queue by a producer
    Woken {
        thread: ThreadId,
        queue: WaitQueueId,
        tick: Tick,
    },
    /// Thread's bounded wait expired
    TimedOut {
        thread: ThreadId,
        queue: Option<WaitQueueId>,
        tick: Tick,
    },
    /// Thread collected its outcome after being redispatched
    Resumed {
        thread: ThreadId,
        outcome: WaitOutcome,
        tick: Tick,
    },
}

impl WaitEvent {
    /// The thread this event is about
    pub fn thread(&self) -> ThreadId {
        match self {
            WaitEvent::Blocked { thread, .. }
            | WaitEvent::Woken { thread, .. }
            | WaitEvent::TimedOut { thread, .. }
            | WaitEvent::Resumed { thread, .. } => *thread,
        }
    }

    /// Tick at which the event was recorded
    pub fn tick(&self) -> Tick {
        match self {
            WaitEvent::Blocked { tick, .. }
            | WaitEvent::Woken { tick, .. }
            | WaitEvent::TimedOut { tick, .. }
            | WaitEvent::Resumed { tick, .. } => *tick,
        }
    }
}

/// Wait audit log for testing
///
/// Disabled logs drop events on the floor.
#[derive(Debug, Clone)]
pub struct WaitAuditLog {
    enabled: bool,
    events: Vec<WaitEvent>,
}

impl WaitAuditLog {
    /// Creates a new empty audit log
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Records an event
    pub fn record(&mut self, event: WaitEvent) {
        if self.enabled {
            self.events.push(event);
        }
    }

    /// Returns all recorded events
    pub fn events(&self) -> &[WaitEvent] {
        &self.events
    }

    /// Clears all recorded events
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns events matching a predicate
    pub fn find_events<F>(&self, predicate: F) -> Vec<&WaitEvent>
    where
        F: Fn(&WaitEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).collect()
    }

    /// Checks if any event matches a predicate
    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&WaitEvent) -> bool,
    {
        self.events.iter().any(predicate)
    }

    /// Counts events matching a predicate
    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&WaitEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(e)).count()
    }
}

impl Default for WaitAuditLog {
    fn default() -> Self {
        Self::new(true)
    }
}
