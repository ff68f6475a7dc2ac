//! Timeout Ledger
//!
//! Deadline-ordered record of every bounded wait in one kernel instance.
//!
//! # Delta queue
//!
//! Entries are kept sorted by absolute deadline, but each stores only the
//! number of ticks between its deadline and the previous entry's (the head
//! is relative to the ledger's current tick). Consequences:
//!
//! - Advancing time touches only the head.
//! - Insertion walks the list once and adjusts at most two deltas.
//! - Cancelling an entry folds its delta into its successor.
//! - Tick wraparound never needs a wrapping comparison: deltas are
//!   differences by construction.
//!
//! Deltas are signed. An announcement that covers more than the head's
//! delta leaves the head negative; popping it carries the overshoot into
//! the next entry so that entry fires in the same pass if it is also due.
//!
//! # Build-time selection
//!
//! With the `timeouts` feature (the default) [`DefaultLedger`] is the
//! [`DeltaQueue`]. Without it, [`Untimed`] stands in and every wait is
//! unbounded.

use crate::error::{invariant_breach, CoreError};
use crate::thread::{Link, ThreadTable, TimeoutEntry};
use core_types::{Deadline, ThreadId, Tick, Timeout, WaitQueueId};

/// Ledger selected by the `timeouts` feature
#[cfg(feature = "timeouts")]
pub type DefaultLedger = DeltaQueue;

/// Ledger selected by the `timeouts` feature
#[cfg(not(feature = "timeouts"))]
pub type DefaultLedger = Untimed;

/// A popped ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    pub thread: ThreadId,
    /// Queue the thread was waiting on when its timeout was scheduled
    pub wait_queue: Option<WaitQueueId>,
}

/// Contract shared by the real delta queue and the untimed stub
///
/// Entries are embedded in thread records, so every mutating operation
/// takes the thread arena. Callers must hold the critical section.
pub trait TimeoutLedger: Sized {
    /// Whether this ledger honors bounded timeouts at all
    const BOUNDED: bool;

    /// Creates an empty ledger whose notion of "now" is `now`
    fn new(now: Tick) -> Self;

    /// The tick of the last announcement
    fn now(&self) -> Tick;

    /// Number of live entries
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registers a deadline `timeout` ticks from now
    ///
    /// `Timeout::Forever` creates no entry. A thread may own at most one
    /// live entry.
    fn schedule(
        &mut self,
        threads: &mut ThreadTable,
        thread: ThreadId,
        timeout: Timeout,
        wait_queue: Option<WaitQueueId>,
    ) -> Result<(), CoreError>;

    /// Removes the thread's entry if it has one
    ///
    /// Returns whether an entry was removed. Cancelling twice is a no-op
    /// the second time.
    fn cancel(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<bool, CoreError>;

    /// Moves "now" forward to `current_tick`
    ///
    /// Does not pop anything; follow with [`pop_expired`](Self::pop_expired)
    /// until it returns `None`.
    fn announce(&mut self, threads: &mut ThreadTable, current_tick: Tick) -> Result<(), CoreError>;

    /// Pops the head if its deadline has been reached
    fn pop_expired(&mut self, threads: &mut ThreadTable) -> Result<Option<Expiry>, CoreError>;

    /// Absolute deadline of the head, or `Unbounded` if nothing is pending
    fn earliest_deadline(&self, threads: &ThreadTable) -> Deadline;

    /// Announces `current_tick` and returns the expired entries, earliest
    /// deadline first
    ///
    /// The iterator is lazy: entries leave the ledger as they are yielded.
    fn advance<'a>(&'a mut self, threads: &'a mut ThreadTable, current_tick: Tick) -> Expired<'a, Self> {
        if let Err(err) = self.announce(threads, current_tick) {
            invariant_breach(err);
        }
        Expired {
            ledger: self,
            threads,
        }
    }
}

/// Lazy sequence of expirations produced by [`TimeoutLedger::advance`]
pub struct Expired<'a, L: TimeoutLedger> {
    ledger: &'a mut L,
    threads: &'a mut ThreadTable,
}

impl<L: TimeoutLedger> Iterator for Expired<'_, L> {
    type Item = Expiry;

    fn next(&mut self) -> Option<Self::Item> {
        self.ledger
            .pop_expired(self.threads)
            .unwrap_or_else(|err| invariant_breach(err))
    }
}

/// Delta-queue timeout ledger
#[derive(Debug, Clone)]
pub struct DeltaQueue {
    now: Tick,
    head: Option<ThreadId>,
    len: usize,
}

impl DeltaQueue {
    /// Absolute deadline of one thread's entry
    ///
    /// Walks back to the head, so this is O(position); meant for
    /// inspection rather than the tick path.
    pub fn deadline_of(&self, threads: &ThreadTable, thread: ThreadId) -> Result<Deadline, CoreError> {
        if threads.get(thread)?.timeout.is_none() {
            return Ok(Deadline::Unbounded);
        }
        let mut offset: i64 = 0;
        let mut cursor = Some(thread);
        while let Some(current) = cursor {
            let entry = threads.timeout(current)?;
            offset += entry.delta;
            cursor = entry.link.prev;
        }
        Ok(Deadline::At(self.now.wrapping_add(offset.max(0) as u32)))
    }

    /// Live entries in expiry order with their absolute deadlines
    pub fn entries(&self, threads: &ThreadTable) -> Result<Vec<(ThreadId, Tick)>, CoreError> {
        let mut out = Vec::with_capacity(self.len);
        let mut offset: i64 = 0;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let entry = threads.timeout(current)?;
            offset += entry.delta;
            out.push((current, self.now.wrapping_add(offset.max(0) as u32)));
            cursor = entry.link.next;
        }
        Ok(out)
    }

    fn unlink(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<TimeoutEntry, CoreError> {
        let entry = threads
            .get_mut(thread)?
            .timeout
            .take()
            .ok_or(CoreError::NotScheduled(thread))?;
        let Link { prev, next } = entry.link;

        match prev {
            Some(prev) => threads.timeout_mut(prev)?.link.next = next,
            None => self.head = next,
        }
        if let Some(next) = next {
            let successor = threads.timeout_mut(next)?;
            successor.link.prev = prev;
            successor.delta += entry.delta;
        }
        self.len -= 1;
        Ok(entry)
    }
}

impl TimeoutLedger for DeltaQueue {
    const BOUNDED: bool = true;

    fn new(now: Tick) -> Self {
        Self {
            now,
            head: None,
            len: 0,
        }
    }

    fn now(&self) -> Tick {
        self.now
    }

    fn len(&self) -> usize {
        self.len
    }

    fn schedule(
        &mut self,
        threads: &mut ThreadTable,
        thread: ThreadId,
        timeout: Timeout,
        wait_queue: Option<WaitQueueId>,
    ) -> Result<(), CoreError> {
        let Timeout::Ticks(ticks) = timeout else {
            return Ok(());
        };
        if threads.get(thread)?.timeout.is_some() {
            return Err(CoreError::AlreadyScheduled(thread));
        }

        // Equal deadlines keep insertion order: walk past entries due no
        // later than the new one.
        let mut remaining = i64::from(ticks);
        let mut prev = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let entry = threads.timeout(current)?;
            if remaining < entry.delta {
                break;
            }
            remaining -= entry.delta;
            prev = Some(current);
            cursor = entry.link.next;
        }

        let mut entry = TimeoutEntry::new(remaining, wait_queue);
        entry.link = Link { prev, next: cursor };
        threads.get_mut(thread)?.timeout = Some(entry);

        match prev {
            Some(prev) => threads.timeout_mut(prev)?.link.next = Some(thread),
            None => self.head = Some(thread),
        }
        if let Some(next) = cursor {
            let successor = threads.timeout_mut(next)?;
            successor.link.prev = Some(thread);
            successor.delta -= remaining;
        }
        self.len += 1;

        log::trace!(
            "timeout for {} scheduled at {} (+{})",
            thread,
            self.now.wrapping_add(ticks).as_u32(),
            ticks
        );
        Ok(())
    }

    fn cancel(&mut self, threads: &mut ThreadTable, thread: ThreadId) -> Result<bool, CoreError> {
        if threads.get(thread)?.timeout.is_none() {
            return Ok(false);
        }
        self.unlink(threads, thread)?;
        log::trace!("timeout for {} cancelled", thread);
        Ok(true)
    }

    fn announce(&mut self, threads: &mut ThreadTable, current_tick: Tick) -> Result<(), CoreError> {
        let elapsed = current_tick.ticks_since(self.now);
        self.now = current_tick;
        if let Some(head) = self.head {
            threads.timeout_mut(head)?.delta -= i64::from(elapsed);
        }
        Ok(())
    }

    fn pop_expired(&mut self, threads: &mut ThreadTable) -> Result<Option<Expiry>, CoreError> {
        let Some(head) = self.head else {
            return Ok(None);
        };
        if threads.timeout(head)?.delta > 0 {
            return Ok(None);
        }
        let entry = self.unlink(threads, head)?;
        log::trace!("timeout for {} expired at {}", head, self.now.as_u32());
        Ok(Some(Expiry {
            thread: head,
            wait_queue: entry.wait_queue,
        }))
    }

    fn earliest_deadline(&self, threads: &ThreadTable) -> Deadline {
        match self.head.and_then(|head| threads.timeout(head).ok()) {
            Some(entry) => Deadline::At(self.now.wrapping_add(entry.delta.max(0) as u32)),
            None => Deadline::Unbounded,
        }
    }
}

/// Ledger used when bounded timeouts are compiled out
///
/// Tracks the tick so `now()` stays meaningful; never holds an entry.
#[derive(Debug, Clone)]
pub struct Untimed {
    now: Tick,
}

impl TimeoutLedger for Untimed {
    const BOUNDED: bool = false;

    fn new(now: Tick) -> Self {
        Self { now }
    }

    fn now(&self) -> Tick {
        self.now
    }

    fn len(&self) -> usize {
        0
    }

    fn schedule(
        &mut self,
        _threads: &mut ThreadTable,
        _thread: ThreadId,
        _timeout: Timeout,
        _wait_queue: Option<WaitQueueId>,
    ) -> Result<(), CoreError> {
        Ok(())
    }

    fn cancel(&mut self, _threads: &mut ThreadTable, _thread: ThreadId) -> Result<bool, CoreError> {
        Ok(false)
    }

    fn announce(&mut self, _threads: &mut ThreadTable, current_tick: Tick) -> Result<(), CoreError> {
        self.now = current_tick;
        Ok(())
    }

    fn pop_expired(&mut self, _threads: &mut ThreadTable) -> Result<Option<Expiry>, CoreError> {
        Ok(None)
    }

    fn earliest_deadline(&self, _threads: &ThreadTable) -> Deadline {
        Deadline::Unbounded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{KernelId, Priority};

    fn table(count: usize) -> (ThreadTable, Vec<ThreadId>) {
        let mut threads = ThreadTable::new(KernelId::new(), 64);
        let ids = (0..count)
            .map(|i| threads.spawn(format!("t{}", i), Priority::default()).unwrap())
            .collect();
        (threads, ids)
    }

    fn deltas(ledger: &DeltaQueue, threads: &ThreadTable) -> Vec<i64> {
        ledger
            .entries(threads)
            .unwrap()
            .iter()
            .map(|(id, _)| threads.get(*id).unwrap().timeout_entry().unwrap().delta())
            .collect()
    }

    #[test]
    fn test_forever_creates_no_entry() {
        let (mut threads, ids) = table(1);
        let mut ledger = DeltaQueue::new(Tick::ZERO);

        ledger
            .schedule(&mut threads, ids[0], Timeout::Forever, None)
            .unwrap();

        assert!(ledger.is_empty());
        assert!(threads.get(ids[0]).unwrap().timeout_entry().is_none());
        assert_eq!(ledger.earliest_deadline(&threads), Deadline::Unbounded);
    }

    #[test]
    fn test_insert_keeps_deadline_order() {
        let (mut threads, ids) = table(3);
        let mut ledger = DeltaQueue::new(Tick::ZERO);

        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(10), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(3), None).unwrap();
        ledger.schedule(&mut threads, ids[2], Timeout::Ticks(7), None).unwrap();

        assert_eq!(
            ledger.entries(&threads).unwrap(),
            vec![(ids[1], Tick(3)), (ids[2], Tick(7)), (ids[0], Tick(10))]
        );
        assert_eq!(deltas(&ledger, &threads), vec![3, 4, 3]);
        assert_eq!(ledger.earliest_deadline(&threads), Deadline::At(Tick(3)));
    }

    #[test]
    fn test_equal_deadlines_keep_insertion_order() {
        let (mut threads, ids) = table(3);
        let mut ledger = DeltaQueue::new(Tick(20));

        for &id in &ids {
            ledger.schedule(&mut threads, id, Timeout::Ticks(4), None).unwrap();
        }

        let expired: Vec<_> = ledger
            .advance(&mut threads, Tick(24))
            .map(|expiry| expiry.thread)
            .collect();
        assert_eq!(expired, ids);
    }

    #[test]
    fn test_double_schedule_rejected() {
        let (mut threads, ids) = table(1);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(5), None).unwrap();

        assert_eq!(
            ledger.schedule(&mut threads, ids[0], Timeout::Ticks(9), None),
            Err(CoreError::AlreadyScheduled(ids[0]))
        );
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_cancel_folds_delta_into_successor() {
        let (mut threads, ids) = table(3);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(3), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(7), None).unwrap();
        ledger.schedule(&mut threads, ids[2], Timeout::Ticks(10), None).unwrap();

        assert!(ledger.cancel(&mut threads, ids[1]).unwrap());

        assert_eq!(
            ledger.entries(&threads).unwrap(),
            vec![(ids[0], Tick(3)), (ids[2], Tick(10))]
        );
        assert_eq!(deltas(&ledger, &threads), vec![3, 7]);
    }

    #[test]
    fn test_cancel_head_moves_earliest_deadline() {
        let (mut threads, ids) = table(2);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(3), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(8), None).unwrap();

        ledger.cancel(&mut threads, ids[0]).unwrap();

        assert_eq!(ledger.earliest_deadline(&threads), Deadline::At(Tick(8)));
        assert_eq!(
            ledger.deadline_of(&threads, ids[1]).unwrap(),
            Deadline::At(Tick(8))
        );
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let (mut threads, ids) = table(3);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(2), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(6), None).unwrap();

        assert!(ledger.cancel(&mut threads, ids[0]).unwrap());
        assert!(!ledger.cancel(&mut threads, ids[0]).unwrap());
        assert!(!ledger.cancel(&mut threads, ids[2]).unwrap());

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries(&threads).unwrap(), vec![(ids[1], Tick(6))]);
    }

    #[test]
    fn test_advance_fires_exactly_once() {
        let (mut threads, ids) = table(1);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(5), None).unwrap();

        assert_eq!(ledger.advance(&mut threads, Tick(4)).count(), 0);
        let fired: Vec<_> = ledger.advance(&mut threads, Tick(5)).collect();
        assert_eq!(
            fired,
            vec![Expiry {
                thread: ids[0],
                wait_queue: None
            }]
        );
        assert_eq!(ledger.advance(&mut threads, Tick(6)).count(), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_overshoot_carries_to_successor() {
        let (mut threads, ids) = table(3);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(3), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(5), None).unwrap();
        ledger.schedule(&mut threads, ids[2], Timeout::Ticks(12), None).unwrap();

        let fired: Vec<_> = ledger
            .advance(&mut threads, Tick(10))
            .map(|expiry| expiry.thread)
            .collect();

        assert_eq!(fired, vec![ids[0], ids[1]]);
        assert_eq!(ledger.entries(&threads).unwrap(), vec![(ids[2], Tick(12))]);
        assert_eq!(ledger.earliest_deadline(&threads), Deadline::At(Tick(12)));
    }

    #[test]
    fn test_schedule_after_advance_is_relative_to_now() {
        let (mut threads, ids) = table(2);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(10), None).unwrap();
        assert_eq!(ledger.advance(&mut threads, Tick(4)).count(), 0);

        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(3), None).unwrap();

        assert_eq!(
            ledger.entries(&threads).unwrap(),
            vec![(ids[1], Tick(7)), (ids[0], Tick(10))]
        );
    }

    #[test]
    fn test_expiry_reports_wait_queue() {
        let (mut threads, ids) = table(1);
        let queue = WaitQueueId::new(ids[0].kernel(), 3);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        ledger
            .schedule(&mut threads, ids[0], Timeout::NO_WAIT, Some(queue))
            .unwrap();

        let fired: Vec<_> = ledger.advance(&mut threads, Tick::ZERO).collect();
        assert_eq!(fired[0].wait_queue, Some(queue));
    }

    #[test]
    fn test_deadlines_across_wraparound() {
        let (mut threads, ids) = table(2);
        let mut ledger = DeltaQueue::new(Tick(u32::MAX - 2));
        ledger.schedule(&mut threads, ids[0], Timeout::Ticks(5), None).unwrap();
        ledger.schedule(&mut threads, ids[1], Timeout::Ticks(2), None).unwrap();

        assert_eq!(
            ledger.entries(&threads).unwrap(),
            vec![(ids[1], Tick(u32::MAX)), (ids[0], Tick(2))]
        );

        let fired: Vec<_> = ledger
            .advance(&mut threads, Tick(1))
            .map(|expiry| expiry.thread)
            .collect();
        assert_eq!(fired, vec![ids[1]]);

        let fired: Vec<_> = ledger
            .advance(&mut threads, Tick(2))
            .map(|expiry| expiry.thread)
            .collect();
        assert_eq!(fired, vec![ids[0]]);
    }

    #[test]
    fn test_interleaved_schedule_and_advance_yield_in_deadline_order() {
        let (mut threads, ids) = table(48);
        let mut ledger = DeltaQueue::new(Tick::ZERO);
        let mut deadlines = vec![0u64; ids.len()];
        let mut fired = Vec::new();
        let mut now: u64 = 0;
        let mut seed: u32 = 0x2545_f491;
        let mut next = move |bound: u32| {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) % bound
        };

        for (index, &id) in ids.iter().enumerate() {
            let ticks = next(40);
            deadlines[index] = now + u64::from(ticks);
            ledger
                .schedule(&mut threads, id, Timeout::Ticks(ticks), None)
                .unwrap();

            now += u64::from(next(6));
            for expiry in ledger.advance(&mut threads, Tick(now as u32)) {
                let index = expiry.thread.index() as usize;
                assert!(deadlines[index] <= now, "fired early");
                fired.push((deadlines[index], index));
            }
        }
        now += 100;
        for expiry in ledger.advance(&mut threads, Tick(now as u32)) {
            let index = expiry.thread.index() as usize;
            fired.push((deadlines[index], index));
        }

        assert_eq!(fired.len(), ids.len());
        assert!(fired.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_untimed_never_holds_entries() {
        let (mut threads, ids) = table(1);
        let mut ledger = Untimed::new(Tick(7));

        ledger
            .schedule(&mut threads, ids[0], Timeout::Ticks(1), None)
            .unwrap();

        assert!(!Untimed::BOUNDED);
        assert!(ledger.is_empty());
        assert!(threads.get(ids[0]).unwrap().timeout_entry().is_none());
        assert_eq!(ledger.earliest_deadline(&threads), Deadline::Unbounded);
        assert_eq!(ledger.advance(&mut threads, Tick(100)).count(), 0);
        assert_eq!(ledger.now(), Tick(100));
        assert!(!ledger.cancel(&mut threads, ids[0]).unwrap());
    }
}
