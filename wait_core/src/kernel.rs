//! # Kernel context
//!
//! One instance of the blocking core: thread arena, wait queues, timeout
//! ledger, tick counter, and the critical section that serializes them.
//!
//! ## Block/Unblock Protocol
//!
//! ```text
//!            pend                     unblock_first / unblock_all
//! RUNNING ─────────► BLOCKED ───────────────────────────────► READY
//!    ▲                  │          expire (tick announcement)     │
//!    │                  └────────────────────────────────────────►│
//!    └────────────────────── set_running (dispatch) ◄─────────────┘
//! ```
//!
//! A blocked thread is on exactly one wait queue and, for a bounded wait,
//! owns one ledger entry. Whichever of wake or expiry takes the critical
//! section first removes the thread from both and records its outcome; the
//! other finds the thread no longer BLOCKED (or no longer in the ledger)
//! and does nothing.
//!
//! Contract violations on this path are kernel invariant breaches and
//! halt through [`invariant_breach`].

use crate::audit::{WaitAuditLog, WaitEvent};
use crate::critical::{CriticalSection, IrqKey};
use crate::error::{invariant_breach, CoreError};
use crate::scheduler::Scheduler;
use crate::thread::{Thread, ThreadTable};
use crate::timeout::{DefaultLedger, Expiry, TimeoutLedger};
use crate::wait_queue::WaitQueue;
use core_types::{
    Deadline, KernelId, Priority, ThreadId, ThreadState, Tick, Timeout, WaitOutcome, WaitQueueId,
};
use hal::InterruptHal;

/// Run-time kernel configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Maximum number of thread records
    pub thread_capacity: usize,
    /// Tick counter value at boot
    pub initial_tick: Tick,
    /// Whether protocol transitions are recorded in the audit log
    ///
    /// The log is unbounded and is appended to under the interrupt mask;
    /// leave it off outside tests and simulation.
    pub audit: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            thread_capacity: 64,
            initial_tick: Tick::ZERO,
            audit: false,
        }
    }
}

impl KernelConfig {
    /// Default configuration with the audit log switched on
    pub fn audited() -> Self {
        Self {
            audit: true,
            ..Self::default()
        }
    }
}

/// Blocking-synchronization core of one kernel instance
pub struct Kernel<S: Scheduler, L: TimeoutLedger = DefaultLedger> {
    id: KernelId,
    config: KernelConfig,
    cs: CriticalSection,
    threads: ThreadTable,
    queues: Vec<WaitQueue>,
    ledger: L,
    /// Tick counter; written only by `tick_announce`
    ticks: Tick,
    scheduler: S,
    audit: WaitAuditLog,
}

impl<S: Scheduler, L: TimeoutLedger> Kernel<S, L> {
    /// Creates a kernel with the default configuration
    pub fn new(scheduler: S, irq: Box<dyn InterruptHal>) -> Self {
        Self::with_config(scheduler, irq, KernelConfig::default())
    }

    pub fn with_config(scheduler: S, irq: Box<dyn InterruptHal>, config: KernelConfig) -> Self {
        let id = KernelId::new();
        log::debug!(
            "{} booting at tick {} ({} threads, timeouts {})",
            id,
            config.initial_tick.as_u32(),
            config.thread_capacity,
            if L::BOUNDED { "on" } else { "off" }
        );
        Self {
            id,
            cs: CriticalSection::new(irq),
            threads: ThreadTable::new(id, config.thread_capacity),
            queues: Vec::new(),
            ledger: L::new(config.initial_tick),
            ticks: config.initial_tick,
            scheduler,
            audit: WaitAuditLog::new(config.audit),
            config,
        }
    }

    pub fn id(&self) -> KernelId {
        self.id
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    pub fn threads(&self) -> &ThreadTable {
        &self.threads
    }

    pub fn thread(&self, thread: ThreadId) -> Result<&Thread, CoreError> {
        self.threads.get(thread)
    }

    pub fn thread_state(&self, thread: ThreadId) -> Result<ThreadState, CoreError> {
        Ok(self.threads.get(thread)?.state())
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Returns the wait audit log
    ///
    /// Used in tests to verify each wait produced exactly one outcome.
    pub fn audit_log(&self) -> &WaitAuditLog {
        &self.audit
    }

    pub fn clear_audit_log(&mut self) {
        self.audit.clear();
    }

    pub fn critical_section(&self) -> &CriticalSection {
        &self.cs
    }

    /// Masks interrupts; nested use is safe
    pub fn irq_lock(&mut self) -> IrqKey {
        self.cs.acquire()
    }

    pub fn irq_unlock(&mut self, key: IrqKey) {
        self.cs.release(key);
    }

    /// Reads the tick counter
    pub fn tick_get(&self) -> Tick {
        self.ticks
    }

    /// Registers a thread record and hands it to the scheduler as READY
    pub fn spawn_thread(
        &mut self,
        name: impl Into<String>,
        priority: Priority,
    ) -> Result<ThreadId, CoreError> {
        let key = self.cs.acquire();
        let spawned = self.threads.spawn(name, priority);
        if let Ok(thread) = &spawned {
            log::debug!("{} spawned", thread);
            self.scheduler.admit_ready(*thread);
        }
        self.cs.release(key);
        spawned
    }

    /// Marks a READY thread as dispatched
    pub fn set_running(&mut self, _key: &IrqKey, thread: ThreadId) {
        let record = self
            .threads
            .get_mut(thread)
            .unwrap_or_else(|err| invariant_breach(err));
        if record.state != ThreadState::Ready {
            invariant_breach(CoreError::InvalidState {
                thread,
                actual: record.state,
                expected: ThreadState::Ready,
            });
        }
        record.state = ThreadState::Running;
    }

    // Wait queue operations

    /// Creates an empty wait queue for a new kernel object
    pub fn wait_queue_init(&mut self) -> WaitQueueId {
        let id = WaitQueueId::new(self.id, self.queues.len() as u32);
        self.queues.push(WaitQueue::new(id));
        id
    }

    /// Appends a thread to a wait queue without touching its state
    ///
    /// The caller must mark the thread BLOCKED before releasing the guard.
    /// A thread left on a queue in any other state is a corrupt membership:
    /// the next `unblock_first`/`unblock_all` reaching it halts through
    /// [`invariant_breach`]. [`pend`](Self::pend) does both steps.
    pub fn enqueue(&mut self, _key: &IrqKey, queue: WaitQueueId, thread: ThreadId) -> Result<(), CoreError> {
        let slot = self.queue_index(queue)?;
        self.queues[slot].enqueue(&mut self.threads, thread)
    }

    /// Removes the head of a wait queue without touching its state
    pub fn dequeue_first(&mut self, _key: &IrqKey, queue: WaitQueueId) -> Result<Option<ThreadId>, CoreError> {
        let slot = self.queue_index(queue)?;
        self.queues[slot].dequeue_first(&mut self.threads)
    }

    /// Removes a specific thread from a wait queue without touching its state
    pub fn remove(&mut self, _key: &IrqKey, queue: WaitQueueId, thread: ThreadId) -> Result<(), CoreError> {
        let slot = self.queue_index(queue)?;
        self.queues[slot].remove(&mut self.threads, thread)
    }

    pub fn is_empty(&self, queue: WaitQueueId) -> Result<bool, CoreError> {
        Ok(self.queues[self.queue_index(queue)?].is_empty())
    }

    /// Threads on a wait queue, next to be woken first
    pub fn waiters(&self, queue: WaitQueueId) -> Result<Vec<ThreadId>, CoreError> {
        let slot = self.queue_index(queue)?;
        Ok(self.queues[slot].iter(&self.threads).collect())
    }

    fn queue_index(&self, queue: WaitQueueId) -> Result<usize, CoreError> {
        if queue.kernel() != self.id {
            return Err(CoreError::ForeignHandle {
                kernel: self.id,
                handle_kernel: queue.kernel(),
            });
        }
        let slot = queue.index() as usize;
        if slot >= self.queues.len() {
            return Err(CoreError::UnknownWaitQueue(queue));
        }
        Ok(slot)
    }

    // Block/Unblock protocol

    /// Blocks `thread` on `queue` until woken or `timeout` expires
    ///
    /// The thread must be RUNNING. Returns once the scheduler has
    /// redispatched it.
    pub fn block(&mut self, thread: ThreadId, queue: WaitQueueId, timeout: Timeout) -> WaitOutcome {
        let key = self.cs.acquire();
        let (outcome, key) = self.block_locked(key, thread, queue, timeout);
        self.cs.release(key);
        outcome
    }

    /// [`block`](Self::block) for callers that already hold the guard
    ///
    /// Lets a kernel object test its own state and pend without a window
    /// in between. The key is consumed at the suspension point; the
    /// returned key is held again on resumption.
    pub fn block_locked(
        &mut self,
        key: IrqKey,
        thread: ThreadId,
        queue: WaitQueueId,
        timeout: Timeout,
    ) -> (WaitOutcome, IrqKey) {
        self.pend(&key, thread, queue, timeout);
        let key = S::suspend_current(self, key);
        let outcome = self.collect_outcome(&key, thread);
        (outcome, key)
    }

    /// Puts a RUNNING thread on `queue` and, for a bounded timeout, into
    /// the ledger; marks it BLOCKED
    ///
    /// Does not suspend. The caller must yield before releasing the guard.
    pub fn pend(&mut self, _key: &IrqKey, thread: ThreadId, queue: WaitQueueId, timeout: Timeout) {
        let timeout = if timeout.is_bounded() && !L::BOUNDED {
            log::warn!(
                "{} requested {:?} with timeouts disabled; waiting forever",
                thread,
                timeout
            );
            Timeout::Forever
        } else {
            timeout
        };
        if let Err(err) = self.try_pend(thread, queue, timeout) {
            invariant_breach(err);
        }

        let deadline = timeout.deadline_from(self.ticks);
        log::debug!("{} blocked on {} until {:?}", thread, queue, deadline);
        self.audit.record(WaitEvent::Blocked {
            thread,
            queue,
            deadline,
            tick: self.ticks,
        });
    }

    fn try_pend(&mut self, thread: ThreadId, queue: WaitQueueId, timeout: Timeout) -> Result<(), CoreError> {
        let state = self.threads.get(thread)?.state();
        if state != ThreadState::Running {
            return Err(CoreError::InvalidState {
                thread,
                actual: state,
                expected: ThreadState::Running,
            });
        }
        let slot = self.queue_index(queue)?;
        self.queues[slot].enqueue(&mut self.threads, thread)?;
        self.ledger
            .schedule(&mut self.threads, thread, timeout, Some(queue))?;

        let record = self.threads.get_mut(thread)?;
        record.state = ThreadState::Blocked;
        record.outcome = None;
        Ok(())
    }

    fn collect_outcome(&mut self, _key: &IrqKey, thread: ThreadId) -> WaitOutcome {
        let record = self
            .threads
            .get_mut(thread)
            .unwrap_or_else(|err| invariant_breach(err));
        let outcome = match (record.state, record.outcome.take()) {
            (ThreadState::Running, Some(outcome)) => outcome,
            (ThreadState::Blocked, _) | (_, None) => {
                invariant_breach(CoreError::ResumedWhileBlocked(thread))
            }
            (actual, Some(_)) => invariant_breach(CoreError::InvalidState {
                thread,
                actual,
                expected: ThreadState::Running,
            }),
        };

        log::debug!("{} resumed with {:?}", thread, outcome);
        self.audit.record(WaitEvent::Resumed {
            thread,
            outcome,
            tick: self.ticks,
        });
        outcome
    }

    /// Wakes the first waiter of `queue`
    ///
    /// Cancels its timeout, makes it READY with `WokenByEvent` and admits
    /// it to the scheduler. Returns `None` if nobody was waiting, in which
    /// case the caller typically records the event on its own object.
    pub fn unblock_first(&mut self, queue: WaitQueueId) -> Option<ThreadId> {
        let key = self.cs.acquire();
        let woken = self.wake_first(&key, queue);
        self.cs.release(key);
        woken
    }

    /// Wakes every waiter of `queue`, in FIFO order
    pub fn unblock_all(&mut self, queue: WaitQueueId) -> Vec<ThreadId> {
        let key = self.cs.acquire();
        let mut woken = Vec::new();
        while let Some(thread) = self.wake_first(&key, queue) {
            woken.push(thread);
        }
        self.cs.release(key);
        woken
    }

    fn wake_first(&mut self, _key: &IrqKey, queue: WaitQueueId) -> Option<ThreadId> {
        let woken = self
            .try_wake_first(queue)
            .unwrap_or_else(|err| invariant_breach(err))?;

        log::debug!("{} woken from {}", woken, queue);
        self.audit.record(WaitEvent::Woken {
            thread: woken,
            queue,
            tick: self.ticks,
        });
        Some(woken)
    }

    fn try_wake_first(&mut self, queue: WaitQueueId) -> Result<Option<ThreadId>, CoreError> {
        let slot = self.queue_index(queue)?;
        let Some(thread) = self.queues[slot].dequeue_first(&mut self.threads)? else {
            return Ok(None);
        };
        self.ledger.cancel(&mut self.threads, thread)?;
        self.make_ready(thread, WaitOutcome::WokenByEvent)?;
        Ok(Some(thread))
    }

    /// Times out a blocked thread
    ///
    /// Removes it from its wait queue and any ledger entry, makes it READY
    /// with `TimedOut` and admits it. Returns false without doing anything
    /// if the thread is no longer BLOCKED (it was woken first).
    pub fn expire(&mut self, _key: &IrqKey, thread: ThreadId) -> bool {
        match self.try_expire(thread) {
            Ok(Some(queue)) => {
                log::debug!("{} timed out", thread);
                self.audit.record(WaitEvent::TimedOut {
                    thread,
                    queue,
                    tick: self.ticks,
                });
                true
            }
            Ok(None) => {
                log::trace!("{} already woken; expiry ignored", thread);
                false
            }
            Err(err) => invariant_breach(err),
        }
    }

    /// Returns the queue the thread left, or `None` if it was not blocked
    fn try_expire(&mut self, thread: ThreadId) -> Result<Option<Option<WaitQueueId>>, CoreError> {
        let record = self.threads.get(thread)?;
        if record.state() != ThreadState::Blocked {
            return Ok(None);
        }
        let queue = record.wait_queue();
        if let Some(queue) = queue {
            let slot = self.queue_index(queue)?;
            self.queues[slot].remove(&mut self.threads, thread)?;
        }
        self.ledger.cancel(&mut self.threads, thread)?;
        self.make_ready(thread, WaitOutcome::TimedOut)?;
        Ok(Some(queue))
    }

    fn make_ready(&mut self, thread: ThreadId, outcome: WaitOutcome) -> Result<(), CoreError> {
        let record = self.threads.get_mut(thread)?;
        if record.state != ThreadState::Blocked {
            return Err(CoreError::InvalidState {
                thread,
                actual: record.state,
                expected: ThreadState::Blocked,
            });
        }
        record.state = ThreadState::Ready;
        record.outcome = Some(outcome);
        self.scheduler.admit_ready(thread);
        Ok(())
    }

    // Time

    /// Timer interrupt entry point
    ///
    /// Advances the tick counter by `elapsed`, expires every wait whose
    /// deadline has been reached, and returns how many expired.
    ///
    /// This is [`TimeoutLedger::advance`] unrolled: `expire` needs the
    /// whole kernel mutably, so the `Expired` iterator (which borrows the
    /// ledger and thread table) cannot stay alive across it. Entries are
    /// popped one at a time instead, in the same order.
    pub fn tick_announce(&mut self, elapsed: u32) -> usize {
        let key = self.cs.acquire();
        self.ticks = self.ticks.wrapping_add(elapsed);
        if let Err(err) = self.ledger.announce(&mut self.threads, self.ticks) {
            invariant_breach(err);
        }

        let mut expired = 0;
        loop {
            let next = self
                .ledger
                .pop_expired(&mut self.threads)
                .unwrap_or_else(|err| invariant_breach(err));
            let Some(expiry) = next else {
                break;
            };
            self.check_recorded_queue(&expiry);
            if self.expire(&key, expiry.thread) {
                expired += 1;
            }
        }

        self.cs.release(key);
        expired
    }

    fn check_recorded_queue(&self, expiry: &Expiry) {
        let current = self
            .threads
            .get(expiry.thread)
            .unwrap_or_else(|err| invariant_breach(err))
            .wait_queue();
        if let Some(recorded) = expiry.wait_queue {
            if current != Some(recorded) {
                invariant_breach(CoreError::NotInQueue {
                    thread: expiry.thread,
                    queue: recorded,
                });
            }
        }
    }

    /// Earliest pending deadline, for idle/power-management decisions
    pub fn earliest_deadline(&self) -> Deadline {
        self.ledger.earliest_deadline(&self.threads)
    }
}
