//! Simulated Scheduler
//!
//! Deterministic collaborator for the blocking core.
//!
//! ## Philosophy
//!
//! - **Mechanism, not policy**: FIFO dispatch, no priorities, no
//!   preemption. The core only needs somewhere to put READY threads.
//! - **Determinism first**: Same script => same schedule.
//! - **No hidden yields**: The only suspension is the one `block` asks for.
//!
//! ## Suspension
//!
//! There is one host thread. When a simulated thread suspends, the
//! scheduler stands in for everything else the system would do: it plays
//! the [`InterruptScript`] one event at a time until the thread is no
//! longer BLOCKED, then redispatches it. Events are delivered only while
//! interrupts are enabled, so a thread that suspends while a caller
//! further up still masks interrupts never sees its wake and the core
//! reports the breach.

use crate::interrupt_script::{InterruptScript, SimEvent};
use core_types::{ThreadId, ThreadState, Tick, Timeout, WaitQueueId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use wait_core::{IrqKey, Kernel, Scheduler, TimeoutLedger};

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimSchedulerConfig {
    /// Upper bound on scripted events consumed by one suspension
    pub max_events_per_suspend: usize,
}

impl Default for SimSchedulerConfig {
    fn default() -> Self {
        Self {
            max_events_per_suspend: 10_000,
        }
    }
}

/// Scheduling event for audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    /// Thread was placed on the run queue
    ThreadAdmitted { thread: ThreadId },
    /// Thread gave up the CPU to wait
    ThreadSuspended { thread: ThreadId, tick: Tick },
    /// Thread was dispatched
    ThreadSelected { thread: ThreadId, tick: Tick },
    /// A scripted interrupt fired
    InterruptDelivered { event: SimEvent, tick: Tick },
}

/// Run queue for threads
///
/// Simple FIFO: admitted at the back, dispatched from the front.
#[derive(Debug, Default)]
struct RunQueue {
    queue: VecDeque<ThreadId>,
}

impl RunQueue {
    fn enqueue(&mut self, thread: ThreadId) {
        self.queue.push_back(thread);
    }

    fn dequeue(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    fn remove(&mut self, thread: ThreadId) {
        self.queue.retain(|&id| id != thread);
    }

    fn contains(&self, thread: ThreadId) -> bool {
        self.queue.contains(&thread)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Deterministic single-core scheduler
#[derive(Debug, Default)]
pub struct SimScheduler {
    config: SimSchedulerConfig,
    run_queue: RunQueue,
    current: Option<ThreadId>,
    script: InterruptScript,
    /// Audit log for scheduling events (test-only)
    audit_log: Vec<ScheduleEvent>,
}

impl SimScheduler {
    /// Creates a new scheduler with default configuration
    pub fn new() -> Self {
        Self::with_config(SimSchedulerConfig::default())
    }

    pub fn with_config(config: SimSchedulerConfig) -> Self {
        Self {
            config,
            run_queue: RunQueue::default(),
            current: None,
            script: InterruptScript::new(),
            audit_log: Vec::new(),
        }
    }

    /// Installs the script played while threads are suspended
    pub fn with_script(mut self, script: InterruptScript) -> Self {
        self.script = script;
        self
    }

    pub fn config(&self) -> &SimSchedulerConfig {
        &self.config
    }

    pub fn script(&self) -> &InterruptScript {
        &self.script
    }

    pub fn script_mut(&mut self) -> &mut InterruptScript {
        &mut self.script
    }

    /// Appends one event to the script
    pub fn push_event(&mut self, event: SimEvent) {
        self.script.push(event);
    }

    /// Returns true if the thread is waiting on the run queue
    pub fn is_queued(&self, thread: ThreadId) -> bool {
        self.run_queue.contains(thread)
    }

    /// Threads on the run queue, next to be dispatched first
    pub fn ready_threads(&self) -> Vec<ThreadId> {
        self.run_queue.queue.iter().copied().collect()
    }

    pub fn run_queue_len(&self) -> usize {
        self.run_queue.len()
    }

    /// Returns the scheduling audit log
    pub fn audit_log(&self) -> &[ScheduleEvent] {
        &self.audit_log
    }

    pub fn clear_audit_log(&mut self) {
        self.audit_log.clear();
    }

    /// Dispatches a specific READY thread, making it current
    ///
    /// A single core runs one context at a time, but the simulation does
    /// not preempt: the previous context is simply set aside. Tests park
    /// it first with [`pend_current`](Self::pend_current).
    pub fn dispatch<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>, thread: ThreadId) {
        let key = kernel.irq_lock();
        Self::dispatch_locked(kernel, &key, thread);
        kernel.irq_unlock(key);
    }

    /// Dispatches the thread at the front of the run queue
    pub fn dispatch_next<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>) -> Option<ThreadId> {
        let next = kernel.scheduler_mut().run_queue.dequeue()?;
        Self::dispatch(kernel, next);
        Some(next)
    }

    /// Pends the current thread and switches away without waiting for it
    ///
    /// Models "this thread blocked and something else is running now",
    /// which is how tests stack several waiters on one queue. The parked
    /// thread's outcome stays on its record; it never returns from a
    /// `block` call.
    pub fn pend_current<L: TimeoutLedger>(
        kernel: &mut Kernel<Self, L>,
        queue: WaitQueueId,
        timeout: Timeout,
    ) -> Option<ThreadId> {
        let thread = kernel.scheduler_mut().current.take()?;
        let key = kernel.irq_lock();
        kernel.pend(&key, thread, queue, timeout);
        let tick = kernel.tick_get();
        kernel
            .scheduler_mut()
            .audit_log
            .push(ScheduleEvent::ThreadSuspended { thread, tick });
        kernel.irq_unlock(key);
        Some(thread)
    }

    /// Delivers the next scripted event, if any
    pub fn deliver_next<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>) -> Option<SimEvent> {
        let event = kernel.scheduler_mut().script.next_event()?;
        Self::deliver(kernel, event);
        Some(event)
    }

    /// Delivers every remaining scripted event
    pub fn run_script<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>) -> usize {
        let mut delivered = 0;
        while Self::deliver_next(kernel).is_some() {
            delivered += 1;
        }
        delivered
    }

    fn deliver<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>, event: SimEvent) {
        let tick = kernel.tick_get();
        log::trace!("interrupt at tick {}: {:?}", tick.as_u32(), event);
        kernel
            .scheduler_mut()
            .audit_log
            .push(ScheduleEvent::InterruptDelivered { event, tick });

        match event {
            SimEvent::Tick(elapsed) => {
                kernel.tick_announce(elapsed);
            }
            SimEvent::UnblockFirst(queue) => {
                kernel.unblock_first(queue);
            }
            SimEvent::UnblockAll(queue) => {
                kernel.unblock_all(queue);
            }
        }
    }

    fn dispatch_locked<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>, key: &IrqKey, thread: ThreadId) {
        kernel.set_running(key, thread);
        let tick = kernel.tick_get();
        let scheduler = kernel.scheduler_mut();
        scheduler.run_queue.remove(thread);
        scheduler.current = Some(thread);
        scheduler
            .audit_log
            .push(ScheduleEvent::ThreadSelected { thread, tick });
        log::trace!("{} dispatched", thread);
    }
}

impl Scheduler for SimScheduler {
    fn admit_ready(&mut self, thread: ThreadId) {
        self.run_queue.enqueue(thread);
        self.audit_log.push(ScheduleEvent::ThreadAdmitted { thread });
    }

    fn current_thread(&self) -> Option<ThreadId> {
        self.current
    }

    fn suspend_current<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>, key: IrqKey) -> IrqKey {
        let Some(thread) = kernel.scheduler_mut().current.take() else {
            panic!("suspend_current called with no current thread");
        };
        let tick = kernel.tick_get();
        kernel
            .scheduler_mut()
            .audit_log
            .push(ScheduleEvent::ThreadSuspended { thread, tick });

        // Yield point: the pend is visible, interrupts may now fire
        kernel.irq_unlock(key);

        let budget = kernel.scheduler().config.max_events_per_suspend;
        let mut delivered = 0;
        while kernel.thread_state(thread) == Ok(ThreadState::Blocked) {
            if !kernel.critical_section().interrupts_enabled() {
                log::warn!("{} suspended with interrupts masked", thread);
                break;
            }
            if delivered >= budget {
                log::warn!("{} still blocked after {} events", thread, delivered);
                break;
            }
            if Self::deliver_next(kernel).is_none() {
                break;
            }
            delivered += 1;
        }

        let key = kernel.irq_lock();
        if kernel.thread_state(thread) == Ok(ThreadState::Ready) {
            Self::dispatch_locked(kernel, &key, thread);
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sim_kernel, sim_kernel_with, spawn_running};
    use core_types::{Priority, WaitOutcome};
    use wait_core::KernelConfig;

    #[test]
    fn test_spawn_admits_in_fifo_order() {
        let (mut kernel, _) = sim_kernel();
        let a = kernel.spawn_thread("a", Priority::default()).unwrap();
        let b = kernel.spawn_thread("b", Priority::default()).unwrap();

        assert_eq!(kernel.scheduler().ready_threads(), vec![a, b]);
        assert_eq!(SimScheduler::dispatch_next(&mut kernel), Some(a));
        assert_eq!(kernel.scheduler().current_thread(), Some(a));
        assert_eq!(kernel.thread_state(a).unwrap(), ThreadState::Running);
        assert_eq!(kernel.scheduler().ready_threads(), vec![b]);
    }

    #[test]
    fn test_dispatch_next_on_empty_queue() {
        let (mut kernel, _) = sim_kernel();
        assert_eq!(SimScheduler::dispatch_next(&mut kernel), None);
    }

    #[test]
    fn test_block_woken_by_scripted_event() {
        let (mut kernel, probe) = sim_kernel();
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "consumer");
        kernel
            .scheduler_mut()
            .push_event(SimEvent::UnblockFirst(queue));

        let outcome = kernel.block(thread, queue, Timeout::Forever);

        assert_eq!(outcome, WaitOutcome::WokenByEvent);
        assert_eq!(kernel.scheduler().current_thread(), Some(thread));
        assert!(!kernel.scheduler().is_queued(thread));
        assert!(probe.interrupts_enabled());
    }

    #[test]
    fn test_block_times_out_on_scripted_ticks() {
        let scheduler = SimScheduler::new().with_script(InterruptScript::new().with_ticks(10));
        let (mut kernel, _) = sim_kernel_with::<wait_core::DeltaQueue>(KernelConfig::default(), scheduler);
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "sleeper");

        let outcome = kernel.block(thread, queue, Timeout::Ticks(4));

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(kernel.tick_get(), Tick(4));
        // Suspension stops consuming events once the thread is ready
        assert_eq!(kernel.scheduler().script().pending_count(), 6);
    }

    #[test]
    fn test_suspension_audit_trail() {
        let (mut kernel, _) = sim_kernel();
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "t");
        kernel.scheduler_mut().clear_audit_log();
        kernel
            .scheduler_mut()
            .push_event(SimEvent::UnblockAll(queue));

        kernel.block(thread, queue, Timeout::Forever);

        let log = kernel.scheduler().audit_log();
        assert_eq!(
            log,
            &[
                ScheduleEvent::ThreadSuspended {
                    thread,
                    tick: Tick(0)
                },
                ScheduleEvent::InterruptDelivered {
                    event: SimEvent::UnblockAll(queue),
                    tick: Tick(0)
                },
                ScheduleEvent::ThreadAdmitted { thread },
                ScheduleEvent::ThreadSelected {
                    thread,
                    tick: Tick(0)
                },
            ]
        );
    }

    #[test]
    #[should_panic(expected = "resumed while still blocked")]
    fn test_block_with_empty_script_is_a_lost_wakeup() {
        let (mut kernel, _) = sim_kernel();
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "t");
        kernel.block(thread, queue, Timeout::Forever);
    }

    #[test]
    #[should_panic(expected = "resumed while still blocked")]
    fn test_events_not_delivered_while_masked() {
        let (mut kernel, _) = sim_kernel();
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "t");
        kernel
            .scheduler_mut()
            .push_event(SimEvent::UnblockFirst(queue));

        // An outer critical section keeps interrupts masked across the
        // suspension, so the scripted wake can never arrive.
        let _outer = kernel.irq_lock();
        kernel.block(thread, queue, Timeout::Forever);
    }

    #[test]
    fn test_event_budget_bounds_suspension() {
        let scheduler = SimScheduler::with_config(SimSchedulerConfig {
            max_events_per_suspend: 2,
        })
        .with_script(InterruptScript::new().with_ticks(5));
        let (mut kernel, _) = sim_kernel_with::<wait_core::DeltaQueue>(KernelConfig::default(), scheduler);
        let queue = kernel.wait_queue_init();
        let thread = spawn_running(&mut kernel, "t");

        let key = kernel.irq_lock();
        kernel.pend(&key, thread, queue, Timeout::Forever);
        let key = SimScheduler::suspend_current(&mut kernel, key);
        kernel.irq_unlock(key);

        assert_eq!(kernel.thread_state(thread).unwrap(), ThreadState::Blocked);
        assert_eq!(kernel.scheduler().script().pending_count(), 3);
    }

    #[test]
    fn test_pend_current_parks_thread() {
        let (mut kernel, _) = sim_kernel();
        let queue = kernel.wait_queue_init();
        let a = spawn_running(&mut kernel, "a");

        assert_eq!(
            SimScheduler::pend_current(&mut kernel, queue, Timeout::Forever),
            Some(a)
        );
        assert_eq!(kernel.scheduler().current_thread(), None);
        assert_eq!(kernel.thread_state(a).unwrap(), ThreadState::Blocked);
        assert_eq!(
            SimScheduler::pend_current(&mut kernel, queue, Timeout::Forever),
            None
        );
    }

    #[test]
    fn test_run_script_outside_suspension() {
        let (mut kernel, _) = sim_kernel();
        kernel.scheduler_mut().push_event(SimEvent::Tick(2));
        kernel.scheduler_mut().push_event(SimEvent::Tick(3));

        assert_eq!(SimScheduler::run_script(&mut kernel), 2);
        assert_eq!(kernel.tick_get(), Tick(5));
    }
}
