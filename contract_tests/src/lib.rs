//! # Wait Core Contract Tests
//!
//! Kernel objects built only from the contracts the blocking core
//! exposes, plus integration tests (under `tests/`) that pin down its
//! observable behavior.
//!
//! ## Philosophy
//!
//! - **Explicit over implicit**: Every testable property is a named test
//! - **Layered like the real thing**: Objects keep their own state and
//!   call into the core only to wait and to wake
//! - **Mechanism not policy**: The objects here are deliberately minimal

use core_types::{ThreadId, Timeout, WaitOutcome, WaitQueueId};
use thiserror::Error;
use wait_core::{Kernel, Scheduler, TimeoutLedger};

/// Why a wait on a kernel object did not succeed
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Object unavailable and the caller asked not to wait
    #[error("Object unavailable")]
    Unavailable,

    /// Bounded wait expired
    #[error("Wait timed out")]
    TimedOut,
}

/// Counting semaphore
///
/// `give` hands the token straight to the first waiter if there is one;
/// the count only grows when nobody is waiting.
#[derive(Debug)]
pub struct Semaphore {
    count: u32,
    limit: u32,
    wait_queue: WaitQueueId,
}

impl Semaphore {
    pub fn new<S: Scheduler, L: TimeoutLedger>(kernel: &mut Kernel<S, L>, initial: u32, limit: u32) -> Self {
        Self {
            count: initial.min(limit),
            limit,
            wait_queue: kernel.wait_queue_init(),
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn wait_queue(&self) -> WaitQueueId {
        self.wait_queue
    }

    /// Takes one token, waiting up to `timeout` for it
    pub fn take<S: Scheduler, L: TimeoutLedger>(
        &mut self,
        kernel: &mut Kernel<S, L>,
        thread: ThreadId,
        timeout: Timeout,
    ) -> Result<(), WaitError> {
        let key = kernel.irq_lock();
        if self.count > 0 {
            self.count -= 1;
            kernel.irq_unlock(key);
            return Ok(());
        }
        if timeout == Timeout::NO_WAIT {
            kernel.irq_unlock(key);
            return Err(WaitError::Unavailable);
        }

        let (outcome, key) = kernel.block_locked(key, thread, self.wait_queue, timeout);
        kernel.irq_unlock(key);
        match outcome {
            WaitOutcome::WokenByEvent => Ok(()),
            WaitOutcome::TimedOut => Err(WaitError::TimedOut),
        }
    }

    /// Releases one token; returns the thread it was handed to, if any
    pub fn give<S: Scheduler, L: TimeoutLedger>(&mut self, kernel: &mut Kernel<S, L>) -> Option<ThreadId> {
        let key = kernel.irq_lock();
        let woken = kernel.unblock_first(self.wait_queue);
        if woken.is_none() && self.count < self.limit {
            self.count += 1;
        }
        kernel.irq_unlock(key);
        woken
    }
}

/// Level-triggered flag with broadcast wake
///
/// Waiters re-check the flag after every wake and go back to sleep for
/// whatever is left of their original timeout if it is still clear.
#[derive(Debug)]
pub struct Signal {
    raised: bool,
    wait_queue: WaitQueueId,
}

impl Signal {
    pub fn new<S: Scheduler, L: TimeoutLedger>(kernel: &mut Kernel<S, L>) -> Self {
        Self {
            raised: false,
            wait_queue: kernel.wait_queue_init(),
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn wait_queue(&self) -> WaitQueueId {
        self.wait_queue
    }

    /// Sets the flag and wakes every waiter
    pub fn raise<S: Scheduler, L: TimeoutLedger>(&mut self, kernel: &mut Kernel<S, L>) -> Vec<ThreadId> {
        let key = kernel.irq_lock();
        self.raised = true;
        let woken = kernel.unblock_all(self.wait_queue);
        kernel.irq_unlock(key);
        woken
    }

    pub fn clear(&mut self) {
        self.raised = false;
    }

    /// Waits until the flag is raised, at most `timeout` ticks in total
    pub fn wait<S: Scheduler, L: TimeoutLedger>(
        &self,
        kernel: &mut Kernel<S, L>,
        thread: ThreadId,
        timeout: Timeout,
    ) -> Result<(), WaitError> {
        let mut key = kernel.irq_lock();
        let limit = timeout
            .deadline_from(kernel.tick_get())
            .tick()
            .unwrap_or_else(|| kernel.tick_get());
        let mut remaining = timeout;

        let result = loop {
            if self.raised {
                break Ok(());
            }
            if remaining == Timeout::NO_WAIT {
                break Err(if timeout == Timeout::NO_WAIT {
                    WaitError::Unavailable
                } else {
                    WaitError::TimedOut
                });
            }
            let (outcome, relocked) = kernel.block_locked(key, thread, self.wait_queue, remaining);
            key = relocked;
            if outcome == WaitOutcome::TimedOut {
                break Err(WaitError::TimedOut);
            }
            remaining = timeout.remaining(limit, kernel.tick_get());
        };

        kernel.irq_unlock(key);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_kernel::test_utils::{sim_kernel, spawn_running, spawn_waiter};
    use sim_kernel::SimScheduler;

    #[test]
    fn test_semaphore_take_available() {
        let (mut kernel, _) = sim_kernel();
        let mut sem = Semaphore::new(&mut kernel, 2, 2);
        let thread = spawn_running(&mut kernel, "t");

        assert_eq!(sem.take(&mut kernel, thread, Timeout::NO_WAIT), Ok(()));
        assert_eq!(sem.take(&mut kernel, thread, Timeout::Forever), Ok(()));
        assert_eq!(sem.count(), 0);
        assert_eq!(
            sem.take(&mut kernel, thread, Timeout::NO_WAIT),
            Err(WaitError::Unavailable)
        );
    }

    #[test]
    fn test_semaphore_give_respects_limit() {
        let (mut kernel, _) = sim_kernel();
        let mut sem = Semaphore::new(&mut kernel, 0, 1);

        assert_eq!(sem.give(&mut kernel), None);
        assert_eq!(sem.give(&mut kernel), None);
        assert_eq!(sem.count(), 1);
    }

    #[test]
    fn test_semaphore_give_hands_token_to_waiter() {
        let (mut kernel, probe) = sim_kernel();
        let mut sem = Semaphore::new(&mut kernel, 0, 5);
        let waiter = spawn_waiter(&mut kernel, "w", sem.wait_queue(), Timeout::Forever);

        assert_eq!(sem.give(&mut kernel), Some(waiter));
        assert_eq!(sem.count(), 0);
        assert!(probe.interrupts_enabled());
    }

    #[test]
    fn test_signal_already_raised() {
        let (mut kernel, _) = sim_kernel();
        let mut signal = Signal::new(&mut kernel);
        signal.raise(&mut kernel);
        let thread = spawn_running(&mut kernel, "t");

        assert_eq!(signal.wait(&mut kernel, thread, Timeout::NO_WAIT), Ok(()));
        signal.clear();
        assert_eq!(
            signal.wait(&mut kernel, thread, Timeout::NO_WAIT),
            Err(WaitError::Unavailable)
        );
    }

    #[test]
    fn test_signal_raise_wakes_everyone() {
        let (mut kernel, _) = sim_kernel();
        let mut signal = Signal::new(&mut kernel);
        let a = spawn_waiter(&mut kernel, "a", signal.wait_queue(), Timeout::Forever);
        let b = spawn_waiter(&mut kernel, "b", signal.wait_queue(), Timeout::Ticks(9));

        assert_eq!(signal.raise(&mut kernel), vec![a, b]);
        assert!(signal.is_raised());
        assert!(kernel.ledger().is_empty());
        assert_eq!(SimScheduler::dispatch_next(&mut kernel), Some(a));
    }
}
