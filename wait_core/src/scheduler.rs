//! Scheduler collaborator contract
//!
//! The blocking core never picks which thread runs next. It only needs to
//! hand woken threads to a ready set and to yield the CPU at the single
//! suspension point of `block`.

use crate::critical::IrqKey;
use crate::kernel::Kernel;
use crate::timeout::TimeoutLedger;
use core_types::ThreadId;

/// Ready-queue and dispatch policy consumed by the blocking core
pub trait Scheduler: Sized {
    /// Places a READY thread on the ready set for future dispatch
    ///
    /// Called with the critical section held; must not suspend.
    fn admit_ready(&mut self, thread: ThreadId);

    /// The thread currently executing, if any
    fn current_thread(&self) -> Option<ThreadId>;

    /// Yields the CPU on behalf of the current (now BLOCKED) thread
    ///
    /// Receives the key taken before the thread pended and must release it
    /// at the moment of yielding, so no wake can be observed before the
    /// thread is on its wait queue. Returns a fresh key once the thread
    /// has been redispatched; its state is RUNNING again by then.
    fn suspend_current<L: TimeoutLedger>(kernel: &mut Kernel<Self, L>, key: IrqKey) -> IrqKey;
}
