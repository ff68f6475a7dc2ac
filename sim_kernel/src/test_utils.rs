//! Test utilities
//!
//! Helpers for building simulated kernels in unit and integration tests.

use crate::interrupts::{InterruptProbe, SimInterruptController};
use crate::scheduler::SimScheduler;
use core_types::{Priority, ThreadId, Timeout, WaitQueueId};
use wait_core::{DefaultLedger, Kernel, KernelConfig, TimeoutLedger};

/// A kernel driven by the simulated scheduler
pub type SimKernel<L = DefaultLedger> = Kernel<SimScheduler, L>;

/// Creates a kernel with the audit log on and an empty script
pub fn sim_kernel() -> (SimKernel, InterruptProbe) {
    sim_kernel_with(KernelConfig::audited(), SimScheduler::new())
}

/// Creates a kernel with explicit configuration, scheduler and ledger
pub fn sim_kernel_with<L: TimeoutLedger>(
    config: KernelConfig,
    scheduler: SimScheduler,
) -> (SimKernel<L>, InterruptProbe) {
    let controller = SimInterruptController::new();
    let probe = controller.probe();
    let kernel = Kernel::with_config(scheduler, Box::new(controller), config);
    (kernel, probe)
}

/// Spawns a thread and dispatches it immediately
pub fn spawn_running<L: TimeoutLedger>(kernel: &mut SimKernel<L>, name: &str) -> ThreadId {
    let thread = kernel
        .spawn_thread(name, Priority::default())
        .unwrap_or_else(|err| panic!("failed to spawn {}: {}", name, err));
    SimScheduler::dispatch(kernel, thread);
    thread
}

/// Spawns a thread and parks it on `queue`
pub fn spawn_waiter<L: TimeoutLedger>(
    kernel: &mut SimKernel<L>,
    name: &str,
    queue: WaitQueueId,
    timeout: Timeout,
) -> ThreadId {
    spawn_running(kernel, name);
    SimScheduler::pend_current(kernel, queue, timeout)
        .unwrap_or_else(|| panic!("{} was not dispatched", name))
}
