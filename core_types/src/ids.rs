//! Unique identifiers for kernel entities

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a kernel instance
///
/// Each kernel context mints its own id at construction. Handles carry it
/// so that a handle from one instance is rejected by every other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KernelId(Uuid);

impl KernelId {
    /// Creates a new random kernel ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a kernel ID from a UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for KernelId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for KernelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kernel({})", self.0)
    }
}

/// Handle to a thread record in a kernel's thread arena
///
/// Threads are owned by the scheduler side of the kernel; wait queues and
/// the timeout ledger only ever hold this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId {
    kernel: KernelId,
    index: u32,
}

impl ThreadId {
    /// Creates a thread handle for slot `index` of `kernel`
    pub fn new(kernel: KernelId, index: u32) -> Self {
        Self { kernel, index }
    }

    /// Returns the kernel that minted this handle
    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    /// Returns the arena slot
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread({})", self.index)
    }
}

/// Handle to a wait queue registered with a kernel
///
/// The kernel object that created the queue owns the handle; the kernel
/// keeps the queue body so timeout expiry can reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WaitQueueId {
    kernel: KernelId,
    index: u32,
}

impl WaitQueueId {
    /// Creates a wait queue handle for slot `index` of `kernel`
    pub fn new(kernel: KernelId, index: u32) -> Self {
        Self { kernel, index }
    }

    /// Returns the kernel that minted this handle
    pub fn kernel(&self) -> KernelId {
        self.kernel
    }

    /// Returns the arena slot
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl fmt::Display for WaitQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WaitQueue({})", self.index)
    }
}
