/*!
 * Syscall Context
 *
 * Handle through which a running task reaches the kernel. One context exists
 * per execution context and carries the caller's process and thread ids.
 */

use crate::core::types::{Pid, Tid};
use crate::kernel::state::KernelGuard;
use crate::kernel::Kernel;

/// Syscall surface of the kernel, bound to one calling thread
pub struct Context {
    kernel: Kernel,
    pid: Pid,
    tid: Tid,
}

impl Context {
    pub(crate) fn new(kernel: Kernel, pid: Pid, tid: Tid) -> Self {
        Self { kernel, pid, tid }
    }

    /// Process of the calling thread
    #[inline(always)]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Execution record of the calling thread
    #[inline(always)]
    pub fn thread_self(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub(crate) fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Take the kernel lock
    #[inline]
    pub(crate) fn lock(&self) -> KernelGuard<'_> {
        self.kernel.lock()
    }

    pub(crate) fn record_fault(&self, message: String) {
        self.lock().faults.push(message);
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("pid", &self.pid)
            .field("tid", &self.tid)
            .finish()
    }
}
