/*!
 * Task Executor
 * Spawns execution contexts and runs task entries on them
 */

use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::{ExitValue, Pid, TaskId, Tid};
use crate::kernel::Kernel;
use crate::monitoring::task_span;
use crate::process::types::ThreadState;
use crate::syscalls::Context;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// Exit value recorded for a task that panicked
pub const PANIC_EXIT_VALUE: ExitValue = -1;

/// Work handed to a spawner; runs to completion on its own execution context
pub type Body = Box<dyn FnOnce() + Send + 'static>;

/// Creates the execution contexts that run process and thread entries
///
/// `spawn` must not run `body` inline: the body takes the kernel lock, which
/// the caller still holds.
pub trait Spawner: Send + Sync {
    fn spawn(&self, name: String, body: Body) -> KernelResult<()>;
}

/// Spawner backed by OS threads
#[derive(Debug, Clone)]
pub struct ThreadSpawner {
    stack_size: usize,
}

impl ThreadSpawner {
    pub fn new(stack_size: usize) -> Self {
        Self { stack_size }
    }
}

impl Spawner for ThreadSpawner {
    fn spawn(&self, name: String, body: Body) -> KernelResult<()> {
        std::thread::Builder::new()
            .name(name)
            .stack_size(self.stack_size)
            .spawn(body)
            .map(|_| ())
            .map_err(|e| KernelError::SpawnFailed(e.to_string()))
    }
}

/// Unwind payload of `exit`/`thread_exit`; all kernel work is already done
struct Termination;

/// Leave the current task without returning to its entry
pub(crate) fn terminate() -> ! {
    panic::resume_unwind(Box::new(Termination))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

enum Outcome {
    Returned(ExitValue),
    Terminated,
    Panicked(String),
}

fn run_entry(run: impl FnOnce() -> ExitValue) -> Outcome {
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(value) => Outcome::Returned(value),
        Err(payload) if payload.is::<Termination>() => Outcome::Terminated,
        Err(payload) => Outcome::Panicked(panic_message(payload.as_ref())),
    }
}

/// Body of a process main thread
pub(crate) fn run_main(kernel: Kernel, pid: Pid, tid: Tid) {
    let _span = task_span(pid, tid).entered();
    let ctx = Context::new(kernel, pid, tid);
    let start = {
        let mut guard = ctx.lock();
        guard.set_thread_state(tid, ThreadState::Running);
        guard
            .processes
            .get_mut(pid)
            .and_then(|process| Some((process.entry.take()?, Arc::clone(process.args.as_ref()?))))
    };
    let Some((entry, args)) = start else {
        return;
    };
    debug!(%pid, %tid, "Main thread started");

    match run_entry(|| entry(&ctx, &args)) {
        Outcome::Returned(value) => ctx.complete_main(value),
        Outcome::Terminated => {}
        Outcome::Panicked(message) => {
            warn!(%pid, %tid, %message, "Process main thread panicked");
            ctx.record_fault(format!("{pid}: {message}"));
            ctx.complete_main(PANIC_EXIT_VALUE);
        }
    }
}

/// Body of an extra thread of a process
pub(crate) fn run_thread(kernel: Kernel, pid: Pid, tid: Tid, task_id: TaskId) {
    let _span = task_span(pid, tid).entered();
    let ctx = Context::new(kernel, pid, tid);
    let start = {
        let mut guard = ctx.lock();
        guard.set_thread_state(tid, ThreadState::Running);
        guard
            .tasks
            .get_mut(task_id)
            .and_then(|task| Some((task.entry.take()?, Arc::clone(&task.args))))
    };
    let Some((entry, args)) = start else {
        return;
    };
    debug!(%pid, %tid, "Thread started");

    match run_entry(|| entry(&ctx, &args)) {
        Outcome::Returned(value) => ctx.finish_thread(value),
        Outcome::Terminated => {}
        Outcome::Panicked(message) => {
            warn!(%pid, %tid, %message, "Thread panicked");
            ctx.record_fault(format!("{tid} of {pid}: {message}"));
            ctx.finish_thread(PANIC_EXIT_VALUE);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_entry_distinguishes_termination_from_panic() {
        assert!(matches!(run_entry(|| 7), Outcome::Returned(7)));
        assert!(matches!(run_entry(|| terminate()), Outcome::Terminated));
        let outcome = run_entry(|| panic!("boom"));
        assert!(matches!(outcome, Outcome::Panicked(ref m) if m == "boom"));
    }
}
