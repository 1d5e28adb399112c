/*!
 * Threads
 *
 * Extra threads of a process: creation, join, detach and exit. Each extra
 * thread has an execution record (`Tid`) bound 1:1 to a thread-task record
 * that carries the exit value until the last joiner has read it.
 */

use super::executor::{run_thread, terminate};
use super::types::{Thread, ThreadState, ThreadTask};
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::{ExitValue, Pid, SlotId, TaskId, Tid};
use crate::kernel::state::{suspend, KernelGuard, KernelState};
use crate::syscalls::Context;
use parking_lot::Condvar;
use std::sync::Arc;
use tracing::debug;

impl Context {
    /// Start a new thread of the calling process running `entry`
    pub fn create_thread<F>(&self, entry: F, args: &[u8]) -> KernelResult<Tid>
    where
        F: FnOnce(&Context, &[u8]) -> ExitValue + Send + 'static,
    {
        let mut guard = self.lock();
        let pid = self.pid();
        if !guard.process(pid)?.is_alive() {
            return Err(KernelError::NoSuchProcess(pid));
        }
        if guard.threads.available() == 0 || guard.tasks.available() == 0 {
            return Err(KernelError::TableExhausted(Resource::Threads));
        }

        let tid = guard
            .threads
            .insert(Thread {
                owner: pid,
                state: ThreadState::Init,
                main: false,
                task: None,
            })
            .ok_or(KernelError::TableExhausted(Resource::Threads))?;
        let Some(task_id) = guard.tasks.insert(ThreadTask {
            owner: pid,
            thread: tid,
            entry: Some(Box::new(entry)),
            args: Arc::from(args),
            exit_value: 0,
            join: Arc::new(Condvar::new()),
            detached: false,
            exited: false,
            joiners: 0,
        }) else {
            guard.threads.remove(tid);
            return Err(KernelError::TableExhausted(Resource::Threads));
        };
        if let Some(thread) = guard.threads.get_mut(tid) {
            thread.task = Some(task_id);
        }
        let process = guard.process_mut(pid)?;
        process.tasks.push(task_id);
        process.thread_count += 1;
        process.active_threads += 1;

        let kernel = self.kernel().clone();
        let spawned = self.kernel().spawner().spawn(
            format!("pid-{}-tid-{}", pid.index(), tid.index()),
            Box::new(move || run_thread(kernel, pid, tid, task_id)),
        );
        if let Err(e) = spawned {
            if let Ok(process) = guard.process_mut(pid) {
                process.active_threads -= 1;
            }
            guard.release_task(task_id);
            return Err(e);
        }

        debug!(%pid, %tid, task = %task_id, "Created thread");
        Ok(tid)
    }

    /// Wait for `target` to exit and return its exit value
    ///
    /// Only extra threads of the calling process can be joined. Detaching the
    /// target while the join waits makes the join fail.
    pub fn thread_join(&self, target: Tid) -> KernelResult<ExitValue> {
        if target == self.thread_self() {
            return Err(KernelError::SelfJoin);
        }
        let mut guard = self.lock();
        let task_id = guard.tracked_task(self.pid(), target)?;
        let task = guard
            .tasks
            .get_mut(task_id)
            .ok_or(KernelError::NotTracked(target))?;
        if task.detached {
            return Err(KernelError::Detached(target));
        }
        task.joiners += 1;
        let join = Arc::clone(&task.join);

        let outcome = loop {
            let status = guard
                .tasks
                .get(task_id)
                .map(|task| (task.detached, task.exited, task.exit_value));
            match status {
                None => break Err(KernelError::NotTracked(target)),
                Some((true, _, _)) => break Err(KernelError::Detached(target)),
                Some((false, true, value)) => break Ok(value),
                Some((false, false, _)) => suspend(&mut guard, &join, self.thread_self()),
            }
        };

        if let Some(task) = guard.tasks.get_mut(task_id) {
            task.joiners -= 1;
            if task.is_reapable() {
                guard.release_task(task_id);
            }
        }
        debug!(%target, ?outcome, "Join finished");
        outcome
    }

    /// Let `target` release its records on exit instead of waiting for a join
    pub fn thread_detach(&self, target: Tid) -> KernelResult<()> {
        let mut guard = self.lock();
        let task_id = guard.tracked_task(self.pid(), target)?;
        let task = guard
            .tasks
            .get_mut(task_id)
            .ok_or(KernelError::NotTracked(target))?;
        if task.exited {
            return Err(KernelError::AlreadyExited(target));
        }
        task.detached = true;
        task.join.notify_all();
        debug!(%target, "Detached thread");
        Ok(())
    }

    /// Terminate the calling thread with `value`
    ///
    /// On the main thread this completes the process: every other thread is
    /// waited for and the process exits with `value`.
    pub fn thread_exit(&self, value: ExitValue) -> ! {
        let main = self
            .lock()
            .threads
            .get(self.thread_self())
            .is_some_and(|thread| thread.main);
        if main {
            self.complete_main(value);
        } else {
            self.finish_thread(value);
        }
        terminate()
    }

    /// Interrupts are not delivered by this kernel
    pub fn thread_interrupt(&self, _target: Tid) -> KernelResult<()> {
        Err(KernelError::NotSupported("thread interrupts"))
    }

    #[inline]
    pub fn thread_is_interrupted(&self) -> bool {
        false
    }

    #[inline]
    pub fn thread_clear_interrupt(&self) {}

    pub(crate) fn finish_thread(&self, value: ExitValue) {
        let mut guard = self.lock();
        if let Some(task) = guard.threads.get(self.thread_self()).and_then(|t| t.task) {
            guard.finish_task(task, value);
        }
    }

    /// Block until every extra thread of the caller's process has exited, then
    /// drop their records
    pub(crate) fn reap_threads(&self, guard: &mut KernelGuard<'_>) {
        let pid = self.pid();
        loop {
            let running = guard.processes.get(pid).and_then(|process| {
                process
                    .tasks
                    .iter()
                    .filter_map(|&id| guard.tasks.get(id))
                    .find(|task| !task.exited)
                    .map(|task| Arc::clone(&task.join))
            });
            match running {
                Some(join) => suspend(guard, &join, self.thread_self()),
                None => break,
            }
        }

        let tasks = guard
            .processes
            .get(pid)
            .map(|process| process.tasks.clone())
            .unwrap_or_default();
        for task_id in tasks {
            guard.release_task(task_id);
        }
    }
}

impl KernelState {
    /// Task record of `target` if it is a joinable thread of `pid`
    fn tracked_task(&self, pid: Pid, target: Tid) -> KernelResult<TaskId> {
        let thread = self
            .threads
            .get(target)
            .ok_or(KernelError::InvalidThread(target))?;
        if thread.owner != pid {
            return Err(KernelError::NotTracked(target));
        }
        thread.task.ok_or(KernelError::NotTracked(target))
    }

    /// Record the exit of a thread-task and wake its joiners
    pub fn finish_task(&mut self, task_id: TaskId, value: ExitValue) {
        let Some(task) = self.tasks.get_mut(task_id) else {
            return;
        };
        if task.exited {
            return;
        }
        task.exited = true;
        task.exit_value = value;
        task.join.notify_all();
        let owner = task.owner;
        let thread = task.thread;
        let release = task.detached && task.joiners == 0;

        self.set_thread_state(thread, ThreadState::Exited);
        if let Some(process) = self.processes.get_mut(owner) {
            process.active_threads = process.active_threads.saturating_sub(1);
        }
        if release {
            self.release_task(task_id);
        }
        debug!(pid = %owner, tid = %thread, value, "Thread exited");
    }
}
