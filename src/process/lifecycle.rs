/*!
 * Process Lifecycle
 *
 * Creation, exit, reparenting and zombie collection. A process stays a
 * zombie after exit until exactly one wait consumes it.
 */

use super::executor::{run_main, terminate};
use super::types::{ExecOptions, Process, ProcessState, Task, Thread, ThreadState, WaitStatus};
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::{ExitValue, Pid, SlotId, StreamId};
use crate::kernel::state::{suspend, KernelGuard};
use crate::kernel::Kernel;
use crate::syscalls::Context;
use std::sync::Arc;
use tracing::{debug, info};

/// Create a process running `entry` on a fresh main thread
///
/// The main thread is spawned last; its trampoline waits for the kernel lock,
/// so it only ever sees the finished record.
pub(crate) fn spawn_process(
    kernel: &Kernel,
    guard: &mut KernelGuard<'_>,
    creator: Option<Pid>,
    entry: Task,
    args: &[u8],
    options: ExecOptions,
) -> KernelResult<Pid> {
    let max_fids = guard.max_fids;
    if let Some(creator) = creator {
        if !guard.process(creator)?.is_alive() {
            return Err(KernelError::NoSuchProcess(creator));
        }
    }
    let fids = match creator {
        Some(creator) if options.inherit_streams => guard.process(creator)?.fids.clone(),
        _ => vec![None; max_fids],
    };
    if guard.threads.available() == 0 {
        return Err(KernelError::TableExhausted(Resource::Threads));
    }

    let pid = guard
        .processes
        .insert(Process::new(None, Some(entry), args, max_fids))
        .ok_or(KernelError::TableExhausted(Resource::Processes))?;
    let Some(tid) = guard.threads.insert(Thread {
        owner: pid,
        state: ThreadState::Init,
        main: true,
        task: None,
    }) else {
        guard.processes.remove(pid);
        return Err(KernelError::TableExhausted(Resource::Threads));
    };

    let parent = creator.filter(|_| !pid.is_privileged());
    for sid in fids.iter().flatten() {
        guard.incref(*sid);
    }
    if let Some(process) = guard.processes.get_mut(pid) {
        process.parent = parent;
        process.fids = fids;
        process.main_thread = Some(tid);
    }
    if let Some(parent) = parent {
        if let Some(record) = guard.processes.get_mut(parent) {
            record.children.push(pid);
        }
    }

    let body_kernel = kernel.clone();
    let spawned = kernel.spawner().spawn(
        format!("pid-{}", pid.index()),
        Box::new(move || run_main(body_kernel, pid, tid)),
    );
    if let Err(e) = spawned {
        if let Some(parent) = parent {
            if let Some(record) = guard.processes.get_mut(parent) {
                record.children.retain(|&c| c != pid);
            }
        }
        let inherited: Vec<StreamId> = guard
            .processes
            .get_mut(pid)
            .map(|process| process.fids.iter_mut().filter_map(Option::take).collect())
            .unwrap_or_default();
        for sid in inherited {
            guard.decref(sid);
        }
        guard.threads.remove(tid);
        guard.processes.remove(pid);
        return Err(e);
    }

    debug!(%pid, %tid, parent = ?parent, "Created process");
    Ok(pid)
}

impl Context {
    /// Create a child process that shares every open stream of the caller
    pub fn exec<F>(&self, entry: F, args: &[u8]) -> KernelResult<Pid>
    where
        F: FnOnce(&Context, &[u8]) -> ExitValue + Send + 'static,
    {
        self.exec_with(entry, args, ExecOptions::default())
    }

    pub fn exec_with<F>(&self, entry: F, args: &[u8], options: ExecOptions) -> KernelResult<Pid>
    where
        F: FnOnce(&Context, &[u8]) -> ExitValue + Send + 'static,
    {
        let mut guard = self.lock();
        spawn_process(
            self.kernel(),
            &mut guard,
            Some(self.pid()),
            Box::new(entry),
            args,
            options,
        )
    }

    /// Exit the calling process; other threads of it are left to finish
    pub fn exit(&self, value: ExitValue) -> ! {
        let mut guard = self.lock();
        self.exit_process(&mut guard, value);
        if let Some(task) = guard.threads.get(self.thread_self()).and_then(|t| t.task) {
            guard.finish_task(task, value);
        }
        drop(guard);
        terminate()
    }

    /// Wait for a child to become a zombie and collect it
    ///
    /// `Some(pid)` waits for that direct child, `None` for any child.
    pub fn wait_child(&self, target: Option<Pid>) -> KernelResult<WaitStatus> {
        let mut guard = self.lock();
        self.wait_locked(&mut guard, target)
    }

    #[inline]
    pub fn get_pid(&self) -> Pid {
        self.pid()
    }

    /// Parent of the caller; `None` for the idle and init processes
    pub fn get_ppid(&self) -> Option<Pid> {
        self.lock()
            .processes
            .get(self.pid())
            .and_then(|process| process.parent)
    }

    pub(crate) fn wait_locked(
        &self,
        guard: &mut KernelGuard<'_>,
        target: Option<Pid>,
    ) -> KernelResult<WaitStatus> {
        let pid = self.pid();
        let child = match target {
            Some(child) => loop {
                let child_exit = Arc::clone(&guard.process(pid)?.child_exit);
                let record = guard
                    .processes
                    .get(child)
                    .filter(|record| record.parent == Some(pid))
                    .ok_or(KernelError::NoSuchProcess(child))?;
                if record.state == ProcessState::Zombie {
                    break child;
                }
                suspend(guard, &child_exit, self.thread_self());
            },
            None => loop {
                let process = guard.process_mut(pid)?;
                if process.children.is_empty() {
                    return Err(KernelError::NoChildren);
                }
                if let Some(child) = process.exited.pop_front() {
                    break child;
                }
                let child_exit = Arc::clone(&process.child_exit);
                suspend(guard, &child_exit, self.thread_self());
            },
        };

        let process = guard.process_mut(pid)?;
        process.children.retain(|&c| c != child);
        process.exited.retain(|&c| c != child);
        let record = guard
            .release_process(child)
            .ok_or(KernelError::NoSuchProcess(child))?;

        debug!(%pid, %child, status = record.exit_value, "Collected child");
        Ok(WaitStatus {
            pid: child,
            status: record.exit_value,
        })
    }

    /// Turn the calling process into a zombie
    ///
    /// Only the first exit of a process does anything; later calls from
    /// other threads fall through.
    pub(crate) fn exit_process(&self, guard: &mut KernelGuard<'_>, value: ExitValue) {
        let pid = self.pid();
        if guard.init == Some(pid) {
            while self.wait_locked(guard, None).is_ok() {}
        }

        let Ok(process) = guard.process_mut(pid) else {
            return;
        };
        if !process.is_alive() {
            return;
        }
        process.state = ProcessState::Zombie;
        process.exit_value = value;
        process.args = None;
        let open: Vec<StreamId> = process.fids.iter_mut().filter_map(Option::take).collect();
        let children = std::mem::take(&mut process.children);
        let exited = std::mem::take(&mut process.exited);
        let parent = process.parent;

        for sid in open {
            guard.decref(sid);
        }

        // Orphans, live and zombie, go to init
        if let Some(init) = guard.init.filter(|&init| init != pid) {
            for &child in &children {
                if let Some(record) = guard.processes.get_mut(child) {
                    record.parent = Some(init);
                }
            }
            if let Some(adopter) = guard.processes.get_mut(init) {
                adopter.children.extend(children);
                adopter.exited.extend(exited);
                adopter.child_exit.notify_all();
            }
        }

        match parent {
            Some(parent) => {
                if let Some(record) = guard.processes.get_mut(parent) {
                    record.exited.push_front(pid);
                    record.child_exit.notify_all();
                }
            }
            None => {
                self.kernel().halted().notify_all();
            }
        }
        // Only the calling thread stops here
        guard.set_thread_state(self.thread_self(), ThreadState::Exited);

        info!(%pid, value, "Process exited");
    }

    /// Main thread completion: reap every extra thread, then exit
    pub(crate) fn complete_main(&self, value: ExitValue) {
        let mut guard = self.lock();
        self.reap_threads(&mut guard);
        self.exit_process(&mut guard, value);
    }
}

#[cfg(test)]
mod tests {
    use crate::core::config::KernelConfig;
    use crate::kernel::Kernel;
    use crate::process::types::ThreadState;
    use std::sync::mpsc;

    #[test]
    fn test_exit_from_extra_thread_leaves_main_thread_running() {
        let (report, states) = mpsc::channel();
        let kernel = Kernel::new(
            KernelConfig::default()
                .with_max_processes(8)
                .with_max_threads(16),
        );
        let status = kernel.boot(
            move |ctx, _| {
                let child = ctx.exec(
                    move |ctx, _| {
                        let Ok(exiter) = ctx.create_thread(
                            |ctx, _| {
                                ctx.exit(3);
                            },
                            b"",
                        ) else {
                            return 1;
                        };
                        let joined = ctx.thread_join(exiter);
                        let guard = ctx.lock();
                        let state = |tid| guard.threads.get(tid).map(|t| t.state);
                        let _ = report.send((joined, state(exiter), state(ctx.thread_self())));
                        0
                    },
                    b"",
                );
                let Ok(child) = child else {
                    return 1;
                };
                let observed = states.recv();
                let waited = ctx.wait_child(Some(child));
                match (observed, waited) {
                    (Ok((Ok(3), None, Some(ThreadState::Running))), Ok(w)) if w.status == 3 => 0,
                    _ => 1,
                }
            },
            b"",
        );
        assert_eq!(status, Ok(0));
    }
}
