/*!
 * Kernel State
 *
 * Every object table and the port table, guarded as a whole by the single
 * kernel lock. Nothing here is ever touched without holding that lock.
 */

use crate::core::config::KernelConfig;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::table::ObjectTable;
use crate::core::types::{Pid, PipeId, RequestId, SocketId, StreamId, TaskId, Tid};
use crate::ipc::pipe::Pipe;
use crate::ipc::socket::{ConnectionRequest, Socket};
use crate::process::types::{Process, Thread, ThreadState, ThreadTask};
use crate::streams::Stream;
use parking_lot::{Condvar, MutexGuard};

/// The kernel lock held across a syscall
pub(crate) type KernelGuard<'a> = MutexGuard<'a, KernelState>;

pub(crate) struct KernelState {
    pub processes: ObjectTable<Pid, Process>,
    pub threads: ObjectTable<Tid, Thread>,
    pub tasks: ObjectTable<TaskId, ThreadTask>,
    pub streams: ObjectTable<StreamId, Stream>,
    pub pipes: ObjectTable<PipeId, Pipe>,
    pub sockets: ObjectTable<SocketId, Socket>,
    pub requests: ObjectTable<RequestId, ConnectionRequest>,
    /// Listening socket per port
    pub ports: Vec<Option<SocketId>>,
    pub init: Option<Pid>,
    pub booted: bool,
    /// Panics caught in task trampolines
    pub faults: Vec<String>,
    pub max_fids: usize,
}

impl KernelState {
    pub fn new(config: &KernelConfig) -> Self {
        Self {
            processes: ObjectTable::with_capacity(config.max_processes),
            threads: ObjectTable::with_capacity(config.max_threads),
            tasks: ObjectTable::with_capacity(config.max_threads),
            streams: ObjectTable::with_capacity(config.max_streams),
            pipes: ObjectTable::with_capacity(config.max_pipes()),
            sockets: ObjectTable::with_capacity(config.max_sockets()),
            requests: ObjectTable::with_capacity(config.max_sockets()),
            ports: vec![None; usize::from(config.max_port) + 1],
            init: None,
            booted: false,
            faults: Vec::new(),
            max_fids: config.max_fids,
        }
    }

    #[inline]
    pub fn process(&self, pid: Pid) -> KernelResult<&Process> {
        self.processes
            .get(pid)
            .ok_or(KernelError::NoSuchProcess(pid))
    }

    #[inline]
    pub fn process_mut(&mut self, pid: Pid) -> KernelResult<&mut Process> {
        self.processes
            .get_mut(pid)
            .ok_or(KernelError::NoSuchProcess(pid))
    }

    /// Record a thread state change; stale or exited threads are left alone
    pub fn set_thread_state(&mut self, tid: Tid, state: ThreadState) {
        if let Some(thread) = self.threads.get_mut(tid) {
            if thread.state != ThreadState::Exited {
                thread.state = state;
            }
        }
    }

    /// Release a thread-task record together with its execution record
    pub fn release_task(&mut self, task_id: TaskId) {
        if let Some(task) = self.tasks.remove(task_id) {
            // Joiners and a reaping main thread re-check and find it gone
            task.join.notify_all();
            self.threads.remove(task.thread);
            if let Some(process) = self.processes.get_mut(task.owner) {
                process.tasks.retain(|&t| t != task_id);
                process.thread_count = process.thread_count.saturating_sub(1);
            }
        }
    }

    /// Return a process slot to the free pool with every record still attached
    pub fn release_process(&mut self, pid: Pid) -> Option<Process> {
        let tasks = self.processes.get(pid)?.tasks.clone();
        for task_id in tasks {
            self.release_task(task_id);
        }
        let mut process = self.processes.remove(pid)?;
        if let Some(main) = process.main_thread {
            self.threads.remove(main);
        }
        for sid in process.fids.iter_mut().filter_map(Option::take) {
            self.decref(sid);
        }
        Some(process)
    }
}

/// Block the calling thread on `condition`, releasing the kernel lock
///
/// The lock is held again on return; callers must re-validate whatever they
/// looked at before sleeping.
pub(crate) fn suspend(guard: &mut KernelGuard<'_>, condition: &Condvar, tid: Tid) {
    guard.set_thread_state(tid, ThreadState::Stopped);
    condition.wait(guard);
    guard.set_thread_state(tid, ThreadState::Running);
}
