/*!
 * Process Types
 * Process, thread and thread-task records kept in the kernel tables
 */

use crate::core::types::{ExitValue, Pid, StreamId, TaskId, Tid};
use crate::syscalls::Context;
use parking_lot::Condvar;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Entry function of a process main thread or of an extra thread
///
/// Receives the syscall context of the thread it runs on and the owned copy
/// of the argument buffer given at creation time.
pub type Task = Box<dyn FnOnce(&Context, &[u8]) -> ExitValue + Send + 'static>;

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Slot is in the free pool
    Free,
    /// Process is running or runnable
    Alive,
    /// Process exited, waiting for its parent to collect the exit value
    Zombie,
}

/// Thread execution state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadState {
    /// Spawned but not yet running
    Init,
    Running,
    /// Blocked on a kernel condition
    Stopped,
    /// Terminal
    Exited,
}

/// Options for process creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOptions {
    /// Share every open stream of the creator with the new process
    pub inherit_streams: bool,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            inherit_streams: true,
        }
    }
}

impl ExecOptions {
    #[inline]
    #[must_use]
    pub fn without_streams() -> Self {
        Self {
            inherit_streams: false,
        }
    }
}

/// Outcome of a successful wait for a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitStatus {
    pub pid: Pid,
    pub status: ExitValue,
}

/// Process control record
pub(crate) struct Process {
    pub state: ProcessState,
    pub parent: Option<Pid>,
    pub entry: Option<Task>,
    pub args: Option<Arc<[u8]>>,
    pub exit_value: ExitValue,
    pub fids: Vec<Option<StreamId>>,
    /// Live and zombie children
    pub children: Vec<Pid>,
    /// Zombie children not yet collected, most recent first
    pub exited: VecDeque<Pid>,
    pub child_exit: Arc<Condvar>,
    pub main_thread: Option<Tid>,
    /// Thread-task records of the extra threads
    pub tasks: Vec<TaskId>,
    pub thread_count: usize,
    pub active_threads: usize,
}

impl Process {
    pub fn new(parent: Option<Pid>, entry: Option<Task>, args: &[u8], max_fids: usize) -> Self {
        Self {
            state: ProcessState::Alive,
            parent,
            entry,
            args: Some(Arc::from(args)),
            exit_value: 0,
            fids: vec![None; max_fids],
            children: Vec::new(),
            exited: VecDeque::new(),
            child_exit: Arc::new(Condvar::new()),
            main_thread: None,
            tasks: Vec::new(),
            thread_count: 0,
            active_threads: 0,
        }
    }

    #[inline(always)]
    pub fn is_alive(&self) -> bool {
        matches!(self.state, ProcessState::Alive)
    }
}

/// Thread execution record
pub(crate) struct Thread {
    pub owner: Pid,
    pub state: ThreadState,
    pub main: bool,
    /// Bookkeeping record; main threads have none
    pub task: Option<TaskId>,
}

/// Thread-task bookkeeping record
pub(crate) struct ThreadTask {
    pub owner: Pid,
    pub thread: Tid,
    pub entry: Option<Task>,
    pub args: Arc<[u8]>,
    pub exit_value: ExitValue,
    pub join: Arc<Condvar>,
    pub detached: bool,
    pub exited: bool,
    /// Joiners currently blocked; the record outlives them
    pub joiners: usize,
}

impl ThreadTask {
    /// Record may go once no joiner can still read the exit value
    #[inline]
    pub fn is_reapable(&self) -> bool {
        self.exited && self.joiners == 0
    }
}
