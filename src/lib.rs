/*!
 * Tiny Kernel Library
 *
 * Process/thread lifecycle and IPC core of a small monolithic kernel, hosted
 * as a library: fixed-size object tables under one kernel lock, blocking
 * join/wait, bounded pipes and port-addressed sockets.
 */

pub mod core;
pub mod ipc;
pub mod kernel;
pub mod monitoring;
pub mod process;
pub mod streams;
pub mod syscalls;

// Re-exports
pub use crate::core::{
    ExitValue, Fid, KernelConfig, KernelError, KernelResult, Pid, Port, Resource, SlotId, Tid,
};
pub use ipc::{PipeFds, ShutdownMode, SocketState, PIPE_CAPACITY};
pub use kernel::{Kernel, KernelStats};
pub use monitoring::init_tracing;
pub use process::{ExecOptions, Spawner, ThreadSpawner, WaitStatus};
pub use streams::StreamObject;
pub use syscalls::Context;
