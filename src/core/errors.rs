/*!
 * Error Types
 * Centralized error handling with thiserror and miette diagnostics
 */

use super::types::{Fid, Pid, Port, Tid};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kernel operation result
///
/// # Must Use
/// Every failure leaves the tables unchanged; callers decide what to do next
pub type KernelResult<T> = Result<T, KernelError>;

/// Fixed-capacity kernel tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Processes,
    Threads,
    Streams,
    FileIds,
    Pipes,
    Sockets,
    Requests,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Processes => "process",
            Resource::Threads => "thread",
            Resource::Streams => "stream",
            Resource::FileIds => "file id",
            Resource::Pipes => "pipe",
            Resource::Sockets => "socket",
            Resource::Requests => "connection request",
        };
        f.write_str(name)
    }
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum KernelError {
    #[error("{0} table exhausted")]
    #[diagnostic(
        code(kernel::table_exhausted),
        help("Release unused objects or raise the table size in KernelConfig.")
    )]
    TableExhausted(Resource),

    #[error("No such process: {0}")]
    #[diagnostic(
        code(process::not_found),
        help("Only direct children of the caller can be waited for.")
    )]
    NoSuchProcess(Pid),

    #[error("Process has no children to wait for")]
    #[diagnostic(code(process::no_children))]
    NoChildren,

    #[error("Invalid thread: {0}")]
    #[diagnostic(code(thread::invalid))]
    InvalidThread(Tid),

    #[error("A thread cannot join itself")]
    #[diagnostic(code(thread::self_join))]
    SelfJoin,

    #[error("Thread {0} is detached")]
    #[diagnostic(code(thread::detached))]
    Detached(Tid),

    #[error("Thread {0} has already exited")]
    #[diagnostic(code(thread::exited))]
    AlreadyExited(Tid),

    #[error("Thread {0} is not a joinable thread of this process")]
    #[diagnostic(
        code(thread::not_tracked),
        help("Main threads, threads of other processes and already joined threads cannot be joined.")
    )]
    NotTracked(Tid),

    #[error("Bad file id: {0}")]
    #[diagnostic(code(stream::bad_fid))]
    BadFile(Fid),

    #[error("Invalid port: {0}")]
    #[diagnostic(code(socket::invalid_port))]
    InvalidPort(u32),

    #[error("Port {0} already has a listener")]
    #[diagnostic(code(socket::port_in_use))]
    PortInUse(Port),

    #[error("Invalid socket state: expected {expected}")]
    #[diagnostic(code(socket::invalid_state))]
    InvalidSocketState { expected: &'static str },

    #[error("Socket is not connected")]
    #[diagnostic(code(socket::not_connected))]
    NotConnected,

    #[error("Connection to port {0} refused")]
    #[diagnostic(code(socket::connection_refused))]
    ConnectionRefused(Port),

    #[error("Broken pipe: the other end is closed")]
    #[diagnostic(code(pipe::broken))]
    BrokenPipe,

    #[error("Stream closed")]
    #[diagnostic(code(stream::closed))]
    Closed,

    #[error("Invalid operation: {0}")]
    #[diagnostic(code(stream::invalid_operation))]
    InvalidOperation(&'static str),

    #[error("Not supported: {0}")]
    #[diagnostic(code(kernel::not_supported))]
    NotSupported(&'static str),

    #[error("Failed to spawn execution context: {0}")]
    #[diagnostic(
        code(kernel::spawn_failed),
        help("The host refused to create a thread. Check thread limits and stack size.")
    )]
    SpawnFailed(String),

    #[error("Kernel has already been booted")]
    #[diagnostic(code(kernel::already_booted))]
    AlreadyBooted,

    #[error("Task panicked: {0}")]
    #[diagnostic(code(kernel::task_panicked))]
    TaskPanicked(String),
}

impl KernelError {
    /// Resource exhaustion, as opposed to an illegal argument or state
    #[inline]
    #[must_use]
    pub const fn is_exhaustion(&self) -> bool {
        matches!(self, KernelError::TableExhausted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            KernelError::TableExhausted(Resource::FileIds).to_string(),
            "file id table exhausted"
        );
        assert_eq!(
            KernelError::ConnectionRefused(7).to_string(),
            "Connection to port 7 refused"
        );
    }

    #[test]
    fn test_exhaustion_classification() {
        assert!(KernelError::TableExhausted(Resource::Pipes).is_exhaustion());
        assert!(!KernelError::BrokenPipe.is_exhaustion());
    }
}
