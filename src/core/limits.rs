/*!
 * System Limits and Constants
 *
 * Centralized location for table sizes and fixed capacities.
 * Values here are the defaults for [`KernelConfig`](super::config::KernelConfig);
 * only the pipe capacity is fixed for every pipe.
 */

// =============================================================================
// PROCESS LIMITS
// =============================================================================

/// Process table size
pub const MAX_PROC: usize = 1024;

/// Thread execution records, shared by all processes (main threads included)
pub const MAX_THREADS: usize = 4096;

/// Thread stack size for spawned execution contexts (256KB)
pub const THREAD_STACK_SIZE: usize = 256 * 1024;

// =============================================================================
// STREAM LIMITS
// =============================================================================

/// Per-process file id table size
pub const MAX_FILEID: usize = 16;

/// Global stream record table size
pub const MAX_FILES: usize = MAX_PROC * 4;

// =============================================================================
// IPC LIMITS
// =============================================================================

/// Capacity of every pipe ring buffer (8KB)
pub const PIPE_CAPACITY: usize = 8192;

/// Highest legal port number
pub const MAX_PORT: u16 = 1023;

/// Port of a socket that can only connect, never listen
pub const NOPORT: u16 = 0;
