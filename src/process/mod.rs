/*!
 * Process Module
 * Process and thread lifecycle: creation, exit, join, wait and reaping
 */

pub mod executor;
mod lifecycle;
mod threads;
pub mod types;

// Re-export for convenience
pub use executor::{Body, Spawner, ThreadSpawner, PANIC_EXIT_VALUE};
pub use types::{ExecOptions, ProcessState, Task, ThreadState, WaitStatus};

pub(crate) use lifecycle::spawn_process;
