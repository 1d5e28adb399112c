/*!
 * Syscalls Module
 *
 * Every syscall is a method on [`Context`]; the implementations live with the
 * subsystem they operate on (process, streams, ipc).
 */

mod context;

// Re-export public API
pub use context::Context;
