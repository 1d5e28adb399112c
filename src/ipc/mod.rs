/*!
 * IPC Module
 * Inter-process communication: bounded pipes and port-addressed sockets
 */

pub mod pipe;
pub mod socket;

// Re-export for convenience
pub use pipe::{PipeFds, PIPE_CAPACITY};
pub use socket::{ShutdownMode, SocketState};
