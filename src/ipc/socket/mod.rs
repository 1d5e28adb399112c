/*!
 * Socket Module
 * Port-addressed duplex channels built from a pair of pipes
 */

mod ops;
mod rendezvous;
pub mod types;

pub(crate) use ops::{read, write};
pub(crate) use types::{ConnectionRequest, Socket};
pub use types::{ShutdownMode, SocketState};
