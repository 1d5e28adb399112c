/*!
 * Pipe Module
 * Bounded byte channels with blocking read/write and half-close
 */

mod ops;
pub(crate) mod pipe;
pub mod types;

pub(crate) use ops::{read, write};
pub(crate) use pipe::Pipe;
pub use types::{PipeFds, PIPE_CAPACITY};
