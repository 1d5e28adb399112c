/*!
 * Streams Module
 * Refcounted stream records addressed through per-process file ids
 */

mod ops;
mod table;
pub mod types;

pub(crate) use types::Stream;
pub use types::StreamObject;
