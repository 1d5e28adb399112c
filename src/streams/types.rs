/*!
 * Stream Types
 */

use crate::core::types::{PipeId, SocketId};
use serde::{Deserialize, Serialize};

/// Concrete kind behind a stream record; operations dispatch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum StreamObject {
    PipeReader(PipeId),
    PipeWriter(PipeId),
    Socket(SocketId),
}

/// Refcounted stream record shared by every fid that refers to it
#[derive(Debug)]
pub(crate) struct Stream {
    pub refcount: u32,
    pub object: StreamObject,
}
