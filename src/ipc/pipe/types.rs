/*!
 * Pipe Types
 * Common types and constants for pipes
 */

use crate::core::types::Fid;
use serde::{Deserialize, Serialize};

// Pipe capacity - centralized in core::limits
pub use crate::core::limits::PIPE_CAPACITY;

/// The two file ids returned by pipe creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeFds {
    pub read: Fid,
    pub write: Fid,
}
