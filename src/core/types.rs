/*!
 * Core Types
 * Identifiers shared across the kernel object tables
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Small per-process stream table index (a "file id")
pub type Fid = usize;

/// Socket port number
pub type Port = u16;

/// Byte count for stream operations
pub type Size = usize;

/// Exit value produced by a process or thread
pub type ExitValue = i32;

/// Identifier of a slot in an [`ObjectTable`](super::table::ObjectTable)
///
/// Every id carries the generation of the slot it was issued from, so an id
/// that outlived its object never resolves to the slot's next occupant.
pub trait SlotId: Copy + Eq + fmt::Debug {
    fn from_parts(index: u32, generation: u32) -> Self;
    fn index(&self) -> u32;
    fn generation(&self) -> u32;
}

macro_rules! slot_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl SlotId for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline(always)]
            fn index(&self) -> u32 {
                self.index
            }

            #[inline(always)]
            fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.index)?;
                if self.generation > 0 {
                    write!(f, "#{}", self.generation)?;
                }
                Ok(())
            }
        }
    };
}

slot_id!(
    /// Process identifier
    Pid,
    "pid:"
);

slot_id!(
    /// Thread identifier (the execution record of a thread)
    Tid,
    "tid:"
);

slot_id!(
    /// Thread-task bookkeeping record identifier
    TaskId,
    "task:"
);

slot_id!(
    /// Refcounted stream record identifier
    StreamId,
    "stream:"
);

slot_id!(PipeId, "pipe:");

slot_id!(SocketId, "sock:");

slot_id!(
    /// Pending connect/accept handshake identifier
    RequestId,
    "req:"
);

impl Pid {
    /// Slot of the idle (scheduler) process
    pub const IDLE_INDEX: u32 = 0;
    /// Slot of the init process, adopter of every orphan
    pub const INIT_INDEX: u32 = 1;

    /// The first two process slots have no parent
    #[inline]
    #[must_use]
    pub fn is_privileged(&self) -> bool {
        self.index <= Self::INIT_INDEX
    }

    #[inline]
    #[must_use]
    pub fn is_init(&self) -> bool {
        self.index == Self::INIT_INDEX
    }
}
