/*!
 * Kernel Statistics
 * Live record counts per object table
 */

use serde::{Deserialize, Serialize};

/// Snapshot of table occupancy, taken under the kernel lock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelStats {
    pub processes: usize,
    pub threads: usize,
    pub tasks: usize,
    pub streams: usize,
    pub pipes: usize,
    pub sockets: usize,
    pub requests: usize,
    pub listening_ports: usize,
    /// Panics caught in task entries
    pub faults: usize,
}

impl KernelStats {
    /// Records of any kind still allocated
    #[inline]
    #[must_use]
    pub fn live_objects(&self) -> usize {
        self.processes
            + self.threads
            + self.tasks
            + self.streams
            + self.pipes
            + self.sockets
            + self.requests
    }
}
