/*!
 * Stream Operations
 * read/write/close by file id, dispatched on the stream kind
 */

use super::types::StreamObject;
use crate::core::errors::{KernelError, KernelResult};
use crate::core::types::Fid;
use crate::ipc::{pipe, socket};
use crate::syscalls::Context;

impl Context {
    /// Read up to `buf.len()` bytes; `Ok(0)` means end of stream
    pub fn read(&self, fid: Fid, buf: &mut [u8]) -> KernelResult<usize> {
        let mut guard = self.lock();
        match guard.fid_object(self.pid(), fid)? {
            StreamObject::PipeReader(id) => pipe::read(&mut guard, self.thread_self(), id, buf),
            StreamObject::PipeWriter(_) => Err(KernelError::InvalidOperation(
                "read from the write end of a pipe",
            )),
            StreamObject::Socket(id) => socket::read(&mut guard, self.thread_self(), id, buf),
        }
    }

    /// Write all of `data`, blocking while the channel is full
    pub fn write(&self, fid: Fid, data: &[u8]) -> KernelResult<usize> {
        let mut guard = self.lock();
        match guard.fid_object(self.pid(), fid)? {
            StreamObject::PipeWriter(id) => pipe::write(&mut guard, self.thread_self(), id, data),
            StreamObject::PipeReader(_) => Err(KernelError::InvalidOperation(
                "write to the read end of a pipe",
            )),
            StreamObject::Socket(id) => socket::write(&mut guard, self.thread_self(), id, data),
        }
    }

    /// Release `fid`; the stream closes when its last reference goes
    pub fn close(&self, fid: Fid) -> KernelResult<()> {
        self.lock().close_fid(self.pid(), fid)
    }
}
