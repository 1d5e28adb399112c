/*!
 * Pipe Operations
 * Creation, blocking read/write and half-close
 */

use super::pipe::Pipe;
use super::types::PipeFds;
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::{PipeId, Size, StreamId, Tid};
use crate::kernel::state::{suspend, KernelGuard, KernelState};
use crate::streams::StreamObject;
use crate::syscalls::Context;
use tracing::debug;

impl Context {
    /// Create a pipe bound to two new fids of the calling process
    pub fn pipe(&self) -> KernelResult<PipeFds> {
        let mut guard = self.lock();
        let pid = self.pid();

        guard.check_reserve(pid, 2)?;
        if guard.pipes.available() == 0 {
            return Err(KernelError::TableExhausted(Resource::Pipes));
        }

        let id = guard
            .pipes
            .insert(Pipe::new())
            .ok_or(KernelError::TableExhausted(Resource::Pipes))?;
        let (read, reader) = guard.install(pid, StreamObject::PipeReader(id))?;
        let (write, writer) = guard.install(pid, StreamObject::PipeWriter(id))?;
        if let Some(pipe) = guard.pipes.get_mut(id) {
            pipe.reader = Some(reader);
            pipe.writer = Some(writer);
        }

        debug!(%pid, pipe = %id, read, write, "Created pipe");
        Ok(PipeFds { read, write })
    }
}

impl KernelState {
    /// Pipe whose ends are stream records not bound to any fid
    ///
    /// Callers check pipe and stream capacity first.
    pub fn create_unbound_pipe(&mut self) -> KernelResult<(StreamId, StreamId)> {
        if self.streams.available() < 2 {
            return Err(KernelError::TableExhausted(Resource::Streams));
        }
        let id = self
            .pipes
            .insert(Pipe::new())
            .ok_or(KernelError::TableExhausted(Resource::Pipes))?;
        let reader = self
            .create_stream(StreamObject::PipeReader(id))
            .ok_or(KernelError::TableExhausted(Resource::Streams))?;
        let writer = self
            .create_stream(StreamObject::PipeWriter(id))
            .ok_or(KernelError::TableExhausted(Resource::Streams))?;
        if let Some(pipe) = self.pipes.get_mut(id) {
            pipe.reader = Some(reader);
            pipe.writer = Some(writer);
        }
        Ok((reader, writer))
    }

    /// Reader gone: writers blocked on space wake up and fail
    pub fn close_pipe_reader(&mut self, id: PipeId) {
        let Some(pipe) = self.pipes.get_mut(id) else {
            return;
        };
        pipe.reader = None;
        pipe.has_space.notify_all();
        // Readers still parked on this end re-check and fail
        pipe.has_data.notify_all();
        self.free_pipe_if_orphaned(id);
    }

    /// Writer gone: readers blocked on data wake up and see end-of-stream
    pub fn close_pipe_writer(&mut self, id: PipeId) {
        let Some(pipe) = self.pipes.get_mut(id) else {
            return;
        };
        pipe.writer = None;
        pipe.has_data.notify_all();
        self.free_pipe_if_orphaned(id);
    }

    fn free_pipe_if_orphaned(&mut self, id: PipeId) {
        if self.pipes.get(id).is_some_and(Pipe::is_orphaned) {
            self.pipes.remove(id);
            debug!(pipe = %id, "Freed pipe");
        }
    }
}

/// Read from the pipe, blocking while it is empty and a writer remains
///
/// Returns once `buf` is full, or once the buffer drains and no writer is in
/// the middle of a transfer. `Ok(0)` is end-of-stream.
pub(crate) fn read(
    guard: &mut KernelGuard<'_>,
    tid: Tid,
    id: PipeId,
    buf: &mut [u8],
) -> KernelResult<Size> {
    let mut total = 0;
    loop {
        let pipe = guard.pipes.get_mut(id).ok_or(KernelError::Closed)?;
        if pipe.reader.is_none() {
            return if total > 0 {
                Ok(total)
            } else {
                Err(KernelError::Closed)
            };
        }

        let was_full = pipe.is_full();
        let n = pipe.pop(&mut buf[total..]);
        total += n;
        if n > 0 && was_full {
            pipe.has_space.notify_all();
        }

        if total == buf.len() {
            return Ok(total);
        }
        // Buffer is empty here
        if pipe.writer.is_none() {
            return Ok(total);
        }
        if total > 0 && pipe.stalled_writers == 0 {
            return Ok(total);
        }

        let has_data = pipe.has_data.clone();
        suspend(guard, &has_data, tid);
    }
}

/// Write all of `data`, blocking on a full buffer until a reader drains it
pub(crate) fn write(
    guard: &mut KernelGuard<'_>,
    tid: Tid,
    id: PipeId,
    data: &[u8],
) -> KernelResult<Size> {
    let mut written = 0;
    let mut stalled = false;
    loop {
        let pipe = guard.pipes.get_mut(id).ok_or(KernelError::BrokenPipe)?;
        if pipe.reader.is_none() || pipe.writer.is_none() {
            if stalled {
                pipe.stalled_writers -= 1;
            }
            return Err(KernelError::BrokenPipe);
        }

        let n = pipe.push(&data[written..]);
        written += n;
        if n > 0 {
            pipe.has_data.notify_all();
        }

        if written == data.len() {
            if stalled {
                pipe.stalled_writers -= 1;
            }
            return Ok(written);
        }

        if !stalled {
            stalled = true;
            pipe.stalled_writers += 1;
        }
        let has_space = pipe.has_space.clone();
        suspend(guard, &has_space, tid);
    }
}
