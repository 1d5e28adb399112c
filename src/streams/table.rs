/*!
 * Stream Table
 *
 * Per-process fid tables on top of the global refcounted stream records:
 * reserve, incref/decref and close dispatch.
 */

use super::types::{Stream, StreamObject};
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::{Fid, Pid, StreamId};
use crate::kernel::state::KernelState;
use crate::process::types::Process;
use tracing::debug;

impl KernelState {
    /// Stream installed at `fid` of `pid`
    pub fn fid_stream(&self, pid: Pid, fid: Fid) -> KernelResult<StreamId> {
        self.process(pid)?
            .fids
            .get(fid)
            .copied()
            .flatten()
            .filter(|&sid| self.streams.contains(sid))
            .ok_or(KernelError::BadFile(fid))
    }

    /// Fid tables of zombies are closed for good
    fn live_process(&self, pid: Pid) -> KernelResult<&Process> {
        self.process(pid)
            .ok()
            .filter(|process| process.is_alive())
            .ok_or(KernelError::NoSuchProcess(pid))
    }

    pub fn fid_object(&self, pid: Pid, fid: Fid) -> KernelResult<StreamObject> {
        let sid = self.fid_stream(pid, fid)?;
        self.streams
            .get(sid)
            .map(|stream| stream.object)
            .ok_or(KernelError::BadFile(fid))
    }

    /// Fail unless `count` fids of `pid` and `count` stream records are free
    pub fn check_reserve(&self, pid: Pid, count: usize) -> KernelResult<()> {
        let process = self.live_process(pid)?;
        let free_fids = process
            .fids
            .iter()
            .filter(|slot| slot.is_none())
            .count();
        if free_fids < count {
            return Err(KernelError::TableExhausted(Resource::FileIds));
        }
        if self.streams.available() < count {
            return Err(KernelError::TableExhausted(Resource::Streams));
        }
        Ok(())
    }

    /// Create a stream record with refcount 1 and bind it to the lowest free fid
    ///
    /// Nothing is changed on failure.
    pub fn install(&mut self, pid: Pid, object: StreamObject) -> KernelResult<(Fid, StreamId)> {
        let fid = self
            .live_process(pid)?
            .fids
            .iter()
            .position(|slot| slot.is_none())
            .ok_or(KernelError::TableExhausted(Resource::FileIds))?;
        let sid = self
            .create_stream(object)
            .ok_or(KernelError::TableExhausted(Resource::Streams))?;
        self.process_mut(pid)?.fids[fid] = Some(sid);
        debug!(%pid, fid, stream = %sid, ?object, "Installed stream");
        Ok((fid, sid))
    }

    /// Stream record not bound to any fid (owned by a socket)
    pub fn create_stream(&mut self, object: StreamObject) -> Option<StreamId> {
        self.streams.insert(Stream {
            refcount: 1,
            object,
        })
    }

    pub fn incref(&mut self, sid: StreamId) {
        if let Some(stream) = self.streams.get_mut(sid) {
            stream.refcount += 1;
        }
    }

    /// Drop one reference; the last one releases the record and runs close
    pub fn decref(&mut self, sid: StreamId) {
        let Some(stream) = self.streams.get_mut(sid) else {
            return;
        };
        stream.refcount = stream.refcount.saturating_sub(1);
        if stream.refcount > 0 {
            return;
        }
        if let Some(stream) = self.streams.remove(sid) {
            debug!(stream = %sid, object = ?stream.object, "Closing stream");
            self.close_object(stream.object);
        }
    }

    fn close_object(&mut self, object: StreamObject) {
        match object {
            StreamObject::PipeReader(pipe) => self.close_pipe_reader(pipe),
            StreamObject::PipeWriter(pipe) => self.close_pipe_writer(pipe),
            StreamObject::Socket(socket) => self.close_socket(socket),
        }
    }

    /// Unbind `fid` and drop its reference
    pub fn close_fid(&mut self, pid: Pid, fid: Fid) -> KernelResult<()> {
        let sid = self
            .process_mut(pid)?
            .fids
            .get_mut(fid)
            .and_then(Option::take)
            .ok_or(KernelError::BadFile(fid))?;
        self.decref(sid);
        Ok(())
    }
}
