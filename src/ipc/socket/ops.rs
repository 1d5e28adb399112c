/*!
 * Socket Operations
 * Creation, duplex read/write, shutdown and close
 */

use super::types::{ShutdownMode, Socket, SocketRole, SocketState};
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::types::{Fid, Pid, Port, Size, SocketId, StreamId, Tid};
use crate::ipc::pipe;
use crate::kernel::state::{KernelGuard, KernelState};
use crate::streams::StreamObject;
use crate::syscalls::Context;
use tracing::debug;

impl Context {
    /// Create an unbound socket on `port` (`NOPORT` for connect-only sockets)
    pub fn socket(&self, port: Port) -> KernelResult<Fid> {
        let mut guard = self.lock();
        let pid = self.pid();

        if usize::from(port) >= guard.ports.len() {
            return Err(KernelError::InvalidPort(u32::from(port)));
        }
        guard.check_reserve(pid, 1)?;

        let id = guard.new_socket(port)?;
        let (fid, _) = guard.install(pid, StreamObject::Socket(id))?;
        debug!(%pid, socket = %id, fid, port, "Created socket");
        Ok(fid)
    }

    pub fn socket_state(&self, fid: Fid) -> KernelResult<SocketState> {
        let guard = self.lock();
        let id = guard.fid_socket(self.pid(), fid)?;
        guard
            .sockets
            .get(id)
            .map(Socket::state)
            .ok_or(KernelError::BadFile(fid))
    }

    /// Close one or both directions of a connected socket
    pub fn shutdown(&self, fid: Fid, mode: ShutdownMode) -> KernelResult<()> {
        let mut guard = self.lock();
        let id = guard.fid_socket(self.pid(), fid)?;
        let peer = guard
            .sockets
            .get_mut(id)
            .and_then(Socket::peer_mut)
            .ok_or(KernelError::InvalidSocketState {
                expected: "connected",
            })?;

        let receive = if mode.closes_read() {
            peer.receive.take()
        } else {
            None
        };
        let send = if mode.closes_write() {
            peer.send.take()
        } else {
            None
        };
        for end in [receive, send].into_iter().flatten() {
            guard.decref(end);
        }

        debug!(socket = %id, ?mode, "Shut down socket");
        Ok(())
    }
}

impl KernelState {
    pub fn new_socket(&mut self, port: Port) -> KernelResult<SocketId> {
        self.sockets
            .insert(Socket {
                port,
                role: SocketRole::Unbound,
            })
            .ok_or(KernelError::TableExhausted(Resource::Sockets))
    }

    /// Socket behind `fid`; other stream kinds are bad file ids here
    pub fn fid_socket(&self, pid: Pid, fid: Fid) -> KernelResult<SocketId> {
        match self.fid_object(pid, fid)? {
            StreamObject::Socket(id) if self.sockets.contains(id) => Ok(id),
            _ => Err(KernelError::BadFile(fid)),
        }
    }

    /// Close op of a socket stream
    pub fn close_socket(&mut self, id: SocketId) {
        let Some(socket) = self.sockets.remove(id) else {
            return;
        };
        match socket.role {
            SocketRole::Unbound => {}
            SocketRole::Listener(listener) => {
                let port = usize::from(socket.port);
                if self.ports.get(port).copied().flatten() == Some(id) {
                    self.ports[port] = None;
                }
                for request in listener.requests {
                    self.reject(request);
                }
                listener.ready.notify_all();
            }
            SocketRole::Peer(peer) => {
                for end in [peer.send, peer.receive].into_iter().flatten() {
                    self.decref(end);
                }
            }
        }
        debug!(socket = %id, port = socket.port, "Closed socket");
    }
}

fn pipe_of(state: &KernelState, end: StreamId) -> Option<StreamObject> {
    state.streams.get(end).map(|stream| stream.object)
}

pub(crate) fn read(
    guard: &mut KernelGuard<'_>,
    tid: Tid,
    id: SocketId,
    buf: &mut [u8],
) -> KernelResult<Size> {
    let socket = guard.sockets.get(id).ok_or(KernelError::Closed)?;
    let receive = socket
        .peer()
        .ok_or(KernelError::NotConnected)?
        .receive
        .ok_or(KernelError::Closed)?;
    match pipe_of(&**guard, receive) {
        Some(StreamObject::PipeReader(pipe)) => pipe::read(guard, tid, pipe, buf),
        _ => Err(KernelError::Closed),
    }
}

pub(crate) fn write(
    guard: &mut KernelGuard<'_>,
    tid: Tid,
    id: SocketId,
    data: &[u8],
) -> KernelResult<Size> {
    let socket = guard.sockets.get(id).ok_or(KernelError::Closed)?;
    let send = socket
        .peer()
        .ok_or(KernelError::NotConnected)?
        .send
        .ok_or(KernelError::BrokenPipe)?;
    match pipe_of(&**guard, send) {
        Some(StreamObject::PipeWriter(pipe)) => pipe::write(guard, tid, pipe, data),
        _ => Err(KernelError::BrokenPipe),
    }
}
