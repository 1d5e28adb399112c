/*!
 * Connection Rendezvous
 *
 * listen/connect/accept handshake. A connector queues a request on the
 * listener and sleeps on the request; accept pops it, builds two pipes
 * (one per direction) and wakes the connector with the outcome.
 */

use super::types::{ConnectionRequest, Listener, Peer, Served, Socket, SocketRole};
use crate::core::errors::{KernelError, KernelResult, Resource};
use crate::core::limits::NOPORT;
use crate::core::types::{Fid, Pid, Port, RequestId, SocketId};
use crate::kernel::state::{suspend, KernelState};
use crate::streams::StreamObject;
use crate::syscalls::Context;
use parking_lot::Condvar;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Stream records consumed by one accept: the new socket and two pipes
const ACCEPT_STREAMS: usize = 5;

impl Context {
    /// Turn an unbound socket into the listener of its port
    pub fn listen(&self, fid: Fid) -> KernelResult<()> {
        let mut guard = self.lock();
        let id = guard.fid_socket(self.pid(), fid)?;
        let socket = guard.sockets.get(id).ok_or(KernelError::BadFile(fid))?;
        let port = socket.port;

        if !matches!(socket.role, SocketRole::Unbound) {
            return Err(KernelError::InvalidSocketState { expected: "unbound" });
        }
        if port == NOPORT {
            return Err(KernelError::InvalidPort(u32::from(port)));
        }
        if guard.ports[usize::from(port)].is_some() {
            return Err(KernelError::PortInUse(port));
        }

        if let Some(socket) = guard.sockets.get_mut(id) {
            socket.role = SocketRole::Listener(Listener::new());
        }
        guard.ports[usize::from(port)] = Some(id);
        debug!(socket = %id, port, "Listening");
        Ok(())
    }

    /// Connect an unbound socket to the listener on `port`
    ///
    /// Blocks until an accept serves the request. The timeout is accepted for
    /// interface compatibility; the wait is unconditional.
    pub fn connect(&self, fid: Fid, port: Port, _timeout: Option<Duration>) -> KernelResult<()> {
        let mut guard = self.lock();
        let id = guard.fid_socket(self.pid(), fid)?;

        let listener_id = guard
            .ports
            .get(usize::from(port))
            .copied()
            .ok_or(KernelError::InvalidPort(u32::from(port)))?
            .ok_or(KernelError::ConnectionRefused(port))?;
        if !matches!(
            guard.sockets.get(id).map(|s| &s.role),
            Some(SocketRole::Unbound)
        ) {
            return Err(KernelError::InvalidSocketState { expected: "unbound" });
        }

        let done = Arc::new(Condvar::new());
        let request = guard
            .requests
            .insert(ConnectionRequest {
                socket: id,
                served: Served::Pending,
                done: Arc::clone(&done),
            })
            .ok_or(KernelError::TableExhausted(Resource::Requests))?;

        match guard
            .sockets
            .get_mut(listener_id)
            .and_then(Socket::listener_mut)
        {
            Some(listener) => {
                listener.requests.push_back(request);
                listener.pending += 1;
                listener.ready.notify_all();
            }
            None => {
                guard.requests.remove(request);
                return Err(KernelError::ConnectionRefused(port));
            }
        }
        debug!(socket = %id, port, %request, "Connect request queued");

        let served = loop {
            match guard.requests.get(request).map(|r| r.served) {
                Some(Served::Pending) => suspend(&mut guard, &done, self.thread_self()),
                Some(outcome) => break outcome,
                None => break Served::Rejected,
            }
        };
        guard.requests.remove(request);

        match served {
            Served::Accepted => Ok(()),
            _ => Err(KernelError::ConnectionRefused(port)),
        }
    }

    /// Wait for a connect request and return the fid of the new peer socket
    pub fn accept(&self, fid: Fid) -> KernelResult<Fid> {
        let mut guard = self.lock();
        let pid = self.pid();
        let id = guard.fid_socket(pid, fid)?;

        let request = loop {
            let listener = guard
                .sockets
                .get_mut(id)
                .ok_or(KernelError::Closed)?
                .listener_mut()
                .ok_or(KernelError::InvalidSocketState {
                    expected: "listening",
                })?;
            if let Some(request) = listener.requests.pop_front() {
                listener.pending -= 1;
                break request;
            }
            let ready = Arc::clone(&listener.ready);
            suspend(&mut guard, &ready, self.thread_self());
        };

        match guard.serve(pid, id, request) {
            Ok(fid) => Ok(fid),
            Err(e) => {
                warn!(listener = %id, %request, error = %e, "Rejecting connect request");
                guard.reject(request);
                Err(e)
            }
        }
    }
}

impl KernelState {
    /// Wake the connector of `request` with a failure
    pub fn reject(&mut self, request: RequestId) {
        if let Some(req) = self.requests.get_mut(request) {
            req.served = Served::Rejected;
            req.done.notify_all();
        }
    }

    /// Build the peer pair for `request`; nothing is allocated on failure
    fn serve(&mut self, pid: Pid, listener: SocketId, request: RequestId) -> KernelResult<Fid> {
        let connector = self
            .requests
            .get(request)
            .map(|r| r.socket)
            .ok_or(KernelError::Closed)?;
        if !matches!(
            self.sockets.get(connector).map(|s| &s.role),
            Some(SocketRole::Unbound)
        ) {
            return Err(KernelError::InvalidSocketState { expected: "unbound" });
        }
        let port = self
            .sockets
            .get(listener)
            .map(|s| s.port)
            .ok_or(KernelError::Closed)?;

        self.check_reserve(pid, 1)?;
        if self.streams.available() < ACCEPT_STREAMS {
            return Err(KernelError::TableExhausted(Resource::Streams));
        }
        if self.pipes.available() < 2 {
            return Err(KernelError::TableExhausted(Resource::Pipes));
        }
        if self.sockets.available() == 0 {
            return Err(KernelError::TableExhausted(Resource::Sockets));
        }

        let accepted = self.new_socket(port)?;
        let (fid, _) = self.install(pid, StreamObject::Socket(accepted))?;
        // accepted -> connector, then connector -> accepted
        let (downstream_reader, downstream_writer) = self.create_unbound_pipe()?;
        let (upstream_reader, upstream_writer) = self.create_unbound_pipe()?;

        if let Some(socket) = self.sockets.get_mut(accepted) {
            socket.role = SocketRole::Peer(Peer {
                send: Some(downstream_writer),
                receive: Some(upstream_reader),
            });
        }
        if let Some(socket) = self.sockets.get_mut(connector) {
            socket.role = SocketRole::Peer(Peer {
                send: Some(upstream_writer),
                receive: Some(downstream_reader),
            });
        }
        if let Some(req) = self.requests.get_mut(request) {
            req.served = Served::Accepted;
            req.done.notify_all();
        }

        debug!(%pid, %listener, %accepted, %connector, fid, "Accepted connection");
        Ok(fid)
    }
}
