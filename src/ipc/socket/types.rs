/*!
 * Socket Types
 * Socket, listener/peer roles and connection requests
 */

use crate::core::types::{Port, RequestId, SocketId, StreamId};
use parking_lot::Condvar;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Externally visible socket state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocketState {
    Unbound,
    Listening,
    Connected,
}

/// Direction(s) closed by a shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownMode {
    Read,
    Write,
    Both,
}

impl ShutdownMode {
    #[inline]
    pub(crate) fn closes_read(self) -> bool {
        matches!(self, ShutdownMode::Read | ShutdownMode::Both)
    }

    #[inline]
    pub(crate) fn closes_write(self) -> bool {
        matches!(self, ShutdownMode::Write | ShutdownMode::Both)
    }
}

/// Listening side: queue of connect requests awaiting accept
pub(crate) struct Listener {
    pub requests: VecDeque<RequestId>,
    pub pending: usize,
    pub ready: Arc<Condvar>,
}

impl Listener {
    pub fn new() -> Self {
        Self {
            requests: VecDeque::new(),
            pending: 0,
            ready: Arc::new(Condvar::new()),
        }
    }
}

/// Connected side: the pipe ends forming the duplex channel
///
/// Either end is cleared by a shutdown of its direction.
pub(crate) struct Peer {
    pub send: Option<StreamId>,
    pub receive: Option<StreamId>,
}

pub(crate) enum SocketRole {
    Unbound,
    Listener(Listener),
    Peer(Peer),
}

pub(crate) struct Socket {
    pub port: Port,
    pub role: SocketRole,
}

impl Socket {
    pub fn state(&self) -> SocketState {
        match self.role {
            SocketRole::Unbound => SocketState::Unbound,
            SocketRole::Listener(_) => SocketState::Listening,
            SocketRole::Peer(_) => SocketState::Connected,
        }
    }

    pub fn listener_mut(&mut self) -> Option<&mut Listener> {
        match &mut self.role {
            SocketRole::Listener(listener) => Some(listener),
            _ => None,
        }
    }

    pub fn peer(&self) -> Option<&Peer> {
        match &self.role {
            SocketRole::Peer(peer) => Some(peer),
            _ => None,
        }
    }

    pub fn peer_mut(&mut self) -> Option<&mut Peer> {
        match &mut self.role {
            SocketRole::Peer(peer) => Some(peer),
            _ => None,
        }
    }
}

/// Outcome of a connect request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Served {
    Pending,
    Accepted,
    Rejected,
}

/// A connect attempt queued on a listener
pub(crate) struct ConnectionRequest {
    pub socket: SocketId,
    pub served: Served,
    pub done: Arc<Condvar>,
}
