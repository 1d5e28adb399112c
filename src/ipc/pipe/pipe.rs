/*!
 * Pipe Implementation
 * Bounded pipe object with ringbuf-based circular buffer
 */

use super::types::PIPE_CAPACITY;
use crate::core::types::{Size, StreamId};
use parking_lot::Condvar;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;

pub(crate) struct Pipe {
    /// Ring buffer holding at most `PIPE_CAPACITY` bytes
    buffer: HeapRb<u8>,
    /// Read end; cleared when the reader closes
    pub reader: Option<StreamId>,
    /// Write end; cleared when the writer closes
    pub writer: Option<StreamId>,
    pub has_data: Arc<Condvar>,
    pub has_space: Arc<Condvar>,
    /// Writers blocked mid-transfer on a full buffer
    pub stalled_writers: usize,
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("reader", &self.reader)
            .field("writer", &self.writer)
            .field("buffered_bytes", &self.buffered())
            .field("capacity", &PIPE_CAPACITY)
            .field("stalled_writers", &self.stalled_writers)
            .finish()
    }
}

impl Pipe {
    pub fn new() -> Self {
        Self {
            buffer: HeapRb::<u8>::new(PIPE_CAPACITY),
            reader: None,
            writer: None,
            has_data: Arc::new(Condvar::new()),
            has_space: Arc::new(Condvar::new()),
            stalled_writers: 0,
        }
    }

    #[inline]
    pub fn buffered(&self) -> Size {
        self.buffer.occupied_len()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Both ends gone; the pipe can be freed
    #[inline]
    pub fn is_orphaned(&self) -> bool {
        self.reader.is_none() && self.writer.is_none()
    }

    /// Copy as much of `data` as fits, returning the count copied
    pub fn push(&mut self, data: &[u8]) -> Size {
        self.buffer.push_slice(data)
    }

    /// Move up to `buf.len()` buffered bytes into `buf` in FIFO order
    pub fn pop(&mut self, buf: &mut [u8]) -> Size {
        self.buffer.pop_slice(buf)
    }
}
