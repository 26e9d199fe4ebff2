//! Bounded recycling pool for write buffers.
//!
//! Completions return buffers from arbitrary threads while the producer
//! takes them on the real-time thread, so the pool is a lock-free
//! [`ArrayQueue`]. When it is full, returned buffers are simply freed.

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use tracing::trace;

pub struct BufferPool {
    queue: ArrayQueue<BytesMut>,
}

impl BufferPool {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
        }
    }

    /// An empty buffer able to hold `len` bytes.
    ///
    /// A pooled buffer that is too small is dropped in favour of a fresh
    /// allocation.
    pub fn checkout(&self, len: usize) -> BytesMut {
        match self.queue.pop() {
            Some(mut buffer) if buffer.capacity() >= len => {
                buffer.clear();
                buffer
            }
            Some(small) => {
                trace!(capacity = small.capacity(), wanted = len, "Discarding small pooled buffer");
                BytesMut::with_capacity(len)
            }
            None => BytesMut::with_capacity(len),
        }
    }

    /// Return a buffer. Returns `false` when the pool was full and the
    /// buffer was freed instead.
    pub fn recycle(&self, buffer: BytesMut) -> bool {
        self.queue.push(buffer).is_ok()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}
