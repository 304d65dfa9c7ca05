#[cfg(test)]
mod buffer_test;

use parking_lot::Mutex;

/// Size of one recycled datagram buffer. Large enough for the biggest
/// ChannelData frame plus framing.
pub const RECYCLE_BUFFER_SIZE: usize = 1 << 16;

/// Upper bound on buffers kept for reuse; anything returned beyond
/// this is simply freed.
pub const MAX_RECYCLED_BUFFERS: usize = 4;

/// A small pool of datagram receive buffers shared by the socket read
/// loops, so steady-state traffic does not allocate per packet.
#[derive(Default)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new() -> Self {
        BufferPool {
            free: Mutex::new(Vec::with_capacity(MAX_RECYCLED_BUFFERS)),
        }
    }

    /// Takes a buffer of RECYCLE_BUFFER_SIZE bytes, recycled if one is
    /// available.
    pub fn take(&self) -> Vec<u8> {
        let mut free = self.free.lock();
        if let Some(mut buf) = free.pop() {
            buf.resize(RECYCLE_BUFFER_SIZE, 0);
            buf
        } else {
            vec![0u8; RECYCLE_BUFFER_SIZE]
        }
    }

    /// Returns a buffer to the pool. Buffers of the wrong capacity and
    /// buffers beyond MAX_RECYCLED_BUFFERS are dropped.
    pub fn put(&self, buf: Vec<u8>) {
        if buf.capacity() < RECYCLE_BUFFER_SIZE {
            return;
        }
        let mut free = self.free.lock();
        if free.len() < MAX_RECYCLED_BUFFERS {
            free.push(buf);
        }
    }

    pub fn recycled(&self) -> usize {
        self.free.lock().len()
    }
}
