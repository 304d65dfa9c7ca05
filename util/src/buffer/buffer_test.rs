use super::*;

#[test]
fn test_pool_recycles_up_to_cap() {
    let pool = BufferPool::new();

    let bufs: Vec<Vec<u8>> = (0..6).map(|_| pool.take()).collect();
    assert_eq!(pool.recycled(), 0);

    for buf in bufs {
        pool.put(buf);
    }
    assert_eq!(pool.recycled(), MAX_RECYCLED_BUFFERS);
}

#[test]
fn test_pool_take_reuses() {
    let pool = BufferPool::new();
    let buf = pool.take();
    assert_eq!(buf.len(), RECYCLE_BUFFER_SIZE);
    pool.put(buf);
    assert_eq!(pool.recycled(), 1);

    let buf = pool.take();
    assert_eq!(buf.len(), RECYCLE_BUFFER_SIZE);
    assert_eq!(pool.recycled(), 0);
}

#[test]
fn test_pool_rejects_small_buffers() {
    let pool = BufferPool::new();
    pool.put(vec![0u8; 16]);
    assert_eq!(pool.recycled(), 0);
}
