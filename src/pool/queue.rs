//! Lock-free queue of idle objects.

use crossbeam::queue::SegQueue;

/// Unbounded MPMC FIFO holding the objects that are currently free.
///
/// `push` and `pop` never block. Ordering is FIFO per producer only.
pub(crate) struct RecycleQueue<T> {
    inner: SegQueue<T>,
}

impl<T> RecycleQueue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: SegQueue::new(),
        }
    }

    #[inline]
    pub(crate) fn push(&self, object: T) {
        self.inner.push(object);
    }

    #[inline]
    pub(crate) fn pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Number of queued objects. Only exact at quiescent points.
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}
