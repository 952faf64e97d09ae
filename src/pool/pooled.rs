//! RAII handle for pool-managed objects.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use super::{MiniObjectPool, PoolCore, PoolImpl};

/// An object borrowed from a pool that automatically returns on drop.
///
/// While the handle exists the pool counts the object as outstanding. On
/// drop the pool kind resets the object and puts it back in the pool, or
/// discards it if it refuses the object.
///
/// The handle keeps the pool alive: a pool whose last [`MiniObjectPool`]
/// handle is gone finalizes only after every outstanding object came back.
pub struct Pooled<P: PoolImpl> {
    /// The object (None after being returned)
    object: Option<P::Object>,
    /// Owning pool (None after being returned or detached)
    pool: Option<Arc<PoolCore<P>>>,
}

impl<P: PoolImpl> Pooled<P> {
    pub(super) fn new(object: P::Object, pool: Arc<PoolCore<P>>) -> Self {
        Self {
            object: Some(object),
            pool: Some(pool),
        }
    }

    /// Get a reference to the object.
    ///
    /// # Panics
    ///
    /// Panics if the object has already been returned through
    /// [`MiniObjectPool::release`].
    pub fn object(&self) -> &P::Object {
        self.object
            .as_ref()
            .expect("Object should be present - it was already released")
    }

    /// Get a mutable reference to the object.
    ///
    /// # Panics
    ///
    /// Panics if the object has already been returned through
    /// [`MiniObjectPool::release`].
    pub fn object_mut(&mut self) -> &mut P::Object {
        self.object
            .as_mut()
            .expect("Object should be present - it was already released")
    }

    /// The object, or `None` if it was already returned.
    pub fn try_object(&self) -> Option<&P::Object> {
        self.object.as_ref()
    }

    /// Whether the handle still holds its object.
    pub fn is_present(&self) -> bool {
        self.object.is_some()
    }

    /// The pool the object will return to.
    pub fn pool(&self) -> Option<MiniObjectPool<P>> {
        self.pool.as_ref().map(|pool| MiniObjectPool::from_core(Arc::clone(pool)))
    }

    /// Whether the object will return to `pool`.
    pub fn is_owned_by(&self, pool: &MiniObjectPool<P>) -> bool {
        self.pool
            .as_ref()
            .is_some_and(|owner| Arc::ptr_eq(owner, &pool.core))
    }

    /// Return the object to its pool now.
    pub fn release(self) {
        drop(self);
    }

    /// Take the object out of pool management.
    ///
    /// The pool stops counting it, which frees its slot for a new allocation.
    /// Returns `None` if the object was already returned.
    pub fn detach(mut self) -> Option<P::Object> {
        let object = self.object.take()?;
        if let Some(pool) = self.pool.take() {
            pool.forget();
        }
        Some(object)
    }

    /// Destroy the object instead of returning it.
    pub fn discard(mut self) {
        if let (Some(object), Some(pool)) = (self.object.take(), self.pool.take()) {
            pool.discard_outstanding(object);
        }
    }

    /// Hand the object to `pool` if it is the owner, emptying the handle.
    pub(super) fn take_from(&mut self, pool: &Arc<PoolCore<P>>) -> Option<P::Object> {
        match &self.pool {
            Some(owner) if Arc::ptr_eq(owner, pool) => {
                self.pool = None;
                self.object.take()
            }
            _ => None,
        }
    }
}

impl<P: PoolImpl> Deref for Pooled<P> {
    type Target = P::Object;

    fn deref(&self) -> &Self::Target {
        self.object()
    }
}

impl<P: PoolImpl> DerefMut for Pooled<P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.object_mut()
    }
}

impl<P: PoolImpl> Drop for Pooled<P> {
    fn drop(&mut self) {
        if let (Some(object), Some(pool)) = (self.object.take(), self.pool.take()) {
            pool.release(object);
            // `pool` may be the last reference; it finalizes here.
        }
    }
}

impl<P: PoolImpl> fmt::Debug for Pooled<P>
where
    P::Object: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("object", &self.object)
            .field("pool", &self.pool.as_ref().map(|pool| pool.id()))
            .finish()
    }
}
