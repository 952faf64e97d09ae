//! Hook table implemented by concrete pool kinds.

use bitflags::bitflags;

use crate::config::PoolConfiguration;
use crate::error::{PoolError, Result};

use super::PoolCore;

bitflags! {
    /// Flags influencing a single acquire.
    ///
    /// Bits from [`AcquireFlags::LAST`] upwards are reserved for pool kinds;
    /// the generic pool passes them through untouched.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AcquireFlags: u32 {
        /// Return [`PoolError::Eos`] instead of blocking when the pool is
        /// exhausted.
        const DONT_WAIT = 1 << 2;
        /// First bit available to pool kinds.
        const LAST = 1 << 16;
    }
}

/// Unit of the `start`/`stop` hint in [`AcquireParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// No unit
    #[default]
    Undefined,
    /// Bytes
    Bytes,
    /// Nanoseconds
    Time,
    /// Objects
    Buffers,
    /// Percentage scaled by 10000
    Percent,
}

/// Optional parameters for an acquire.
///
/// Only `flags` is interpreted by the generic pool; the format and range
/// hints are handed to the pool kind's hooks unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AcquireParams {
    /// Acquire flags
    pub flags: AcquireFlags,
    /// Unit of `start` and `stop`
    pub format: Format,
    /// Start of the requested range
    pub start: Option<u64>,
    /// End of the requested range
    pub stop: Option<u64>,
}

impl AcquireParams {
    /// Parameters carrying only `flags`.
    pub fn with_flags(flags: AcquireFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    /// Parameters for a non-blocking acquire.
    pub fn dont_wait() -> Self {
        Self::with_flags(AcquireFlags::DONT_WAIT)
    }

    pub(crate) fn is_dont_wait(params: Option<&AcquireParams>) -> bool {
        params.is_some_and(|p| p.flags.contains(AcquireFlags::DONT_WAIT))
    }
}

/// Behavior of a concrete pool kind.
///
/// Every hook has a default except where a pool kind must provide
/// something of its own. Defaults that do real work call the matching
/// `parent_*` method on [`PoolCore`], and an override that wants to keep
/// the base behavior should chain to it the same way.
///
/// `start`, `stop`, `set_config`, `flush_start` and `flush_stop` run with
/// the pool's lifecycle lock held. The lock is reentrant, so hooks may call
/// back into the pool from the same thread.
pub trait PoolImpl: Sized + Send + Sync + 'static {
    /// The object type handed out by the pool.
    type Object: Send + 'static;
    /// The configuration type accepted by the pool.
    type Config: PoolConfiguration + Default;

    /// Fabricate a new object.
    ///
    /// The default reports [`PoolError::NotSupported`].
    fn alloc_object(
        &self,
        _pool: &PoolCore<Self>,
        _params: Option<&AcquireParams>,
    ) -> Result<Self::Object> {
        Err(PoolError::NotSupported("pool kind has no alloc_object"))
    }

    /// Preallocate resources when the pool is activated.
    fn start(&self, pool: &PoolCore<Self>) -> Result<()> {
        pool.parent_start()
    }

    /// Free resources when the pool is deactivated.
    fn stop(&self, pool: &PoolCore<Self>) -> Result<()> {
        pool.parent_stop()
    }

    /// Parse and apply a configuration.
    ///
    /// The hook may adjust `config`; the adjusted value is what the pool
    /// stores. Overrides must chain to [`PoolCore::parent_set_config`].
    fn set_config(&self, pool: &PoolCore<Self>, config: &mut Self::Config) -> Result<()> {
        pool.parent_set_config(config)
    }

    /// Option tags this pool kind understands.
    fn get_options(&self) -> &[&'static str] {
        &[]
    }

    /// Obtain an object for a consumer.
    fn acquire_object(
        &self,
        pool: &PoolCore<Self>,
        params: Option<&AcquireParams>,
    ) -> Result<Self::Object> {
        pool.parent_acquire_object(params)
    }

    /// Prepare a returned object for reuse.
    fn reset_object(&self, _pool: &PoolCore<Self>, _object: &mut Self::Object) {}

    /// Put a returned object back into storage.
    ///
    /// The default queues it and wakes a waiting acquirer. Overrides that
    /// refuse an object hand it to [`PoolCore::discard_object`] instead.
    fn release_object(&self, pool: &PoolCore<Self>, object: Self::Object) {
        pool.parent_release_object(object);
    }

    /// Destroy an object. The default drops it.
    fn free_object(&self, _pool: &PoolCore<Self>, object: Self::Object) {
        drop(object);
    }

    /// Called after the pool entered the flushing state.
    fn flush_start(&self, _pool: &PoolCore<Self>) {}

    /// Called before the pool leaves the flushing state.
    fn flush_stop(&self, _pool: &PoolCore<Self>) {}
}
