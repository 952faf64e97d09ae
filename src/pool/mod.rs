//! Generic recyclable object pool.
//!
//! A [`MiniObjectPool`] hands out objects fabricated by a [`PoolImpl`] and
//! takes them back when the [`Pooled`] handle is dropped. Idle objects sit in
//! a lock-free queue; acquirers that find the queue empty and the pool at its
//! `max_objects` bound sleep on a token gate until an object comes back or the
//! pool starts flushing.
//!
//! Lifecycle:
//!
//! ```text
//! Unconfigured --set_config--> Configured --set_active(true)--> Active
//!      Active --set_flushing(true)--> Flushing --set_flushing(false)--> Active
//!      Active --set_active(false)--> Deactivating (objects outstanding)
//!                                 or Configured (nothing outstanding)
//! Deactivating --last object returned--> Configured
//! ```
//!
//! Lifecycle changes are serialized by a reentrant lock. The acquire and
//! release paths never take it, except when the last outstanding object of a
//! deactivated pool comes back and the pool drains itself.

mod gate;
mod imp;
mod pooled;
mod queue;
mod stats;


pub use imp::{AcquireFlags, AcquireParams, Format, PoolImpl};
pub use pooled::Pooled;
pub use stats::PoolStats;

use std::cell::RefCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::config::PoolConfiguration;
use crate::error::{PoolError, Result};
use crate::logging::POOL;
use crate::{log_debug, log_error, log_info, log_trace, log_warn};

use gate::Gate;
use queue::RecycleQueue;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(0);

/// Observable lifecycle state of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// No configuration accepted yet
    Unconfigured,
    /// Configured and inactive, nothing allocated
    Configured,
    /// Handing out objects
    Active,
    /// Active, but acquires fail with [`PoolError::Flushing`]
    Flushing,
    /// Deactivated while objects are still outstanding
    Deactivating,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Unconfigured => "unconfigured",
            PoolState::Configured => "configured",
            PoolState::Active => "active",
            PoolState::Flushing => "flushing",
            PoolState::Deactivating => "deactivating",
        };
        f.write_str(name)
    }
}

/// State guarded by the lifecycle lock.
struct Lifecycle<C> {
    config: C,
    configured: bool,
    started: bool,
    active: bool,
    min_objects: u32,
}

/// Allocation accounting. `cur` never exceeds a non-zero `max`.
#[derive(Default)]
struct Accountant {
    cur: AtomicU32,
    max: AtomicU32,
    total_allocations: AtomicU64,
    discarded: AtomicU64,
}

impl Accountant {
    /// Reserve room for one more object, failing at the bound.
    fn reserve(&self) -> bool {
        let max = self.max.load(Ordering::Acquire);
        self.cur
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                if max != 0 && cur >= max {
                    None
                } else {
                    Some(cur + 1)
                }
            })
            .is_ok()
    }

    fn give_back(&self) {
        let _ = self
            .cur
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| cur.checked_sub(1));
    }

    fn cur(&self) -> u32 {
        self.cur.load(Ordering::Acquire)
    }

    fn max(&self) -> u32 {
        self.max.load(Ordering::Acquire)
    }
}

/// Shared state of a pool.
///
/// Pool kinds receive a `&PoolCore` in every hook. Besides the counters it
/// exposes the `parent_*` methods implementing the default behavior of each
/// hook, so an override can do its own work and then chain to the base.
pub struct PoolCore<P: PoolImpl> {
    imp: P,
    id: u64,
    queue: RecycleQueue<P::Object>,
    gate: Gate,
    flushing: AtomicBool,
    // Lock-free mirror of `Lifecycle::configured` for the acquire path.
    configured: AtomicBool,
    outstanding: AtomicU32,
    accountant: Accountant,
    lifecycle: ReentrantMutex<RefCell<Lifecycle<P::Config>>>,
}

impl<P: PoolImpl> PoolCore<P> {
    fn new(imp: P) -> Self {
        let id = NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed);
        log_debug!(POOL, pool = id, "created pool");
        Self {
            imp,
            id,
            queue: RecycleQueue::new(),
            // One flush token (new pools are flushing) and one wait token.
            gate: Gate::new(2),
            flushing: AtomicBool::new(true),
            configured: AtomicBool::new(false),
            outstanding: AtomicU32::new(0),
            accountant: Accountant::default(),
            lifecycle: ReentrantMutex::new(RefCell::new(Lifecycle {
                config: P::Config::default(),
                configured: false,
                started: false,
                active: false,
                min_objects: 0,
            })),
        }
    }

    /// The pool kind implementation.
    pub fn imp(&self) -> &P {
        &self.imp
    }

    /// Process-unique identifier used in log events.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether acquires currently fail with [`PoolError::Flushing`].
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// Objects currently allocated, idle or outstanding.
    pub fn cur_objects(&self) -> u32 {
        self.accountant.cur()
    }

    /// Upper bound on allocated objects (0 = unlimited).
    pub fn max_objects(&self) -> u32 {
        self.accountant.max()
    }

    /// Objects preallocated on activation.
    pub fn min_objects(&self) -> u32 {
        self.lifecycle.lock().borrow().min_objects
    }

    /// Objects handed out and not yet returned, including acquires in
    /// progress.
    pub fn outstanding(&self) -> u32 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Objects idle in the recycle queue.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Copy of the stored configuration.
    pub fn config(&self) -> P::Config {
        self.lifecycle.lock().borrow().config.clone()
    }

    /// Default `start`: preallocate `min_objects` objects into the queue.
    pub fn parent_start(&self) -> Result<()> {
        let min_objects = self.min_objects();
        log_debug!(POOL, pool = self.id, min_objects, "preallocating objects");

        for index in 0..min_objects {
            let object = match self.alloc_object(None) {
                Ok(object) => object,
                Err(err) => {
                    log_warn!(POOL, pool = self.id, index, error = %err, "failed to allocate object");
                    return Err(err);
                }
            };
            self.imp.release_object(self, object);
        }
        Ok(())
    }

    /// Default `stop`: free every queued object.
    ///
    /// Fails with [`PoolError::StopFailed`] if objects remain accounted as
    /// allocated afterwards.
    pub fn parent_stop(&self) -> Result<()> {
        self.drain();

        let remaining = self.accountant.cur();
        if remaining != 0 {
            log_warn!(POOL, pool = self.id, remaining, "stop with objects still allocated");
            return Err(PoolError::StopFailed { remaining });
        }
        Ok(())
    }

    /// Default `set_config`: validate and apply the mandatory parameters.
    ///
    /// Options the pool kind does not list in
    /// [`get_options`](PoolImpl::get_options) are refused.
    pub fn parent_set_config(&self, config: &mut P::Config) -> Result<()> {
        let base = config.pool();
        base.validate()?;

        let supported = self.imp.get_options();
        let unknown = base
            .options
            .iter()
            .find(|option| !supported.iter().any(|known| known == option));
        if let Some(option) = unknown {
            log_warn!(POOL, pool = self.id, option, "option not supported");
            return Err(PoolError::bad_config(format!("unsupported option {option:?}")));
        }

        let (min_objects, max_objects) = base.params();
        self.lifecycle.lock().borrow_mut().min_objects = min_objects;
        self.accountant.max.store(max_objects, Ordering::Release);

        log_debug!(POOL, pool = self.id, min_objects, max_objects, "applied configuration");
        Ok(())
    }

    /// Default `acquire_object`: reuse a queued object, allocate a new one,
    /// or wait for one to be returned.
    pub fn parent_acquire_object(&self, params: Option<&AcquireParams>) -> Result<P::Object> {
        loop {
            if self.is_flushing() {
                log_debug!(POOL, pool = self.id, "we are flushing");
                return Err(PoolError::Flushing);
            }

            if let Some(object) = self.queue.pop() {
                // Pairs with the token written by the releaser.
                self.gate.consume_token();
                log_trace!(POOL, pool = self.id, "reusing queued object");
                return Ok(object);
            }

            match self.alloc_object(params) {
                Err(PoolError::Eos) => {}
                other => return other,
            }

            if AcquireParams::is_dont_wait(params) {
                log_debug!(POOL, pool = self.id, "no more objects");
                return Err(PoolError::Eos);
            }

            log_trace!(POOL, pool = self.id, "waiting for free objects or flush");
            if self.gate.read_token() {
                // We hold the wait token. Sleep only if nobody is flushing,
                // then hand the token back for the next waiter.
                if !self.is_flushing() {
                    self.gate.wait();
                }
                self.gate.write_token();
            } else {
                // Another thread holds the wait token. Sleep until it writes
                // something.
                self.gate.wait();
            }
        }
    }

    /// Default `release_object`: queue the object and wake a waiter.
    pub fn parent_release_object(&self, object: P::Object) {
        self.queue.push(object);
        self.gate.write_token();
    }

    /// Destroy `object` instead of queueing it, releasing its slot.
    pub fn discard_object(&self, object: P::Object) {
        self.accountant.discarded.fetch_add(1, Ordering::Relaxed);
        log_trace!(POOL, pool = self.id, "discarding object");
        self.free_object(object);
    }

    fn alloc_object(&self, params: Option<&AcquireParams>) -> Result<P::Object> {
        if !self.accountant.reserve() {
            log_debug!(POOL, pool = self.id, max = self.accountant.max(), "max objects reached");
            return Err(PoolError::Eos);
        }

        match self.imp.alloc_object(self, params) {
            Ok(object) => {
                self.accountant.total_allocations.fetch_add(1, Ordering::Relaxed);
                log_trace!(POOL, pool = self.id, cur = self.accountant.cur(), "allocated object");
                Ok(object)
            }
            Err(err) => {
                self.accountant.give_back();
                log_warn!(POOL, pool = self.id, error = %err, "alloc function failed");
                Err(err)
            }
        }
    }

    fn free_object(&self, object: P::Object) {
        self.accountant.give_back();
        self.imp.free_object(self, object);
    }

    /// Free everything sitting in the queue.
    fn drain(&self) {
        while let Some(object) = self.queue.pop() {
            self.gate.consume_token();
            self.free_object(object);
        }
    }

    fn do_start(&self, state: &RefCell<Lifecycle<P::Config>>) -> Result<()> {
        if state.borrow().started {
            return Ok(());
        }

        log_debug!(POOL, pool = self.id, "starting");
        if let Err(err) = self.imp.start(self) {
            // Give back whatever was preallocated before the failure.
            self.drain();
            return Err(err);
        }
        state.borrow_mut().started = true;
        Ok(())
    }

    fn do_stop(&self, state: &RefCell<Lifecycle<P::Config>>) -> Result<()> {
        if !state.borrow().started {
            return Ok(());
        }

        log_debug!(POOL, pool = self.id, "stopping");
        let result = self.imp.stop(self);
        state.borrow_mut().started = false;
        result
    }

    /// Must be called with the lifecycle lock held.
    fn do_set_flushing(&self, flushing: bool) {
        if self.is_flushing() == flushing {
            return;
        }

        if flushing {
            self.flushing.store(true, Ordering::SeqCst);
            // Wake everyone waiting for free objects.
            self.gate.write_token();
            self.imp.flush_start(self);
        } else {
            self.imp.flush_stop(self);
            // The token may be borrowed by a waiter right now; it comes back.
            self.gate.consume_token();
            self.flushing.store(false, Ordering::SeqCst);
        }
        log_debug!(POOL, pool = self.id, flushing, "flushing changed");
    }

    fn set_config(&self, mut config: P::Config) -> Result<()> {
        let guard = self.lifecycle.lock();
        let state: &RefCell<_> = &guard;

        {
            let current = state.borrow();
            if current.configured && current.config == config {
                log_debug!(POOL, pool = self.id, "configuration unchanged");
                return Ok(());
            }
            if current.active {
                log_info!(POOL, pool = self.id, "can't change config, we are active");
                return Err(PoolError::Active);
            }
        }

        let count = self.outstanding();
        if count != 0 {
            log_warn!(POOL, pool = self.id, count, "can't change config, have outstanding objects");
            return Err(PoolError::OutstandingObjects { count });
        }

        let result = self.imp.set_config(self, &mut config);

        let mut current = state.borrow_mut();
        current.config = config;
        current.configured = result.is_ok();
        self.configured.store(current.configured, Ordering::Release);

        match &result {
            Ok(()) => log_debug!(POOL, pool = self.id, config = ?current.config, "configured"),
            Err(err) => log_warn!(POOL, pool = self.id, error = %err, "configuration refused"),
        }
        result
    }

    fn set_active(&self, active: bool) -> Result<()> {
        let guard = self.lifecycle.lock();
        let state: &RefCell<_> = &guard;

        {
            let current = state.borrow();
            if current.active == active {
                log_debug!(POOL, pool = self.id, active, "pool was in the right state");
                return Ok(());
            }
            if !current.configured {
                log_error!(POOL, pool = self.id, "pool was not configured");
                return Err(PoolError::NotConfigured);
            }
        }

        log_debug!(POOL, pool = self.id, active, "setting active");
        if active {
            if let Err(err) = self.do_start(state) {
                log_error!(POOL, pool = self.id, error = %err, "start failed");
                return Err(err);
            }
            // Mark active before leaving the flushing state: flush_stop may
            // return objects and must not trigger a drain.
            state.borrow_mut().active = true;
            self.do_set_flushing(false);
            Ok(())
        } else {
            self.do_set_flushing(true);

            // With objects outstanding, the last one to come back drains.
            let result = if self.outstanding() == 0 {
                self.do_stop(state)
            } else {
                Ok(())
            };
            state.borrow_mut().active = false;

            if let Err(err) = &result {
                log_warn!(POOL, pool = self.id, error = %err, "stop failed");
            }
            result
        }
    }

    fn set_flushing(&self, flushing: bool) {
        let guard = self.lifecycle.lock();
        if !guard.borrow().active {
            log_warn!(POOL, pool = self.id, "can't change flushing state of inactive pool");
            return;
        }
        self.do_set_flushing(flushing);
    }

    fn is_active(&self) -> bool {
        self.lifecycle.lock().borrow().active
    }

    fn state(&self) -> PoolState {
        let guard = self.lifecycle.lock();
        let current = guard.borrow();
        if !current.configured {
            PoolState::Unconfigured
        } else if current.active {
            if self.is_flushing() {
                PoolState::Flushing
            } else {
                PoolState::Active
            }
        } else if current.started {
            PoolState::Deactivating
        } else {
            PoolState::Configured
        }
    }

    fn acquire(self: &Arc<Self>, params: Option<&AcquireParams>) -> Result<Pooled<P>> {
        if !self.configured.load(Ordering::Acquire) {
            return Err(PoolError::NotSupported("acquire on an unconfigured pool"));
        }

        // Counted before dispatch so a deactivation racing with us does not
        // drain the pool under our feet.
        self.outstanding.fetch_add(1, Ordering::AcqRel);
        match self.imp.acquire_object(self, params) {
            Ok(object) => Ok(Pooled::new(object, Arc::clone(self))),
            Err(err) => {
                self.dec_outstanding();
                Err(err)
            }
        }
    }

    /// Return an object that was handed out by this pool.
    fn release(&self, mut object: P::Object) {
        self.imp.reset_object(self, &mut object);
        self.imp.release_object(self, object);
        self.dec_outstanding();
    }

    /// Drop an outstanding object from the pool's books without returning it.
    fn forget(&self) {
        self.accountant.give_back();
        self.dec_outstanding();
    }

    /// Destroy an outstanding object.
    fn discard_outstanding(&self, object: P::Object) {
        self.discard_object(object);
        self.dec_outstanding();
    }

    fn dec_outstanding(&self) {
        let previous = self.outstanding.fetch_sub(1, Ordering::AcqRel);
        if previous == 1 && self.is_flushing() {
            let guard = self.lifecycle.lock();
            let state: &RefCell<_> = &guard;
            // Only a deactivated pool drains here; a merely flushing one
            // keeps its objects.
            if !state.borrow().active {
                if let Err(err) = self.do_stop(state) {
                    log_warn!(POOL, pool = self.id, error = %err, "deferred stop failed");
                }
            }
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            state: self.state(),
            min_objects: self.min_objects(),
            max_objects: self.accountant.max(),
            cur_objects: self.accountant.cur(),
            outstanding: self.outstanding(),
            queued: self.queue.len(),
            total_allocations: self.accountant.total_allocations.load(Ordering::Relaxed),
            discarded: self.accountant.discarded.load(Ordering::Relaxed),
        }
    }
}

impl<P: PoolImpl> Drop for PoolCore<P> {
    fn drop(&mut self) {
        log_debug!(POOL, pool = self.id, "finalizing pool");
        if let Err(err) = self.set_active(false) {
            log_warn!(POOL, pool = self.id, error = %err, "deactivation on drop failed");
        }
        self.drain();
    }
}

/// A pool of recyclable objects.
///
/// Cloning gives another handle to the same pool. The pool lives until the
/// last handle and the last outstanding [`Pooled`] object are gone; at that
/// point it deactivates and frees its idle objects.
///
/// # Examples
///
/// ```rust
/// use media_pool::{MiniObjectPool, PoolConfig, PoolCore, PoolImpl, AcquireParams, Result};
///
/// struct Counters;
///
/// impl PoolImpl for Counters {
///     type Object = u64;
///     type Config = PoolConfig;
///
///     fn alloc_object(&self, _: &PoolCore<Self>, _: Option<&AcquireParams>) -> Result<u64> {
///         Ok(0)
///     }
/// }
///
/// let pool = MiniObjectPool::new(Counters);
/// pool.set_config(PoolConfig::new(1, 2)).unwrap();
/// pool.set_active(true).unwrap();
///
/// let mut counter = pool.acquire().unwrap();
/// *counter += 1;
/// drop(counter);
///
/// assert_eq!(pool.stats().queued, 1);
/// ```
pub struct MiniObjectPool<P: PoolImpl> {
    core: Arc<PoolCore<P>>,
}

impl<P: PoolImpl> MiniObjectPool<P> {
    /// Create an unconfigured, inactive pool around `imp`.
    pub fn new(imp: P) -> Self {
        Self {
            core: Arc::new(PoolCore::new(imp)),
        }
    }

    pub(crate) fn from_core(core: Arc<PoolCore<P>>) -> Self {
        Self { core }
    }

    /// The pool kind implementation.
    pub fn imp(&self) -> &P {
        &self.core.imp
    }

    /// Shared pool state, as seen by the hooks.
    pub fn core(&self) -> &PoolCore<P> {
        &self.core
    }

    /// Whether two handles refer to the same pool.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Replace the configuration.
    ///
    /// Fails with [`PoolError::Active`] while the pool is active and with
    /// [`PoolError::OutstandingObjects`] while objects are handed out.
    /// Setting a configuration equal to the stored one is a no-op.
    ///
    /// The configuration as adjusted by the pool kind is stored even when it
    /// is refused, so [`get_config`](Self::get_config) shows what the pool
    /// would accept. A refused configuration leaves the pool unconfigured.
    pub fn set_config(&self, config: P::Config) -> Result<()> {
        self.core.set_config(config)
    }

    /// Copy of the stored configuration.
    pub fn get_config(&self) -> P::Config {
        self.core.config()
    }

    /// Option tags understood by this pool kind.
    pub fn get_options(&self) -> &[&'static str] {
        self.core.imp.get_options()
    }

    /// Whether this pool kind understands `option`.
    pub fn has_option(&self, option: &str) -> bool {
        self.get_options().iter().any(|o| *o == option)
    }

    /// Activate or deactivate the pool.
    ///
    /// Activation preallocates `min_objects` and clears flushing.
    /// Deactivation sets flushing, waking blocked acquirers, and frees the
    /// idle objects once nothing is outstanding. Requesting the current state
    /// is a no-op.
    pub fn set_active(&self, active: bool) -> Result<()> {
        self.core.set_active(active)
    }

    /// Whether the pool is active.
    pub fn is_active(&self) -> bool {
        self.core.is_active()
    }

    /// Enter or leave the flushing state of an active pool.
    ///
    /// While flushing, acquires fail with [`PoolError::Flushing`] and blocked
    /// acquirers are woken up. Ignored with a warning on an inactive pool.
    pub fn set_flushing(&self, flushing: bool) {
        self.core.set_flushing(flushing)
    }

    /// Whether acquires currently fail with [`PoolError::Flushing`].
    pub fn is_flushing(&self) -> bool {
        self.core.is_flushing()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.core.state()
    }

    /// Acquire an object, blocking while the pool is exhausted.
    pub fn acquire(&self) -> Result<Pooled<P>> {
        self.core.acquire(None)
    }

    /// Acquire an object with explicit parameters.
    ///
    /// With [`AcquireFlags::DONT_WAIT`] an exhausted pool reports
    /// [`PoolError::Eos`] instead of blocking.
    pub fn acquire_with(&self, params: &AcquireParams) -> Result<Pooled<P>> {
        self.core.acquire(Some(params))
    }

    /// Return `object` to this pool now.
    ///
    /// Does nothing if the handle was already released or belongs to another
    /// pool. Dropping the handle has the same effect.
    pub fn release(&self, object: &mut Pooled<P>) {
        match object.take_from(&self.core) {
            Some(inner) => self.core.release(inner),
            None => log_debug!(POOL, pool = self.core.id, "object not owned by this pool"),
        }
    }

    /// Snapshot of the pool counters.
    pub fn stats(&self) -> PoolStats {
        self.core.stats()
    }
}

impl<P: PoolImpl + Default> Default for MiniObjectPool<P> {
    fn default() -> Self {
        Self::new(P::default())
    }
}

impl<P: PoolImpl> Clone for MiniObjectPool<P> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<P: PoolImpl> fmt::Debug for MiniObjectPool<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiniObjectPool")
            .field("id", &self.core.id)
            .field("state", &self.state())
            .field("cur_objects", &self.core.cur_objects())
            .field("outstanding", &self.core.outstanding())
            .finish()
    }
}
