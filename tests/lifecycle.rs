//! End-to-end lifecycle scenarios for the generic pool.

use media_pool::{
    AcquireParams, MiniObjectPool, PoolConfig, PoolCore, PoolError, PoolImpl, PoolState, Result,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

const BLOCKED: Duration = Duration::from_millis(50);
const WAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Objects carry a serial number so tests can tell them apart.
#[derive(Debug, PartialEq, Eq)]
struct Frame {
    serial: u32,
}

#[derive(Default)]
struct Frames {
    next: AtomicU32,
}

impl PoolImpl for Frames {
    type Object = Frame;
    type Config = PoolConfig;

    fn alloc_object(&self, _pool: &PoolCore<Self>, _params: Option<&AcquireParams>) -> Result<Frame> {
        Ok(Frame {
            serial: self.next.fetch_add(1, Ordering::SeqCst),
        })
    }
}

/// A pool kind that widens every configuration it is given.
#[derive(Default)]
struct AtLeastFour;

impl PoolImpl for AtLeastFour {
    type Object = u8;
    type Config = PoolConfig;

    fn set_config(&self, pool: &PoolCore<Self>, config: &mut PoolConfig) -> Result<()> {
        if config.min_objects < 4 {
            let max = config.max_objects.max(4);
            config.set_params(4, max);
            return Err(PoolError::bad_config("need at least 4 objects"));
        }
        pool.parent_set_config(config)
    }

    fn alloc_object(&self, _pool: &PoolCore<Self>, _params: Option<&AcquireParams>) -> Result<u8> {
        Ok(0)
    }
}

fn active_pool(min: u32, max: u32) -> MiniObjectPool<Frames> {
    let pool = MiniObjectPool::default();
    pool.set_config(PoolConfig::new(min, max)).unwrap();
    pool.set_active(true).unwrap();
    pool
}

fn spawn_acquire(
    pool: &MiniObjectPool<Frames>,
    params: Option<AcquireParams>,
) -> mpsc::Receiver<Result<u32>> {
    let (tx, rx) = mpsc::channel();
    let pool = pool.clone();
    thread::spawn(move || {
        let result = match params {
            Some(params) => pool.acquire_with(&params),
            None => pool.acquire(),
        };
        let _ = tx.send(result.map(|frame| frame.serial));
    });
    rx
}

fn assert_balanced<P: PoolImpl>(pool: &MiniObjectPool<P>) {
    let stats = pool.stats();
    assert_eq!(stats.queued as u32 + stats.outstanding, stats.cur_objects, "{stats:?}");
}

#[test]
fn basic_recycle() {
    let pool = active_pool(2, 2);
    let stats = pool.stats();
    assert_eq!((stats.cur_objects, stats.queued), (2, 2));

    let first = pool.acquire().unwrap();
    let second = pool.acquire().unwrap();
    let stats = pool.stats();
    assert_eq!((stats.outstanding, stats.queued), (2, 0));

    let serial = first.serial;
    drop(first);
    let stats = pool.stats();
    assert_eq!((stats.outstanding, stats.queued), (1, 1));
    assert_balanced(&pool);

    let again = pool.acquire().unwrap();
    assert_eq!(again.serial, serial);
    assert_eq!(pool.stats().queued, 0);
    drop((again, second));
    assert_balanced(&pool);
}

#[test]
fn cap_and_block() {
    let pool = active_pool(0, 1);
    assert_eq!(pool.stats().cur_objects, 0);

    let held = pool.acquire().unwrap();
    let stats = pool.stats();
    assert_eq!((stats.cur_objects, stats.outstanding), (1, 1));

    let waiter = spawn_acquire(&pool, None);
    assert!(waiter.recv_timeout(BLOCKED).is_err());

    let serial = held.serial;
    drop(held);
    assert_eq!(waiter.recv_timeout(WAKE_TIMEOUT).unwrap(), Ok(serial));
    assert_eq!(pool.stats().cur_objects, 1);
}

#[test]
fn cap_and_non_block() {
    let pool = active_pool(0, 1);
    let _held = pool.acquire().unwrap();

    let waiter = spawn_acquire(&pool, Some(AcquireParams::dont_wait()));
    assert_eq!(waiter.recv_timeout(WAKE_TIMEOUT).unwrap(), Err(PoolError::Eos));
    assert_eq!(pool.stats().outstanding, 1);
}

#[test]
fn flush_cancels_waiters() {
    let pool = active_pool(0, 1);
    let held = pool.acquire().unwrap();

    let waiter = spawn_acquire(&pool, None);
    assert!(waiter.recv_timeout(BLOCKED).is_err());

    pool.set_flushing(true);
    assert_eq!(waiter.recv_timeout(WAKE_TIMEOUT).unwrap(), Err(PoolError::Flushing));

    pool.set_flushing(false);
    assert_eq!(pool.state(), PoolState::Active);
    drop(held);
    assert!(pool.acquire().is_ok());
}

#[test]
fn deferred_deactivate() {
    let pool = active_pool(1, 1);
    let held = pool.acquire().unwrap();

    pool.set_active(false).unwrap();
    assert_eq!(pool.state(), PoolState::Deactivating);
    assert_eq!(pool.stats().cur_objects, 1);

    drop(held);
    let stats = pool.stats();
    assert_eq!(stats.state, PoolState::Configured);
    assert_eq!((stats.cur_objects, stats.queued), (0, 0));
}

#[test]
fn acquire_fails_until_reactivated() {
    let pool = active_pool(1, 2);
    pool.set_active(false).unwrap();

    for _ in 0..3 {
        assert_eq!(pool.acquire().unwrap_err(), PoolError::Flushing);
    }

    pool.set_active(true).unwrap();
    assert!(pool.acquire().is_ok());
}

#[test]
fn flush_round_trip_keeps_object_set() {
    let pool = active_pool(3, 3);
    let before: HashSet<u32> = {
        let held: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
        let serials = held.iter().map(|frame| frame.serial).collect();
        serials
    };

    pool.set_flushing(true);
    pool.set_flushing(false);

    let held: Vec<_> = (0..3).map(|_| pool.acquire().unwrap()).collect();
    let after: HashSet<u32> = held.iter().map(|frame| frame.serial).collect();
    assert_eq!(before, after);
    assert_eq!(
        pool.acquire_with(&AcquireParams::dont_wait()).unwrap_err(),
        PoolError::Eos
    );
}

#[test]
fn preallocated_objects_then_blocks() {
    let pool = active_pool(2, 2);
    let _a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();

    let waiter = spawn_acquire(&pool, None);
    assert!(waiter.recv_timeout(BLOCKED).is_err());
    drop(b);
    assert!(waiter.recv_timeout(WAKE_TIMEOUT).unwrap().is_ok());
}

#[test]
fn transition_requires_config() {
    let pool: MiniObjectPool<Frames> = MiniObjectPool::default();
    assert_eq!(pool.set_active(true), Err(PoolError::NotConfigured));
    assert_eq!(pool.state(), PoolState::Unconfigured);
}

#[test]
fn discard_reduces_cur_objects_by_one() {
    let pool = active_pool(2, 4);
    let before = pool.stats().cur_objects;
    pool.acquire().unwrap().discard();
    assert_eq!(pool.stats().cur_objects, before - 1);
    assert_balanced(&pool);
}

#[test]
fn adjusted_config_can_be_read_back() {
    let pool = MiniObjectPool::new(AtLeastFour);
    let requested = PoolConfig::new(1, 2);

    let err = pool.set_config(requested.clone()).unwrap_err();
    assert!(matches!(err, PoolError::BadConfiguration { .. }));

    let proposed = pool.get_config();
    assert_ne!(proposed, requested);
    assert_eq!(proposed.params(), (4, 4));
    assert!(proposed.validate_params(1, 2));

    pool.set_config(proposed.clone()).unwrap();
    assert_eq!(pool.get_config(), proposed);
    pool.set_active(true).unwrap();
    assert_eq!(pool.stats().cur_objects, 4);
}

#[test]
fn pool_dropped_with_outstanding_objects() {
    let pool = active_pool(0, 0);
    let frames: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
    let owner = frames[0].pool().unwrap();
    drop(pool);

    assert!(owner.is_active());
    drop(frames);
    assert_eq!(owner.stats().queued, 4);
}
