//! Property-based tests for pool accounting using proptest.

use media_pool::{
    AcquireParams, MiniObjectPool, PoolConfig, PoolCore, PoolError, PoolImpl, Pooled, Result,
};
use proptest::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
struct Serials {
    next: AtomicU64,
}

impl PoolImpl for Serials {
    type Object = u64;
    type Config = PoolConfig;

    fn alloc_object(&self, _pool: &PoolCore<Self>, _params: Option<&AcquireParams>) -> Result<u64> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Release(usize),
    Discard(usize),
    Detach(usize),
    ToggleFlush,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Acquire),
        3 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::Discard),
        1 => any::<usize>().prop_map(Op::Detach),
        1 => Just(Op::ToggleFlush),
    ]
}

fn take(held: &mut Vec<Pooled<Serials>>, index: usize) -> Option<Pooled<Serials>> {
    if held.is_empty() {
        None
    } else {
        let index = index % held.len();
        Some(held.swap_remove(index))
    }
}

/// Any single-threaded sequence of operations keeps the books balanced:
/// every allocated object is either queued or outstanding, and the bound
/// is never exceeded.
#[test]
fn test_accounting_invariants() {
    proptest!(|(
        max in 1u32..=8,
        min_seed in 0u32..=8,
        ops in prop::collection::vec(op_strategy(), 1..80)
    )| {
        let min = min_seed % (max + 1);
        let pool = MiniObjectPool::new(Serials::default());
        pool.set_config(PoolConfig::new(min, max)).unwrap();
        pool.set_active(true).unwrap();
        prop_assert_eq!(pool.stats().cur_objects, min);

        let mut held: Vec<Pooled<Serials>> = Vec::new();
        let mut flushing = false;
        let mut discarded = 0u64;

        for op in ops {
            match op {
                Op::Acquire => {
                    let stats = pool.stats();
                    let result = pool.acquire_with(&AcquireParams::dont_wait());
                    if flushing {
                        prop_assert_eq!(result.unwrap_err(), PoolError::Flushing);
                    } else if stats.queued == 0 && stats.cur_objects >= max {
                        prop_assert_eq!(result.unwrap_err(), PoolError::Eos);
                    } else {
                        held.push(result.unwrap());
                    }
                }
                Op::Release(index) => {
                    if let Some(object) = take(&mut held, index) {
                        let queued = pool.stats().queued;
                        object.release();
                        prop_assert_eq!(pool.stats().queued, queued + 1);
                    }
                }
                Op::Discard(index) => {
                    if let Some(object) = take(&mut held, index) {
                        let cur = pool.stats().cur_objects;
                        object.discard();
                        discarded += 1;
                        prop_assert_eq!(pool.stats().cur_objects, cur - 1);
                    }
                }
                Op::Detach(index) => {
                    if let Some(object) = take(&mut held, index) {
                        let cur = pool.stats().cur_objects;
                        prop_assert!(object.detach().is_some());
                        prop_assert_eq!(pool.stats().cur_objects, cur - 1);
                    }
                }
                Op::ToggleFlush => {
                    flushing = !flushing;
                    pool.set_flushing(flushing);
                    prop_assert_eq!(pool.is_flushing(), flushing);
                }
            }

            let stats = pool.stats();
            prop_assert_eq!(stats.outstanding as usize, held.len());
            prop_assert_eq!(stats.queued as u32 + stats.outstanding, stats.cur_objects);
            prop_assert!(stats.cur_objects <= max);
            prop_assert_eq!(stats.discarded, discarded);
        }

        drop(held);
        pool.set_active(false).unwrap();
        let stats = pool.stats();
        prop_assert_eq!((stats.cur_objects, stats.outstanding, stats.queued), (0, 0, 0));
    });
}

/// Objects are recycled rather than reallocated while the pool has room
/// for everything that is held.
#[test]
fn test_recycling_never_overallocates() {
    proptest!(|(
        max in 1u32..=6,
        rounds in prop::collection::vec(1usize..=6, 1..20)
    )| {
        let pool = MiniObjectPool::new(Serials::default());
        pool.set_config(PoolConfig::new(0, max)).unwrap();
        pool.set_active(true).unwrap();

        let mut peak = 0u64;
        for want in rounds {
            let want = want.min(max as usize);
            let held: Vec<_> = (0..want).map(|_| pool.acquire().unwrap()).collect();
            peak = peak.max(held.len() as u64);
            prop_assert_eq!(pool.stats().total_allocations, peak);
        }
    });
}

/// Adding the same option any number of times stores it once.
#[test]
fn test_add_option_is_idempotent() {
    proptest!(|(
        names in prop::collection::vec(prop::sample::select(vec!["meta", "align", "crop", "gl"]), 0..30)
    )| {
        let mut config = PoolConfig::new(0, 0);
        for name in &names {
            config.add_option(name);
        }

        let mut distinct = names.clone();
        distinct.sort_unstable();
        distinct.dedup();
        prop_assert_eq!(config.n_options(), distinct.len());
        for name in &distinct {
            prop_assert!(config.has_option(name));
        }
    });
}
