//! Pool statistics and monitoring.

use super::PoolState;

/// Statistics about pool usage.
///
/// A snapshot taken at one point in time. The counters are read one by one
/// without stopping the pool, so under concurrent use they may not add up
/// exactly.
///
/// # Examples
///
/// ```rust
/// # use media_pool::{PoolStats, PoolState};
/// let stats = PoolStats {
///     state: PoolState::Active,
///     min_objects: 2,
///     max_objects: 10,
///     cur_objects: 8,
///     outstanding: 7,
///     queued: 1,
///     total_allocations: 8,
///     discarded: 0,
/// };
/// assert_eq!(stats.utilization_percent(), 70.0);
/// assert!(!stats.is_exhausted());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Lifecycle state
    pub state: PoolState,
    /// Objects preallocated on activation
    pub min_objects: u32,
    /// Upper bound on allocated objects (0 = unlimited)
    pub max_objects: u32,
    /// Objects currently allocated, idle or outstanding
    pub cur_objects: u32,
    /// Objects handed out and not yet returned
    pub outstanding: u32,
    /// Idle objects waiting in the queue
    pub queued: usize,
    /// Objects fabricated since the pool was created
    pub total_allocations: u64,
    /// Returned objects the pool refused and destroyed
    pub discarded: u64,
}

impl PoolStats {
    /// Outstanding objects as a percentage of `max_objects`.
    ///
    /// Unlimited pools report against the objects allocated so far, and
    /// 0.0 if none are.
    pub fn utilization_percent(&self) -> f64 {
        let capacity = if self.max_objects == 0 {
            self.cur_objects
        } else {
            self.max_objects
        };
        if capacity == 0 {
            0.0
        } else {
            (self.outstanding as f64 / capacity as f64) * 100.0
        }
    }

    /// Whether the next blocking acquire would have to wait.
    pub fn is_exhausted(&self) -> bool {
        self.max_objects != 0 && self.cur_objects >= self.max_objects && self.queued == 0
    }

    /// Check if the pool has refused returned objects.
    ///
    /// A steadily growing discard count usually means consumers keep
    /// changing the objects in ways the pool cannot undo.
    pub fn has_discards(&self) -> bool {
        self.discarded > 0
    }
}
