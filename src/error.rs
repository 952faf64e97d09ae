//! Error types and handling for pool operations.
//!
//! A single error enum covers every failure a pool can report, from the
//! benign flow results of [`acquire`](crate::MiniObjectPool::acquire)
//! (`Flushing`, `Eos`) to configuration rejections and allocation failures.

use thiserror::Error;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Error type for pool operations.
///
/// `Flushing` and `Eos` are flow results rather than failures: callers in a
/// pipeline are expected to propagate them like an end-of-stream. Use
/// [`PoolError::is_benign`] to tell them apart from real errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool is flushing or inactive.
    ///
    /// Returned by acquire while the pool is not active, or when a blocked
    /// acquire is woken up by `set_flushing(true)` / `set_active(false)`.
    #[error("Pool is flushing")]
    Flushing,

    /// A non-blocking acquire found no free object and no room to grow.
    #[error("Pool has no free objects")]
    Eos,

    /// The operation is not applicable to this pool or pool state.
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// The pool needs a configuration before it can be activated.
    #[error("Pool is not configured")]
    NotConfigured,

    /// The configuration cannot change while the pool is active.
    #[error("Can't change configuration, pool is active")]
    Active,

    /// The configuration cannot change while objects are handed out.
    #[error("Can't change configuration, {count} objects outstanding")]
    OutstandingObjects {
        /// Number of objects still held by consumers
        count: u32,
    },

    /// The configuration was refused.
    ///
    /// The refused configuration is still stored in the pool so the caller
    /// can read back the nearest accepted form with `get_config`.
    #[error("Invalid configuration: {reason}")]
    BadConfiguration {
        /// Why the configuration was refused
        reason: String,
    },

    /// The pool implementation failed to fabricate an object.
    #[error("Object allocation failed: {reason}")]
    AllocationFailure {
        /// Failure reported by the allocator
        reason: String,
    },

    /// Draining the pool left objects allocated.
    #[error("Pool stop failed, {remaining} objects still allocated")]
    StopFailed {
        /// Objects still accounted as allocated after the drain
        remaining: u32,
    },
}

impl PoolError {
    /// Shorthand for a [`PoolError::BadConfiguration`].
    pub fn bad_config(reason: impl Into<String>) -> Self {
        Self::BadConfiguration {
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PoolError::AllocationFailure`].
    pub fn allocation(reason: impl Into<String>) -> Self {
        Self::AllocationFailure {
            reason: reason.into(),
        }
    }

    /// Whether this is a flow result (`Flushing` or `Eos`) rather than a failure.
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::Flushing | Self::Eos)
    }
}

static_assertions::assert_impl_all!(PoolError: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    mod error_messages {
        use super::*;

        #[test]
        fn flushing() {
            assert_eq!(PoolError::Flushing.to_string(), "Pool is flushing");
        }

        #[test]
        fn eos() {
            assert_eq!(PoolError::Eos.to_string(), "Pool has no free objects");
        }

        #[test]
        fn outstanding_objects() {
            let error = PoolError::OutstandingObjects { count: 3 };
            assert_eq!(
                error.to_string(),
                "Can't change configuration, 3 objects outstanding"
            );
        }

        #[test]
        fn bad_configuration() {
            let error = PoolError::bad_config("min_objects 4 > max_objects 2");
            assert_eq!(
                error.to_string(),
                "Invalid configuration: min_objects 4 > max_objects 2"
            );
        }

        #[test]
        fn stop_failed() {
            let error = PoolError::StopFailed { remaining: 2 };
            assert_eq!(
                error.to_string(),
                "Pool stop failed, 2 objects still allocated"
            );
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn flow_results_are_benign() {
            assert!(PoolError::Flushing.is_benign());
            assert!(PoolError::Eos.is_benign());
        }

        #[test]
        fn failures_are_not_benign() {
            assert!(!PoolError::NotConfigured.is_benign());
            assert!(!PoolError::allocation("out of memory").is_benign());
            assert!(!PoolError::NotSupported("no alloc hook").is_benign());
        }
    }

    #[test]
    fn implements_error_trait() {
        let error = PoolError::Active;
        let _: &dyn std::error::Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn debug_formatting() {
        let debug_str = format!("{:?}", PoolError::OutstandingObjects { count: 7 });
        assert!(debug_str.contains("OutstandingObjects"));
        assert!(debug_str.contains("count: 7"));
    }
}
