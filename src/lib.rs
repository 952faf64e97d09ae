//! # media-pool: recyclable object pools for media pipelines
//!
//! Elements that produce media objects at high rates take them from a pool
//! instead of allocating, and the objects return to the pool when the last
//! handle is dropped. A pool bounds memory use, blocks producers when it is
//! exhausted, lets a flush cancel blocked producers, and tears down
//! correctly while producers and consumers are still running.
//!
//! ## Key Features
//!
//! - **Generic pool**: [`MiniObjectPool`] recycles any object type produced
//!   by a [`PoolImpl`]; every step of the object life cycle is a hook.
//! - **Buffer pool**: [`BufferPool`] recycles [`Buffer`]s of a configured
//!   size, resets them on return and discards the ones consumers damaged.
//! - **Lock-free hot path**: acquire and release only touch atomics and a
//!   lock-free queue until a thread has to sleep for a free object.
//!   Lifecycle changes are serialized by one lock.
//! - **Flushing**: [`MiniObjectPool::set_flushing`] and deactivation wake
//!   every blocked acquirer.
//! - **Configuration negotiation**: a pool may adjust the configuration it
//!   is given; the adjusted form can be read back and checked with
//!   [`BufferPoolConfig::validate_params`].
//!
//! ## Quick Start
//!
//! ```rust
//! use media_pool::{BufferPool, BufferPoolConfig, AcquireParams, PoolError};
//!
//! let pool = BufferPool::default();
//! pool.set_config(BufferPoolConfig::new(None, 4096, 2, 2))?;
//! pool.set_active(true)?;
//!
//! let first = pool.acquire()?;
//! let second = pool.acquire()?;
//!
//! // Exhausted: a non-blocking acquire reports end-of-stream.
//! let third = pool.acquire_with(&AcquireParams::dont_wait());
//! assert_eq!(third.unwrap_err(), PoolError::Eos);
//!
//! drop(first);
//! let _again = pool.acquire()?;
//!
//! drop(second);
//! pool.set_active(false)?;
//! # Ok::<(), PoolError>(())
//! ```
//!
//! ## Logging
//!
//! Pools report through [`tracing`](https://docs.rs/tracing). Discarded
//! buffers are logged on the `performance` target. With the default
//! `subscriber` feature, [`logging::init_from_env`] installs a formatter
//! filtered by `RUST_LOG`.

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod buffer; // Buffers, memory blocks and metadata
pub mod buffer_pool;
pub mod caps;
pub mod config;
pub mod error;
pub mod logging;
pub mod pool; // Generic pool machinery

pub use buffer::{AllocationParams, Allocator, Buffer, BufferFlags, Memory, Meta, SystemAllocator};
pub use buffer_pool::{BufferPool, BufferPoolConfig, BufferPoolImpl, PooledBuffer};
pub use caps::{Caps, CapsValue};
pub use config::{PoolConfig, PoolConfiguration};
pub use error::{PoolError, Result};
pub use logging::LogLevel;
pub use pool::{
    AcquireFlags, AcquireParams, MiniObjectPool, PoolCore, PoolImpl, PoolState, PoolStats, Pooled,
};

#[doc(hidden)]
pub use tracing;
