//! Wait/flush gate.
//!
//! The gate is a token counter. Writers add tokens, readers take them back
//! without blocking, and sleepers block until at least one token is present.
//! The pool keeps the following tokens in it:
//!
//! - the *flush token*, present while the pool is flushing,
//! - the *wait token*, held by at most one thread sleeping for a free object,
//! - one token per object sitting in the recycle queue.
//!
//! A flushing pool therefore always has a token present and nobody can sleep
//! on it, and every release wakes the sleepers by writing the token that
//! pairs with its enqueue.
//!
//! The count is an atomic. The mutex and condvar are only touched by threads
//! that have to sleep and by writers that find a sleeper registered. A
//! sleeper registers under the mutex before its final check of the count,
//! and a writer that sees it takes the mutex before notifying, so a token
//! written between the check and the sleep is never missed.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Condvar, Mutex};

use crate::log_trace;
use crate::logging::GATE;

pub(crate) struct Gate {
    tokens: AtomicUsize,
    sleepers: AtomicUsize,
    lock: Mutex<()>,
    available: Condvar,
}

impl Gate {
    /// Create a gate holding `initial` tokens.
    pub(crate) fn new(initial: usize) -> Self {
        Self {
            tokens: AtomicUsize::new(initial),
            sleepers: AtomicUsize::new(0),
            lock: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    /// Add one token and wake the sleepers, if any.
    pub(crate) fn write_token(&self) {
        self.tokens.fetch_add(1, Ordering::SeqCst);
        if self.sleepers.load(Ordering::SeqCst) != 0 {
            let _guard = self.lock.lock();
            self.available.notify_all();
        }
    }

    /// Take one token if present. Returns `false` when it would block.
    pub(crate) fn read_token(&self) -> bool {
        self.tokens
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |tokens| tokens.checked_sub(1))
            .is_ok()
    }

    /// Take one token, sleeping until one is written.
    ///
    /// Used where a token is known to be on its way: the releaser that
    /// pushed an object we just popped, or the thread that borrowed the
    /// flush token and will put it back.
    pub(crate) fn consume_token(&self) {
        if self.read_token() {
            return;
        }

        let mut guard = self.lock.lock();
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        while !self.read_token() {
            self.available.wait(&mut guard);
        }
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    /// Sleep until at least one token is present. Does not take it.
    pub(crate) fn wait(&self) {
        if self.has_token() {
            return;
        }

        let mut guard = self.lock.lock();
        self.sleepers.fetch_add(1, Ordering::SeqCst);
        if !self.has_token() {
            log_trace!(GATE, "sleeping until a token is written");
        }
        while !self.has_token() {
            self.available.wait(&mut guard);
        }
        self.sleepers.fetch_sub(1, Ordering::SeqCst);
    }

    fn has_token(&self) -> bool {
        self.tokens.load(Ordering::SeqCst) != 0
    }

    #[cfg(test)]
    pub(crate) fn tokens(&self) -> usize {
        self.tokens.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn sleepers(&self) -> usize {
        self.sleepers.load(Ordering::SeqCst)
    }
}
