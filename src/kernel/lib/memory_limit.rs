// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Memory Limit
//!
//! Byte accounting for driver allocations. Every allocation the driver
//! makes (the device array, each FIFO, each resize) is charged here first
//! and released when the storage is freed, so a configured limit turns into
//! a clean allocation failure and `in_use()` doubles as a leak counter.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::err::{Error, Result};
use crate::log_debug;

/// Byte budget shared by all allocations of one driver instance
#[derive(Debug)]
pub struct MemoryLimit {
    /// Maximum bytes that may be charged (`usize::MAX` when unlimited)
    limit: usize,

    /// Bytes currently charged
    in_use: AtomicUsize,
}

impl MemoryLimit {
    /// Create a budget of `limit` bytes
    pub const fn new(limit: usize) -> Self {
        Self {
            limit,
            in_use: AtomicUsize::new(0),
        }
    }

    /// Create a budget that never refuses a charge
    pub const fn unlimited() -> Self {
        Self::new(usize::MAX)
    }

    /// Create a budget from an optional limit
    pub const fn from_option(limit: Option<usize>) -> Self {
        match limit {
            Some(limit) => Self::new(limit),
            None => Self::unlimited(),
        }
    }

    /// Charge `bytes` against the budget
    ///
    /// Fails with `AllocationFailure` and charges nothing if the budget
    /// would be exceeded.
    pub fn charge(&self, bytes: usize) -> Result {
        let mut current = self.in_use.load(Ordering::Relaxed);
        loop {
            let next = match current.checked_add(bytes) {
                Some(next) if next <= self.limit => next,
                _ => {
                    log_debug!(
                        "memory_limit: refusing {} bytes ({} of {} in use)",
                        bytes,
                        current,
                        self.limit
                    );
                    return Err(Error::AllocationFailure);
                }
            };
            match self.in_use.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Return `bytes` to the budget
    pub fn release(&self, bytes: usize) {
        let prev = self.in_use.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "memory_limit: released more than charged");
    }

    /// Bytes currently charged
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    /// Bytes still available
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.in_use())
    }

    /// Configured limit (`None` when unlimited)
    pub fn limit(&self) -> Option<usize> {
        if self.limit == usize::MAX {
            None
        } else {
            Some(self.limit)
        }
    }
}

impl Default for MemoryLimit {
    fn default() -> Self {
        Self::unlimited()
    }
}
