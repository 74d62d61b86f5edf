// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Kernel FIFO
//!
//! This module provides a fixed-capacity circular byte buffer.
//!
//! # Semantics
//!
//! - Writes accept `min(len, avail)` bytes; the excess is dropped, never
//!   overwriting queued data. A full FIFO accepts 0 bytes without error.
//! - Reads return `min(len, max)` bytes from the front and never wait.
//! - User copies commit only after the whole copy succeeded, so a fault
//!   leaves the FIFO exactly as it was.
//!
//! The FIFO itself is not synchronized; callers hold it behind a lock.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::err::{Error, Result};
use crate::kernel::usercopy::{UserSink, UserSource};
use crate::log_error;

/// FIFO occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FifoInfo {
    /// Total capacity in bytes
    pub size: usize,
    /// Bytes currently queued
    pub len: usize,
    /// Bytes that can still be written
    pub avail: usize,
}

/// Fixed-capacity circular byte buffer
pub struct Kfifo {
    /// Backing storage, `buf.len()` is the capacity
    buf: Box<[u8]>,
    /// Index of the oldest queued byte
    head: usize,
    /// Number of queued bytes
    len: usize,
}

/// Allocate zeroed storage of exactly `size` bytes without aborting on OOM
fn alloc_storage(size: usize) -> Result<Box<[u8]>> {
    if size == 0 {
        return Err(Error::InvalidArgument);
    }

    let mut storage: Vec<u8> = Vec::new();
    if storage.try_reserve_exact(size).is_err() {
        log_error!("kfifo: failed to reserve {} bytes", size);
        return Err(Error::AllocationFailure);
    }
    storage.resize(size, 0);
    Ok(storage.into_boxed_slice())
}

impl Kfifo {
    /// Allocate a FIFO of `size` bytes
    ///
    /// A zero size is rejected with `InvalidArgument`.
    pub fn alloc(size: usize) -> Result<Self> {
        Ok(Self {
            buf: alloc_storage(size)?,
            head: 0,
            len: 0,
        })
    }

    /// Capacity in bytes
    pub fn size(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently queued
    pub fn len(&self) -> usize {
        self.len
    }

    /// Bytes that can still be written
    pub fn avail(&self) -> usize {
        self.size() - self.len
    }

    /// Check if the FIFO is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the FIFO is full
    pub fn is_full(&self) -> bool {
        self.len == self.size()
    }

    /// Occupancy snapshot
    pub fn info(&self) -> FifoInfo {
        FifoInfo {
            size: self.size(),
            len: self.len,
            avail: self.avail(),
        }
    }

    /// Discard all queued bytes, keeping the capacity
    pub fn reset(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Index of the first free byte
    #[inline]
    fn tail(&self) -> usize {
        (self.head + self.len) % self.size()
    }

    /// The free region as up to two `(start, len)` runs, limited to `count`
    fn free_runs(&self, count: usize) -> [(usize, usize); 2] {
        let tail = self.tail();
        let first = count.min(self.size() - tail);
        [(tail, first), (0, count - first)]
    }

    /// The queued region as up to two `(start, len)` runs, limited to `count`
    fn data_runs(&self, count: usize) -> [(usize, usize); 2] {
        let first = count.min(self.size() - self.head);
        [(self.head, first), (0, count - first)]
    }

    #[inline]
    fn commit_in(&mut self, count: usize) {
        self.len += count;
    }

    #[inline]
    fn commit_out(&mut self, count: usize) {
        self.head = (self.head + count) % self.size();
        self.len -= count;
        if self.len == 0 {
            self.head = 0;
        }
    }

    /// Queue bytes from driver memory
    ///
    /// Returns the number of bytes accepted.
    pub fn put(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.avail());
        let mut copied = 0;
        for (start, run) in self.free_runs(count) {
            self.buf[start..start + run].copy_from_slice(&data[copied..copied + run]);
            copied += run;
        }
        self.commit_in(count);
        count
    }

    /// Dequeue bytes into driver memory
    ///
    /// Returns the number of bytes removed.
    pub fn get(&mut self, out: &mut [u8]) -> usize {
        let count = out.len().min(self.len);
        let mut copied = 0;
        for (start, run) in self.data_runs(count) {
            out[copied..copied + run].copy_from_slice(&self.buf[start..start + run]);
            copied += run;
        }
        self.commit_out(count);
        count
    }

    /// Queue bytes copied from a caller buffer
    ///
    /// Accepts `min(src.len(), avail)` bytes. On a transfer fault nothing is
    /// queued.
    pub fn from_user<S: UserSource + ?Sized>(&mut self, src: &S) -> Result<usize> {
        let count = src.len().min(self.avail());
        let mut copied = 0;
        for (start, run) in self.free_runs(count) {
            src.copy_in(copied, &mut self.buf[start..start + run])?;
            copied += run;
        }
        self.commit_in(count);
        Ok(count)
    }

    /// Dequeue bytes into a caller buffer
    ///
    /// Moves `min(len, dst.len())` bytes. On a transfer fault nothing is
    /// removed.
    pub fn to_user<D: UserSink + ?Sized>(&mut self, dst: &mut D) -> Result<usize> {
        let count = dst.len().min(self.len);
        let mut copied = 0;
        for (start, run) in self.data_runs(count) {
            dst.copy_out(copied, &self.buf[start..start + run])?;
            copied += run;
        }
        self.commit_out(count);
        Ok(count)
    }

    /// Replace the storage with one of `new_size` bytes
    ///
    /// Queued bytes move oldest-first into the new storage; bytes past
    /// `new_size` (the newest) are dropped. The new storage is allocated
    /// before anything is moved, so on failure the FIFO is unchanged.
    ///
    /// Returns the number of bytes dropped.
    pub fn resize(&mut self, new_size: usize) -> Result<usize> {
        let mut storage = alloc_storage(new_size)?;

        let kept = self.len.min(new_size);
        let dropped = self.len - kept;
        let mut copied = 0;
        for (start, run) in self.data_runs(kept) {
            storage[copied..copied + run].copy_from_slice(&self.buf[start..start + run]);
            copied += run;
        }

        self.buf = storage;
        self.head = 0;
        self.len = kept;
        Ok(dropped)
    }
}

impl core::fmt::Debug for Kfifo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kfifo")
            .field("size", &self.size())
            .field("len", &self.len)
            .field("head", &self.head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::usercopy::FaultingBuffer;

    fn drain(fifo: &mut Kfifo) -> Vec<u8> {
        let mut out = alloc::vec![0u8; fifo.len()];
        let n = fifo.get(&mut out);
        out.truncate(n);
        out
    }

    #[test]
    fn test_kfifo_alloc() {
        let fifo = Kfifo::alloc(32).unwrap();
        assert_eq!(fifo.size(), 32);
        assert!(fifo.is_empty());
        assert_eq!(fifo.avail(), 32);

        // Sizes are exact, not rounded
        assert_eq!(Kfifo::alloc(5).unwrap().size(), 5);

        assert_eq!(Kfifo::alloc(0).unwrap_err(), Error::InvalidArgument);
        assert_eq!(Kfifo::alloc(usize::MAX).unwrap_err(), Error::AllocationFailure);
    }

    #[test]
    fn test_kfifo_write_read() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        assert_eq!(fifo.from_user(&b"HELLO"[..]).unwrap(), 5);
        assert_eq!(fifo.info(), FifoInfo { size: 8, len: 5, avail: 3 });

        let mut buf = [0u8; 10];
        assert_eq!(fifo.to_user(&mut buf[..]).unwrap(), 5);
        assert_eq!(&buf[..5], b"HELLO");
        assert_eq!(fifo.info(), FifoInfo { size: 8, len: 0, avail: 8 });
    }

    #[test]
    fn test_kfifo_truncating_write() {
        let mut fifo = Kfifo::alloc(4).unwrap();
        assert_eq!(fifo.from_user(&b"ABCDE"[..]).unwrap(), 4);
        assert_eq!(fifo.avail(), 0);
        assert!(fifo.is_full());

        // Full is not an error
        assert_eq!(fifo.from_user(&b"F"[..]).unwrap(), 0);
        assert_eq!(drain(&mut fifo), b"ABCD");
    }

    #[test]
    fn test_kfifo_empty_read() {
        let mut fifo = Kfifo::alloc(4).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(fifo.to_user(&mut buf[..]).unwrap(), 0);
        assert_eq!(fifo.get(&mut buf), 0);
    }

    #[test]
    fn test_kfifo_partial_read() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        fifo.put(b"abcdef");
        let mut buf = [0u8; 2];
        assert_eq!(fifo.get(&mut buf), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(fifo.len(), 4);
        assert_eq!(drain(&mut fifo), b"cdef");
    }

    #[test]
    fn test_kfifo_wraparound() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        assert_eq!(fifo.put(b"123456"), 6);

        let mut buf = [0u8; 4];
        assert_eq!(fifo.get(&mut buf), 4);

        // Tail wraps past the end of storage
        assert_eq!(fifo.from_user(&b"ABCDEF"[..]).unwrap(), 6);
        assert!(fifo.is_full());

        let mut out = [0u8; 8];
        assert_eq!(fifo.to_user(&mut out[..]).unwrap(), 8);
        assert_eq!(&out, b"56ABCDEF");
    }

    #[test]
    fn test_kfifo_invariant() {
        let mut fifo = Kfifo::alloc(7).unwrap();
        let mut scratch = [0u8; 3];
        for round in 0..50 {
            if round % 3 == 0 {
                fifo.get(&mut scratch);
            } else {
                fifo.put(b"xy");
            }
            let info = fifo.info();
            assert_eq!(info.len + info.avail, info.size);
            assert!(info.len <= info.size);
        }
    }

    #[test]
    fn test_kfifo_reset() {
        let mut fifo = Kfifo::alloc(16).unwrap();
        fifo.put(b"Hello World");
        fifo.reset();
        assert!(fifo.is_empty());
        assert_eq!(fifo.info(), FifoInfo { size: 16, len: 0, avail: 16 });

        fifo.reset();
        assert_eq!(fifo.avail(), 16);
    }

    #[test]
    fn test_kfifo_from_user_fault_queues_nothing() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        fifo.put(b"ok");

        let src = FaultingBuffer::new(b"abcdef".to_vec(), 4);
        assert_eq!(fifo.from_user(&src), Err(Error::TransferFault));
        assert_eq!(fifo.len(), 2);
        assert_eq!(drain(&mut fifo), b"ok");
    }

    #[test]
    fn test_kfifo_to_user_fault_removes_nothing() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        fifo.put(b"abcdef");

        let mut dst = FaultingBuffer::zeroed(8, 3);
        assert_eq!(fifo.to_user(&mut dst), Err(Error::TransferFault));
        assert_eq!(fifo.len(), 6);
        assert_eq!(drain(&mut fifo), b"abcdef");
    }

    #[test]
    fn test_kfifo_resize_grow_preserves() {
        let mut fifo = Kfifo::alloc(4).unwrap();
        fifo.put(b"wxyz");
        let mut one = [0u8; 1];
        fifo.get(&mut one);
        fifo.put(b"!");

        assert_eq!(fifo.resize(16).unwrap(), 0);
        assert_eq!(fifo.info(), FifoInfo { size: 16, len: 4, avail: 12 });
        assert_eq!(drain(&mut fifo), b"xyz!");
    }

    #[test]
    fn test_kfifo_resize_shrink_keeps_oldest() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        fifo.put(b"ABCDEFG");
        assert_eq!(fifo.resize(3).unwrap(), 4);
        assert_eq!(fifo.info(), FifoInfo { size: 3, len: 3, avail: 0 });
        assert_eq!(drain(&mut fifo), b"ABC");
    }

    #[test]
    fn test_kfifo_resize_failure_keeps_fifo() {
        let mut fifo = Kfifo::alloc(8).unwrap();
        fifo.put(b"keep");

        assert_eq!(fifo.resize(0), Err(Error::InvalidArgument));
        assert_eq!(fifo.resize(usize::MAX), Err(Error::AllocationFailure));
        assert_eq!(fifo.info(), FifoInfo { size: 8, len: 4, avail: 4 });
        assert_eq!(drain(&mut fifo), b"keep");
    }
}
