// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! User/Driver Boundary
//!
//! Caller buffers are never touched directly by the FIFO code. Data is
//! moved through [`UserSource`] (caller -> driver) and [`UserSink`]
//! (driver -> caller), either of which may fault. A fault is reported as
//! [`Error::TransferFault`] and the caller of the copy is expected to leave
//! its own state untouched.
//!
//! Plain byte slices and vectors implement both traits and never fault.
//! Other buffer types (mapped memory, sockets, test doubles) implement them
//! to model a boundary that can fail mid-copy.

use alloc::vec::Vec;

use crate::err::{Error, Result};
use crate::log_error;

/// ============================================================================
/// Boundary Traits
/// ============================================================================

/// Caller-owned memory the driver copies from
pub trait UserSource {
    /// Number of bytes the caller offers
    fn len(&self) -> usize;

    /// True if the caller offers no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `dst.len()` bytes starting at `offset` into `dst`
    fn copy_in(&self, offset: usize, dst: &mut [u8]) -> Result;
}

/// Caller-owned memory the driver copies into
pub trait UserSink {
    /// Number of bytes the caller can accept
    fn len(&self) -> usize;

    /// True if the caller can accept no bytes
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy `src` into the caller buffer starting at `offset`
    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result;
}

/// Check that `[offset, offset + len)` lies inside a buffer of `size` bytes
fn check_range(offset: usize, len: usize, size: usize) -> Result {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => {
            log_error!(
                "usercopy: range {:#x}+{:#x} outside buffer of {:#x} bytes",
                offset,
                len,
                size
            );
            Err(Error::TransferFault)
        }
    }
}

/// ============================================================================
/// Slice Implementations
/// ============================================================================

impl UserSource for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_in(&self, offset: usize, dst: &mut [u8]) -> Result {
        check_range(offset, dst.len(), <[u8]>::len(self))?;
        dst.copy_from_slice(&self[offset..offset + dst.len()]);
        Ok(())
    }
}

impl UserSink for [u8] {
    fn len(&self) -> usize {
        <[u8]>::len(self)
    }

    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result {
        check_range(offset, src.len(), <[u8]>::len(self))?;
        self[offset..offset + src.len()].copy_from_slice(src);
        Ok(())
    }
}

impl UserSource for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn copy_in(&self, offset: usize, dst: &mut [u8]) -> Result {
        self.as_slice().copy_in(offset, dst)
    }
}

impl UserSink for Vec<u8> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result {
        self.as_mut_slice().copy_out(offset, src)
    }
}

impl<const N: usize> UserSource for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_in(&self, offset: usize, dst: &mut [u8]) -> Result {
        self.as_slice().copy_in(offset, dst)
    }
}

impl<const N: usize> UserSink for [u8; N] {
    fn len(&self) -> usize {
        N
    }

    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result {
        self.as_mut_slice().copy_out(offset, src)
    }
}

/// ============================================================================
/// Fault Injection
/// ============================================================================

/// A caller buffer that faults once a copy reaches a given offset
///
/// Bytes before `fault_at` copy normally; any copy touching `fault_at` or
/// beyond fails with `TransferFault`. Used to exercise fault paths.
#[derive(Debug, Clone)]
pub struct FaultingBuffer {
    data: Vec<u8>,
    fault_at: usize,
}

impl FaultingBuffer {
    /// Wrap `data`, faulting at byte `fault_at`
    pub fn new(data: Vec<u8>, fault_at: usize) -> Self {
        Self { data, fault_at }
    }

    /// A buffer of `len` zero bytes faulting at `fault_at`
    pub fn zeroed(len: usize, fault_at: usize) -> Self {
        Self::new(alloc::vec![0u8; len], fault_at)
    }

    /// The underlying bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn check_fault(&self, offset: usize, len: usize) -> Result {
        if len > 0 && offset.saturating_add(len) > self.fault_at {
            log_error!(
                "usercopy: fault at offset {:#x} (copy {:#x}+{:#x})",
                self.fault_at,
                offset,
                len
            );
            return Err(Error::TransferFault);
        }
        Ok(())
    }
}

impl UserSource for FaultingBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_in(&self, offset: usize, dst: &mut [u8]) -> Result {
        self.check_fault(offset, dst.len())?;
        self.data.copy_in(offset, dst)
    }
}

impl UserSink for FaultingBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn copy_out(&mut self, offset: usize, src: &[u8]) -> Result {
        self.check_fault(offset, src.len())?;
        self.data.copy_out(offset, src)
    }
}
