// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! pchar Device
//!
//! One device slot: its FIFO behind a spinlock plus its identity. The lock
//! is taken for exactly one FIFO operation at a time and never across two
//! calls, so sessions on the same device interleave per call and devices
//! never contend with each other.

use spin::Mutex;

use crate::err::{Error, Result};
use crate::kernel::lib::{FifoInfo, Kfifo, MemoryLimit};
use crate::kernel::usercopy::{UserSink, UserSource};
use crate::{log_error, log_info};

use super::registrar::DevNum;

/// A single pchar device
pub struct Device {
    /// Slot index
    id: usize,
    /// Device number from the registrar
    devno: DevNum,
    /// FIFO, guarded per operation
    fifo: Mutex<Kfifo>,
}

impl Device {
    /// Create slot `id` with a FIFO of `bufsize` bytes charged to `limit`
    pub(crate) fn new(id: usize, devno: DevNum, bufsize: usize, limit: &MemoryLimit) -> Result<Self> {
        limit.charge(bufsize)?;
        match Kfifo::alloc(bufsize) {
            Ok(fifo) => Ok(Self {
                id,
                devno,
                fifo: Mutex::new(fifo),
            }),
            Err(err) => {
                limit.release(bufsize);
                Err(err)
            }
        }
    }

    /// Free the FIFO storage back to `limit`
    pub(crate) fn release(self, limit: &MemoryLimit) {
        let size = self.fifo.into_inner().size();
        limit.release(size);
    }

    /// Slot index
    pub fn id(&self) -> usize {
        self.id
    }

    /// Device number
    pub fn devno(&self) -> DevNum {
        self.devno
    }

    /// Queue bytes from the caller
    pub fn write<S: UserSource + ?Sized>(&self, src: &S) -> Result<usize> {
        let ret = self.fifo.lock().from_user(src);
        if ret.is_err() {
            log_error!("pchar: kfifo_from_user() failed for pchar{}.", self.id);
        }
        ret
    }

    /// Move queued bytes to the caller
    pub fn read<D: UserSink + ?Sized>(&self, dst: &mut D) -> Result<usize> {
        let ret = self.fifo.lock().to_user(dst);
        if ret.is_err() {
            log_error!("pchar: kfifo_to_user() failed for pchar{}.", self.id);
        }
        ret
    }

    /// Discard all queued bytes
    pub fn clear(&self) {
        self.fifo.lock().reset();
    }

    /// Size, length and free space of the FIFO
    pub fn info(&self) -> FifoInfo {
        self.fifo.lock().info()
    }

    /// Reallocate the FIFO with `new_size` bytes
    ///
    /// Queued bytes are kept oldest-first up to `new_size`. The new storage
    /// is charged and allocated before the old one is released, so on
    /// failure the device keeps its previous FIFO and content.
    pub fn resize(&self, new_size: usize, limit: &MemoryLimit) -> Result {
        if new_size == 0 {
            log_error!("pchar: resize to 0 bytes rejected for pchar{}.", self.id);
            return Err(Error::InvalidArgument);
        }

        let mut fifo = self.fifo.lock();
        let old_size = fifo.size();

        if let Err(err) = limit.charge(new_size) {
            log_error!(
                "pchar: no budget to resize pchar{} from {} to {} bytes.",
                self.id,
                old_size,
                new_size
            );
            return Err(err);
        }

        match fifo.resize(new_size) {
            Ok(dropped) => {
                limit.release(old_size);
                log_info!(
                    "pchar: pchar{} resized {} -> {} bytes, {} bytes kept, {} dropped.",
                    self.id,
                    old_size,
                    new_size,
                    fifo.len(),
                    dropped
                );
                Ok(())
            }
            Err(err) => {
                limit.release(new_size);
                log_error!("pchar: kfifo resize failed for pchar{}.", self.id);
                Err(err)
            }
        }
    }
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("devno", &self.devno)
            .field("fifo", &self.info())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(bufsize: usize, limit: &MemoryLimit) -> Device {
        Device::new(0, DevNum::new(250, 0), bufsize, limit).unwrap()
    }

    #[test]
    fn test_device_charges_fifo() {
        let limit = MemoryLimit::new(64);
        let dev = device(32, &limit);
        assert_eq!(limit.in_use(), 32);
        assert_eq!(dev.info(), FifoInfo { size: 32, len: 0, avail: 32 });

        assert_eq!(
            Device::new(1, DevNum::new(250, 1), 40, &limit).unwrap_err(),
            Error::AllocationFailure
        );
        assert_eq!(limit.in_use(), 32);

        dev.release(&limit);
        assert_eq!(limit.in_use(), 0);
    }

    #[test]
    fn test_device_resize_updates_budget() {
        let limit = MemoryLimit::new(100);
        let dev = device(8, &limit);
        dev.write(&b"abc"[..]).unwrap();

        dev.resize(64, &limit).unwrap();
        assert_eq!(limit.in_use(), 64);
        assert_eq!(dev.info(), FifoInfo { size: 64, len: 3, avail: 61 });

        // 64 in use + 50 would exceed the budget
        assert_eq!(dev.resize(50, &limit), Err(Error::AllocationFailure));
        assert_eq!(dev.info().size, 64);
        assert_eq!(limit.in_use(), 64);

        let mut out = [0u8; 8];
        assert_eq!(dev.read(&mut out[..]).unwrap(), 3);
        assert_eq!(&out[..3], b"abc");

        dev.release(&limit);
        assert_eq!(limit.in_use(), 0);
    }

    #[test]
    fn test_device_resize_zero_rejected() {
        let limit = MemoryLimit::unlimited();
        let dev = device(8, &limit);
        assert_eq!(dev.resize(0, &limit), Err(Error::InvalidArgument));
        assert_eq!(dev.info().size, 8);
    }

    #[test]
    fn test_device_resize_allocation_failure() {
        let limit = MemoryLimit::unlimited();
        let dev = device(8, &limit);
        dev.write(&b"data"[..]).unwrap();

        assert_eq!(dev.resize(usize::MAX / 2, &limit), Err(Error::AllocationFailure));
        assert_eq!(dev.info(), FifoInfo { size: 8, len: 4, avail: 4 });
        assert_eq!(limit.in_use(), 8);
    }
}
