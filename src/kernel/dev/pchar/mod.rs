// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Multi-Device Pseudo Character Driver
//!
//! `pchar` exposes `devcnt` independent devices, each a byte FIFO of
//! `bufsize` bytes:
//!
//! - `write` queues as many bytes as fit and reports how many
//! - `read` drains up to the requested amount and never waits
//! - `ioctl` clears, reports size/len/avail, or resizes one device
//!
//! # Design
//!
//! - **Per-device locking**: each FIFO has its own spinlock, held for one
//!   FIFO operation; devices never share a lock
//! - **Borrowed sessions**: an open [`File`] borrows its device, so the
//!   driver cannot stop under an open file
//! - **Staged bring-up**: registration runs in six stages and unwinds in
//!   reverse on failure (see [`init`])
//!
//! # Usage
//!
//! ```rust
//! use pchar::kernel::cmdline::Config;
//! use pchar::kernel::dev::pchar::{DevInfo, IoctlReply, MemRegistrar, OpenFlags, Pchar, FIFO_GETINFO};
//!
//! let registrar = MemRegistrar::new();
//! let driver = Pchar::start(&Config::default(), &registrar).unwrap();
//! let file = driver.open(driver.devno(0).unwrap(), OpenFlags::RDWR).unwrap();
//!
//! file.write(&b"abc"[..]).unwrap();
//! assert_eq!(
//!     file.ioctl(FIFO_GETINFO, 0).unwrap(),
//!     IoctlReply::Info(DevInfo { size: 32, len: 3, avail: 29 })
//! );
//! ```

pub mod device;
pub mod file;
pub mod init;
pub mod ioctl;
pub mod registrar;

pub use device::Device;
pub use file::{File, OpenFlags};
pub use init::{InitStage, PCHAR_CLASS_NAME, PCHAR_REGION_NAME};
pub use ioctl::{Command, DevInfo, IoctlReply, FIFO_CLEAR, FIFO_GETINFO, FIFO_RESIZE};
pub use registrar::{DevNum, Faults, MemRegistrar, Registrar, RegistrarError, RegistrarOp};

use alloc::vec::Vec;

use crate::err::{Error, Result};
use crate::kernel::cmdline::Config;
use crate::kernel::debug::log_set_min_level;
use crate::kernel::lib::MemoryLimit;
use crate::{log_error, log_info};

use init::StageStack;

/// A running pchar driver instance
pub struct Pchar<R: Registrar> {
    registrar: R,
    stages: StageStack,
    devices: Vec<Device>,
    limit: MemoryLimit,
    first: DevNum,
}

impl<R: Registrar> Pchar<R> {
    /// Bring the driver up
    ///
    /// Either every stage completes, or everything acquired is released in
    /// reverse order and the failing stage's error is returned.
    pub fn start(config: &Config, registrar: R) -> Result<Self> {
        config.validate()?;
        log_set_min_level(config.log_level);
        log_info!("pchar: pchar_init() called.");

        let limit = MemoryLimit::from_option(config.mem_limit);
        let (stages, devices, first) =
            init::init_stages(&registrar, config.devcnt, config.bufsize, &limit)?;

        log_info!(
            "pchar: {} devices registered, major = {}, {} bytes each",
            devices.len(),
            first.major(),
            config.bufsize
        );

        Ok(Self {
            registrar,
            stages,
            devices,
            limit,
            first,
        })
    }

    /// Tear the driver down
    ///
    /// Undoes all six stages in reverse order.
    pub fn stop(self) {
        log_info!("pchar: pchar_exit() called.");
        drop(self);
    }

    /// Number of devices
    pub fn devcnt(&self) -> usize {
        self.devices.len()
    }

    /// First device number of the region
    pub fn first_devno(&self) -> DevNum {
        self.first
    }

    /// Device number of slot `id`
    pub fn devno(&self, id: usize) -> Option<DevNum> {
        self.devices.get(id).map(Device::devno)
    }

    /// Device in slot `id`
    pub fn device(&self, id: usize) -> Option<&Device> {
        self.devices.get(id)
    }

    /// All devices in slot order
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Allocation accounting for this instance
    pub fn memory(&self) -> &MemoryLimit {
        &self.limit
    }

    /// The registrar this instance registered with
    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    /// Completed initialization stages, oldest first
    pub fn stages(&self) -> Vec<InitStage> {
        self.stages.stages()
    }

    /// Open the device with number `devno`
    pub fn open(&self, devno: DevNum, flags: OpenFlags) -> Result<File<'_>> {
        let dev = self.lookup(devno).ok_or_else(|| {
            log_error!("pchar: open of unknown device {}", devno);
            Error::NoDevice
        })?;
        Ok(File::open(dev, &self.limit, flags))
    }

    fn lookup(&self, devno: DevNum) -> Option<&Device> {
        if devno.major() != self.first.major() || devno.minor() < self.first.minor() {
            return None;
        }
        let id = (devno.minor() - self.first.minor()) as usize;
        self.devices.get(id)
    }
}

impl<R: Registrar> Drop for Pchar<R> {
    fn drop(&mut self) {
        self.stages
            .unwind(&self.registrar, &mut self.devices, &self.limit);
    }
}

impl<R: Registrar> core::fmt::Debug for Pchar<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pchar")
            .field("first", &self.first)
            .field("devices", &self.devices)
            .field("stages", &self.stages.stages())
            .finish()
    }
}
