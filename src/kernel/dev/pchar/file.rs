// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! pchar Open Files
//!
//! A [`File`] is the client session: it borrows the device it was opened
//! on for as long as it lives and holds nothing else but its open flags.
//! The borrow ties every file to the driver instance, so the driver cannot
//! be stopped while a file is still open.

use alloc::vec::Vec;

use crate::err::{Error, Result};
use crate::kernel::lib::MemoryLimit;
use crate::kernel::usercopy::{UserSink, UserSource};
use crate::{log_debug, log_error, log_info};

use super::device::Device;
use super::ioctl::{Command, DevInfo, IoctlReply};

bitflags::bitflags! {
    /// File open flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Open for reading
        const READ = 1 << 0;

        /// Open for writing
        const WRITE = 1 << 1;

        /// Open for reading and writing
        const RDWR = Self::READ.bits() | Self::WRITE.bits();
    }
}

/// An open pchar device
pub struct File<'a> {
    dev: &'a Device,
    limit: &'a MemoryLimit,
    flags: OpenFlags,
}

impl<'a> File<'a> {
    pub(crate) fn open(dev: &'a Device, limit: &'a MemoryLimit, flags: OpenFlags) -> Self {
        log_info!("pchar: pchar_open() called for pchar{}.", dev.id());
        Self { dev, limit, flags }
    }

    /// Device this file is open on
    pub fn device(&self) -> &'a Device {
        self.dev
    }

    /// Flags the file was opened with
    pub fn flags(&self) -> OpenFlags {
        self.flags
    }

    fn require(&self, flags: OpenFlags) -> Result {
        if self.flags.contains(flags) {
            Ok(())
        } else {
            Err(Error::AccessDenied)
        }
    }

    /// Write bytes to the device
    ///
    /// Returns the number of bytes accepted, which is less than offered
    /// (possibly 0) when the FIFO fills up.
    pub fn write<S: UserSource + ?Sized>(&self, src: &S) -> Result<usize> {
        log_debug!("pchar: pchar_write() called for pchar{}.", self.dev.id());
        self.require(OpenFlags::WRITE)?;
        let nbytes = self.dev.write(src)?;
        log_info!("pchar: pchar_write() written {} bytes in pchar{}.", nbytes, self.dev.id());
        Ok(nbytes)
    }

    /// Read bytes from the device
    ///
    /// Returns the number of bytes read, 0 if the FIFO is empty.
    pub fn read<D: UserSink + ?Sized>(&self, dst: &mut D) -> Result<usize> {
        log_debug!("pchar: pchar_read() called for pchar{}.", self.dev.id());
        self.require(OpenFlags::READ)?;
        let nbytes = self.dev.read(dst)?;
        log_info!("pchar: pchar_read() read {} bytes in pchar{}.", nbytes, self.dev.id());
        Ok(nbytes)
    }

    /// Read up to `max_len` bytes into a new vector
    pub fn read_to_vec(&self, max_len: usize) -> Result<Vec<u8>> {
        let mut buf = alloc::vec![0u8; max_len];
        let nbytes = self.read(&mut buf[..])?;
        buf.truncate(nbytes);
        Ok(buf)
    }

    /// Issue a raw ioctl
    pub fn ioctl(&self, cmd: u32, arg: u64) -> Result<IoctlReply> {
        let command = Command::decode(cmd, arg).map_err(|err| {
            log_error!("pchar: invalid command {:#x} in pchar_ioctl().", cmd);
            err
        })?;
        self.control(command)
    }

    /// Issue a decoded control command
    pub fn control(&self, command: Command) -> Result<IoctlReply> {
        match command {
            Command::Clear => {
                self.dev.clear();
                log_info!("pchar: pchar_ioctl() pchar{} buffer is cleared.", self.dev.id());
                Ok(IoctlReply::None)
            }
            Command::GetInfo => {
                let info = DevInfo::from(self.dev.info());
                log_info!("pchar: pchar_ioctl() read pchar{} buffer info.", self.dev.id());
                Ok(IoctlReply::Info(info))
            }
            Command::Resize(new_size) => {
                self.dev.resize(new_size, self.limit)?;
                Ok(IoctlReply::None)
            }
        }
    }

    /// `FIFO_GETINFO` copied into a caller buffer as a [`DevInfo`] record
    pub fn ioctl_getinfo<D: UserSink + ?Sized>(&self, dst: &mut D) -> Result {
        let info = DevInfo::from(self.dev.info());
        info.copy_to_user(dst).map_err(|err| {
            log_error!("pchar: copy_to_user() failed in pchar_ioctl().");
            err
        })
    }

    /// Close the file
    pub fn close(self) {}
}

impl Drop for File<'_> {
    fn drop(&mut self) {
        log_info!("pchar: pchar_close() called for pchar{}.", self.dev.id());
    }
}

impl core::fmt::Debug for File<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("File")
            .field("dev", &self.dev.id())
            .field("flags", &self.flags)
            .finish()
    }
}
