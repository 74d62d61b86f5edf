// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! pchar ioctl Interface
//!
//! Command numbers follow the Linux `_IOC` layout:
//!
//! ```text
//!  31-30   29-16   15-8    7-0
//! +-----+--------+------+------+
//! | dir |  size  | type |  nr  |
//! +-----+--------+------+------+
//! ```
//!
//! - `FIFO_CLEAR` - `_IO('x', 1)`, discard queued bytes
//! - `FIFO_GETINFO` - `_IOR('x', 2, DevInfo)`, read size/len/avail
//! - `FIFO_RESIZE` - `_IOW('x', 3, u64)`, reallocate the FIFO

use core::mem::size_of;

use crate::err::{Error, Result};
use crate::kernel::lib::FifoInfo;
use crate::kernel::usercopy::UserSink;

/// ============================================================================
/// Command Encoding
/// ============================================================================

const IOC_NRBITS: u32 = 8;
const IOC_TYPEBITS: u32 = 8;
const IOC_SIZEBITS: u32 = 14;

const IOC_NRSHIFT: u32 = 0;
const IOC_TYPESHIFT: u32 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u32 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u32 = IOC_SIZESHIFT + IOC_SIZEBITS;

/// No data transfer
pub const IOC_NONE: u32 = 0;
/// Caller writes, driver reads
pub const IOC_WRITE: u32 = 1;
/// Driver writes, caller reads
pub const IOC_READ: u32 = 2;

/// Encode an ioctl command number
pub const fn ioc(dir: u32, ty: u8, nr: u8, size: usize) -> u32 {
    (dir << IOC_DIRSHIFT)
        | ((ty as u32) << IOC_TYPESHIFT)
        | ((nr as u32) << IOC_NRSHIFT)
        | ((size as u32) << IOC_SIZESHIFT)
}

/// `_IO(ty, nr)`
pub const fn io(ty: u8, nr: u8) -> u32 {
    ioc(IOC_NONE, ty, nr, 0)
}

/// `_IOR(ty, nr, size)`
pub const fn ior(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_READ, ty, nr, size)
}

/// `_IOW(ty, nr, size)`
pub const fn iow(ty: u8, nr: u8, size: usize) -> u32 {
    ioc(IOC_WRITE, ty, nr, size)
}

/// ioctl type byte for pchar commands
pub const PCHAR_IOC_MAGIC: u8 = b'x';

/// Clear the FIFO
pub const FIFO_CLEAR: u32 = io(PCHAR_IOC_MAGIC, 1);

/// Get FIFO size, length and free space
pub const FIFO_GETINFO: u32 = ior(PCHAR_IOC_MAGIC, 2, size_of::<DevInfo>());

/// Resize the FIFO to the capacity given as argument
pub const FIFO_RESIZE: u32 = iow(PCHAR_IOC_MAGIC, 3, size_of::<u64>());

/// ============================================================================
/// Device Info Record
/// ============================================================================

/// Encoded size of [`DevInfo`]
pub const DEVINFO_SIZE: usize = size_of::<DevInfo>();

/// FIFO information returned by `FIFO_GETINFO`
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DevInfo {
    /// Capacity in bytes
    pub size: u64,
    /// Bytes queued
    pub len: u64,
    /// Bytes free
    pub avail: u64,
}

impl DevInfo {
    /// Encoded record size
    pub const SIZE: usize = DEVINFO_SIZE;

    /// Encode as little-endian bytes
    pub fn to_bytes(&self) -> [u8; DEVINFO_SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..8].copy_from_slice(&self.size.to_le_bytes());
        out[8..16].copy_from_slice(&self.len.to_le_bytes());
        out[16..24].copy_from_slice(&self.avail.to_le_bytes());
        out
    }

    /// Decode from little-endian bytes
    pub fn from_bytes(bytes: &[u8; DEVINFO_SIZE]) -> Self {
        let field = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };
        Self {
            size: field(0),
            len: field(8),
            avail: field(16),
        }
    }

    /// Copy the record into a caller buffer
    pub fn copy_to_user<D: UserSink + ?Sized>(&self, dst: &mut D) -> Result {
        if dst.len() < Self::SIZE {
            return Err(Error::TransferFault);
        }
        dst.copy_out(0, &self.to_bytes())
    }
}

impl From<FifoInfo> for DevInfo {
    fn from(info: FifoInfo) -> Self {
        Self {
            size: info.size as u64,
            len: info.len as u64,
            avail: info.avail as u64,
        }
    }
}

/// ============================================================================
/// Decoded Commands
/// ============================================================================

/// A decoded ioctl request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `FIFO_CLEAR`
    Clear,
    /// `FIFO_GETINFO`
    GetInfo,
    /// `FIFO_RESIZE` with the new capacity
    Resize(usize),
}

impl Command {
    /// Decode a raw command number and argument
    pub fn decode(cmd: u32, arg: u64) -> Result<Self> {
        match cmd {
            FIFO_CLEAR => Ok(Command::Clear),
            FIFO_GETINFO => Ok(Command::GetInfo),
            FIFO_RESIZE => usize::try_from(arg)
                .map(Command::Resize)
                .map_err(|_| Error::InvalidArgument),
            _ => Err(Error::InvalidCommand(cmd)),
        }
    }

    /// Raw command number
    pub fn raw(&self) -> u32 {
        match self {
            Command::Clear => FIFO_CLEAR,
            Command::GetInfo => FIFO_GETINFO,
            Command::Resize(_) => FIFO_RESIZE,
        }
    }
}

/// Result payload of an ioctl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    /// Command has no payload
    None,
    /// `FIFO_GETINFO` payload
    Info(DevInfo),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_numbers() {
        // Values match the C macros for 'x' on x86_64/arm64
        assert_eq!(FIFO_CLEAR, 0x0000_7801);
        assert_eq!(FIFO_GETINFO, 0x8018_7802);
        assert_eq!(FIFO_RESIZE, 0x4008_7803);
    }

    #[test]
    fn test_decode() {
        assert_eq!(Command::decode(FIFO_CLEAR, 0), Ok(Command::Clear));
        assert_eq!(Command::decode(FIFO_GETINFO, 0), Ok(Command::GetInfo));
        assert_eq!(Command::decode(FIFO_RESIZE, 64), Ok(Command::Resize(64)));
        assert_eq!(Command::decode(0x1234, 0), Err(Error::InvalidCommand(0x1234)));
        assert_eq!(Command::Resize(1).raw(), FIFO_RESIZE);
    }

    #[test]
    fn test_devinfo_record() {
        let info = DevInfo::from(FifoInfo { size: 8, len: 5, avail: 3 });
        assert_eq!(DevInfo::SIZE, 24);
        assert_eq!(DevInfo::from_bytes(&info.to_bytes()), info);

        let mut out = [0u8; 24];
        info.copy_to_user(&mut out[..]).unwrap();
        assert_eq!(out[0], 8);
        assert_eq!(out[8], 5);
        assert_eq!(out[16], 3);

        let mut short = [0u8; 8];
        assert_eq!(info.copy_to_user(&mut short[..]), Err(Error::TransferFault));
    }
}
