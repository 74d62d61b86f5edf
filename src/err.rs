// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Driver Error Codes
//!
//! This module provides the error type used throughout the driver and
//! its mapping onto negative errno-style status codes.

use core::fmt;

/// Status code type (negative errno on failure)
pub type Status = i32;

/// Success status code
pub const OK: Status = 0;

/// Bad file descriptor (device not opened for this access)
pub const EBADF: Status = -9;

/// Out of memory
pub const ENOMEM: Status = -12;

/// Bad address (fault copying to/from the caller)
pub const EFAULT: Status = -14;

/// Device or resource busy
pub const EBUSY: Status = -16;

/// Already exists
pub const EEXIST: Status = -17;

/// No such device
pub const ENODEV: Status = -19;

/// Invalid argument
pub const EINVAL: Status = -22;

/// No such device or address
pub const ENXIO: Status = -6;

/// Result type for driver operations
pub type Result<T = ()> = core::result::Result<T, Error>;

/// Driver errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Bulk device array or queue storage could not be allocated
    AllocationFailure,

    /// The registrar could not supply the requested device number range
    IdentityRangeExhausted,

    /// The device class could not be registered
    NamespaceRegistrationFailure,

    /// The device node for a slot could not be created
    EntryPointRegistrationFailure { slot: usize },

    /// The dispatch table for a slot could not be bound
    DispatchBindingFailure { slot: usize },

    /// The FIFO for a slot could not be allocated
    QueueAllocationFailure { slot: usize },

    /// Fault copying data across the user boundary
    TransferFault,

    /// Unrecognized ioctl command
    InvalidCommand(u32),

    /// Malformed argument (zero capacity, bad parameter value)
    InvalidArgument,

    /// Device number does not belong to this driver
    NoDevice,

    /// File was not opened with the access mode the operation needs
    AccessDenied,
}

impl Error {
    /// Convert error to status code
    pub fn to_status(self) -> Status {
        match self {
            Error::AllocationFailure => ENOMEM,
            Error::IdentityRangeExhausted => EBUSY,
            Error::NamespaceRegistrationFailure => EEXIST,
            Error::EntryPointRegistrationFailure { .. } => ENODEV,
            Error::DispatchBindingFailure { .. } => EBUSY,
            Error::QueueAllocationFailure { .. } => ENOMEM,
            Error::TransferFault => EFAULT,
            Error::InvalidCommand(_) => EINVAL,
            Error::InvalidArgument => EINVAL,
            Error::NoDevice => ENXIO,
            Error::AccessDenied => EBADF,
        }
    }

    /// True for failures raised by the staged initialization
    pub fn is_init_failure(self) -> bool {
        matches!(
            self,
            Error::AllocationFailure
                | Error::IdentityRangeExhausted
                | Error::NamespaceRegistrationFailure
                | Error::EntryPointRegistrationFailure { .. }
                | Error::DispatchBindingFailure { .. }
                | Error::QueueAllocationFailure { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AllocationFailure => write!(f, "allocation failed"),
            Error::IdentityRangeExhausted => write!(f, "device number range exhausted"),
            Error::NamespaceRegistrationFailure => write!(f, "device class registration failed"),
            Error::EntryPointRegistrationFailure { slot } => {
                write!(f, "device_create() failed for pchar{}", slot)
            }
            Error::DispatchBindingFailure { slot } => {
                write!(f, "cdev_add() failed for pchar{}", slot)
            }
            Error::QueueAllocationFailure { slot } => {
                write!(f, "kfifo_alloc() failed for pchar{}", slot)
            }
            Error::TransferFault => write!(f, "fault copying user buffer"),
            Error::InvalidCommand(cmd) => write!(f, "invalid ioctl command {:#x}", cmd),
            Error::InvalidArgument => write!(f, "invalid argument"),
            Error::NoDevice => write!(f, "no such device"),
            Error::AccessDenied => write!(f, "file not opened for this access"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::AllocationFailure.to_status(), ENOMEM);
        assert_eq!(Error::TransferFault.to_status(), EFAULT);
        assert_eq!(Error::InvalidCommand(0x42).to_status(), EINVAL);
        assert_eq!(Error::QueueAllocationFailure { slot: 3 }.to_status(), ENOMEM);
    }

    #[test]
    fn test_init_failure_classification() {
        assert!(Error::DispatchBindingFailure { slot: 0 }.is_init_failure());
        assert!(Error::IdentityRangeExhausted.is_init_failure());
        assert!(!Error::TransferFault.is_init_failure());
        assert!(!Error::InvalidCommand(7).is_init_failure());
    }

    #[test]
    fn test_display_names_slot() {
        let msg = Error::EntryPointRegistrationFailure { slot: 2 }.to_string();
        assert!(msg.contains("pchar2"));
    }
}
