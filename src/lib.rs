// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! pchar - Multi-Device Pseudo Character Driver
//!
//! A set of independent byte-stream devices (`pchar0`..`pchar<N-1>`), each
//! backed by a fixed-capacity FIFO guarded by its own spinlock, with an
//! ioctl surface for clear/info/resize and an all-or-nothing staged
//! registration that unwinds in reverse order on failure.
//!
//! # Usage
//!
//! ```rust
//! use pchar::kernel::cmdline::Config;
//! use pchar::kernel::dev::pchar::{MemRegistrar, OpenFlags, Pchar};
//!
//! let registrar = MemRegistrar::new();
//! let config = Config::from_cmdline("pchar.devcnt=2 pchar.bufsize=8").unwrap();
//! let driver = Pchar::start(&config, &registrar).unwrap();
//!
//! let devno = registrar.lookup("pchar0").unwrap();
//! let file = driver.open(devno, OpenFlags::RDWR).unwrap();
//! assert_eq!(file.write(&b"HELLO"[..]).unwrap(), 5);
//!
//! let mut buf = [0u8; 10];
//! assert_eq!(file.read(&mut buf[..]).unwrap(), 5);
//! file.close();
//!
//! driver.stop();
//! assert!(registrar.is_clean());
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod err;
pub mod kernel;

pub use err::{Error, Result};
