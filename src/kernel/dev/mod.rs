// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Device Drivers
//!
//! This module contains the character device drivers.

// Multi-device pseudo character driver
pub mod pchar;

// Re-exports
pub use pchar::*;
