// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Driver Library Module
//!
//! This module provides the data structures the device drivers are built
//! from.

// Fixed-capacity byte FIFO
pub mod kfifo;

// Allocation accounting
pub mod memory_limit;

pub use kfifo::{FifoInfo, Kfifo};
pub use memory_limit::MemoryLimit;
