// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Core Driver Modules
//!
//! This module contains the support code the pseudo character driver is
//! built on: logging, module parameters, FIFO and memory accounting
//! primitives, the user copy boundary, and the device drivers themselves.

// Logging and diagnostics
pub mod debug;

// Module parameters
pub mod cmdline;

// Support library (kfifo, memory limit)
pub mod lib;

// User/driver boundary
pub mod usercopy;

// Device drivers
pub mod dev;
