// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Module Parameter Parsing
//!
//! This module parses driver parameters given in kernel command line form
//! (`key=value` pairs separated by whitespace) and turns them into the
//! driver [`Config`].
//!
//! # Parameters
//!
//! - `pchar.devcnt` - number of devices (default 4)
//! - `pchar.bufsize` - initial FIFO size per device in bytes (default 32)
//! - `pchar.mem_limit` - byte budget for the device array and all FIFOs
//! - `pchar.loglevel` - minimum log level (`trace`..`error`)
//!
//! # Usage
//!
//! ```rust
//! use pchar::kernel::cmdline::{Cmdline, Config};
//!
//! let cmdline = Cmdline::new("quiet pchar.devcnt=2");
//! assert_eq!(cmdline.get_u32("pchar.devcnt", 4), Ok(2));
//!
//! let config = Config::from_cmdline("pchar.bufsize=8").unwrap();
//! assert_eq!(config.bufsize, 8);
//! ```

use crate::err::{Error, Result};
use crate::kernel::debug::LogLevel;
use crate::log_error;

/// Default number of devices
pub const DEFAULT_DEVCNT: u32 = 4;

/// Default FIFO size in bytes
pub const DEFAULT_BUFSIZE: usize = 32;

/// ============================================================================
/// Command Line
/// ============================================================================

/// A borrowed command line
///
/// Arguments are separated by whitespace. An argument without `=` is a
/// flag whose value is empty. Later occurrences of a key win.
#[derive(Debug, Clone, Copy)]
pub struct Cmdline<'a> {
    data: &'a str,
}

impl<'a> Cmdline<'a> {
    /// Wrap a command line string
    pub const fn new(data: &'a str) -> Self {
        Self { data }
    }

    /// Iterate over `(key, value)` pairs in order
    pub fn args(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.data
            .split_ascii_whitespace()
            .map(|arg| match arg.split_once('=') {
                Some((key, value)) => (key, value),
                None => (arg, ""),
            })
    }

    /// Get the value of a key
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.args().filter(|(k, _)| *k == key).map(|(_, v)| v).last()
    }

    /// Get a boolean value with default
    ///
    /// A bare flag counts as true; `0`, `false` and `off` count as false.
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some("0") | Some("false") | Some("off") => false,
            Some(_) => true,
        }
    }

    /// Get a 32-bit unsigned value with default
    pub fn get_u32(&self, key: &str, default: u32) -> Result<u32> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse_uint(value)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| bad_value(key, value)),
        }
    }

    /// Get a size value with default
    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => parse_uint(value)
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| bad_value(key, value)),
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
fn parse_uint(value: &str) -> Option<u64> {
    match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => value.parse().ok(),
    }
}

fn bad_value(key: &str, value: &str) -> Error {
    log_error!("pchar: invalid value '{}' for parameter {}", value, key);
    Error::InvalidArgument
}

/// ============================================================================
/// Driver Configuration
/// ============================================================================

/// Driver configuration, fixed at driver start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of devices
    pub devcnt: u32,

    /// Initial FIFO size per device in bytes
    pub bufsize: usize,

    /// Byte budget for the device array and all FIFO storage
    pub mem_limit: Option<usize>,

    /// Minimum log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            devcnt: DEFAULT_DEVCNT,
            bufsize: DEFAULT_BUFSIZE,
            mem_limit: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Build a configuration from `pchar.*` parameters
    ///
    /// Unknown keys are ignored. Zero devices or a zero FIFO size are
    /// rejected with `InvalidArgument`.
    pub fn from_cmdline(data: &str) -> Result<Self> {
        let cmdline = Cmdline::new(data);
        let defaults = Config::default();

        let devcnt = cmdline.get_u32("pchar.devcnt", defaults.devcnt)?;
        let bufsize = cmdline.get_usize("pchar.bufsize", defaults.bufsize)?;
        let mem_limit = match cmdline.get("pchar.mem_limit") {
            None => None,
            Some(_) => Some(cmdline.get_usize("pchar.mem_limit", 0)?),
        };
        let log_level = match cmdline.get("pchar.loglevel") {
            None => defaults.log_level,
            Some(name) => {
                LogLevel::from_name(name).ok_or_else(|| bad_value("pchar.loglevel", name))?
            }
        };

        let config = Self {
            devcnt,
            bufsize,
            mem_limit,
            log_level,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check parameter ranges
    pub fn validate(&self) -> Result {
        if self.devcnt == 0 {
            log_error!("pchar: devcnt must be at least 1");
            return Err(Error::InvalidArgument);
        }
        if self.bufsize == 0 {
            log_error!("pchar: bufsize must be at least 1");
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Set the device count
    pub fn with_devcnt(mut self, devcnt: u32) -> Self {
        self.devcnt = devcnt;
        self
    }

    /// Set the initial FIFO size
    pub fn with_bufsize(mut self, bufsize: usize) -> Self {
        self.bufsize = bufsize;
        self
    }

    /// Set the memory budget
    pub fn with_mem_limit(mut self, limit: usize) -> Self {
        self.mem_limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmdline_get() {
        let cmdline = Cmdline::new("  console=ttyS0 quiet pchar.devcnt=3\tpchar.devcnt=5 ");
        assert_eq!(cmdline.get("console"), Some("ttyS0"));
        assert_eq!(cmdline.get("quiet"), Some(""));
        assert_eq!(cmdline.get("pchar.devcnt"), Some("5"));
        assert_eq!(cmdline.get("missing"), None);
    }

    #[test]
    fn test_cmdline_typed() {
        let cmdline = Cmdline::new("a=0x20 b=17 c=off d e=nope");
        assert_eq!(cmdline.get_usize("a", 0), Ok(32));
        assert_eq!(cmdline.get_u32("b", 0), Ok(17));
        assert_eq!(cmdline.get_u32("z", 9), Ok(9));
        assert!(!cmdline.get_bool("c", true));
        assert!(cmdline.get_bool("d", false));
        assert_eq!(cmdline.get_u32("e", 0), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::from_cmdline("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.devcnt, 4);
        assert_eq!(config.bufsize, 32);
        assert_eq!(config.mem_limit, None);
    }

    #[test]
    fn test_config_from_cmdline() {
        let config =
            Config::from_cmdline("pchar.devcnt=2 pchar.bufsize=8 pchar.mem_limit=4096 pchar.loglevel=debug")
                .unwrap();
        assert_eq!(config.devcnt, 2);
        assert_eq!(config.bufsize, 8);
        assert_eq!(config.mem_limit, Some(4096));
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert_eq!(Config::from_cmdline("pchar.devcnt=0"), Err(Error::InvalidArgument));
        assert_eq!(Config::from_cmdline("pchar.bufsize=0"), Err(Error::InvalidArgument));
        assert_eq!(Config::from_cmdline("pchar.devcnt=-1"), Err(Error::InvalidArgument));
        assert_eq!(Config::from_cmdline("pchar.loglevel=loud"), Err(Error::InvalidArgument));
    }
}
