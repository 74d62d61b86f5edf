// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! Device Registrar
//!
//! The registrar is the driver's view of the device subsystem: it hands out
//! device number ranges, device classes, device nodes and dispatch
//! bindings, and takes each of them back. Every registration has a
//! symmetric, infallible de-registration so that staged initialization can
//! always unwind.
//!
//! [`MemRegistrar`] is an in-memory implementation. It journals every
//! call, supports name lookup of created nodes, and can be told to fail a
//! given stage or slot.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;

use spin::Mutex;

use crate::log_debug;

/// ============================================================================
/// Device Numbers
/// ============================================================================

/// Number of bits used for the minor number
pub const MINORBITS: u32 = 20;

/// Mask of the minor number bits
pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Encoded major/minor device number
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevNum(u32);

impl DevNum {
    /// Encode a major/minor pair
    pub const fn new(major: u32, minor: u32) -> Self {
        Self((major << MINORBITS) | (minor & MINORMASK))
    }

    /// Create from a raw encoded value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw encoded value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Major number
    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    /// Minor number
    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }

    /// Device number `n` minors after this one
    pub const fn offset(self, n: u32) -> Self {
        Self::new(self.major(), self.minor() + n)
    }
}

impl fmt::Display for DevNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

/// Opaque device class token
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(u32);

impl ClassId {
    /// Raw token value
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Registrar failure reasons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrarError {
    /// No device numbers left
    Exhausted,
    /// Name or number already registered
    Exists,
    /// Registrar ran out of memory
    NoMemory,
    /// Request refused (unknown class, unregistered number)
    Rejected,
}

/// ============================================================================
/// Registrar Interface
/// ============================================================================

/// Device subsystem operations used by the driver
pub trait Registrar {
    /// Allocate `count` contiguous device numbers under a dynamic major
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevNum, RegistrarError>;

    /// Release a range from `alloc_chrdev_region`
    fn unregister_chrdev_region(&self, first: DevNum, count: u32);

    /// Create a device class
    fn class_create(&self, name: &str) -> Result<ClassId, RegistrarError>;

    /// Destroy a device class
    fn class_destroy(&self, class: ClassId);

    /// Create a discoverable device node
    fn device_create(&self, class: ClassId, devno: DevNum, name: &str)
        -> Result<(), RegistrarError>;

    /// Remove a device node
    fn device_destroy(&self, class: ClassId, devno: DevNum);

    /// Bind the driver's dispatch table to `count` device numbers
    fn cdev_add(&self, devno: DevNum, count: u32) -> Result<(), RegistrarError>;

    /// Unbind a dispatch table
    fn cdev_del(&self, devno: DevNum);
}

impl<T: Registrar + ?Sized> Registrar for &T {
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevNum, RegistrarError> {
        (**self).alloc_chrdev_region(first_minor, count, name)
    }

    fn unregister_chrdev_region(&self, first: DevNum, count: u32) {
        (**self).unregister_chrdev_region(first, count)
    }

    fn class_create(&self, name: &str) -> Result<ClassId, RegistrarError> {
        (**self).class_create(name)
    }

    fn class_destroy(&self, class: ClassId) {
        (**self).class_destroy(class)
    }

    fn device_create(
        &self,
        class: ClassId,
        devno: DevNum,
        name: &str,
    ) -> Result<(), RegistrarError> {
        (**self).device_create(class, devno, name)
    }

    fn device_destroy(&self, class: ClassId, devno: DevNum) {
        (**self).device_destroy(class, devno)
    }

    fn cdev_add(&self, devno: DevNum, count: u32) -> Result<(), RegistrarError> {
        (**self).cdev_add(devno, count)
    }

    fn cdev_del(&self, devno: DevNum) {
        (**self).cdev_del(devno)
    }
}

/// ============================================================================
/// In-Memory Registrar
/// ============================================================================

/// Highest dynamically assigned major number
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;

/// Lowest dynamically assigned major number
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;

/// Journaled registrar call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarOp {
    AllocRegion { first: DevNum, count: u32 },
    UnregisterRegion { first: DevNum, count: u32 },
    ClassCreate(ClassId),
    ClassDestroy(ClassId),
    DeviceCreate(DevNum),
    DeviceDestroy(DevNum),
    CdevAdd(DevNum),
    CdevDel(DevNum),
}

/// Failures to inject into a [`MemRegistrar`]
///
/// Per-call faults count calls from zero, so for a single driver the index
/// is the slot that fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Faults {
    /// Fail `alloc_chrdev_region`
    pub region: bool,
    /// Fail `class_create`
    pub class: bool,
    /// Fail the nth `device_create` call
    pub device_create: Option<usize>,
    /// Fail the nth `cdev_add` call
    pub cdev_add: Option<usize>,
}

/// Registrations currently held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outstanding {
    pub regions: usize,
    pub classes: usize,
    pub nodes: usize,
    pub cdevs: usize,
}

impl Outstanding {
    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        *self == Outstanding::default()
    }
}

struct Region {
    first_minor: u32,
    count: u32,
}

struct Node {
    class: ClassId,
    name: String,
}

struct State {
    /// Allocated regions by major
    regions: BTreeMap<u32, Region>,
    /// Live classes
    classes: BTreeMap<ClassId, String>,
    next_class: u32,
    /// Live device nodes
    nodes: BTreeMap<DevNum, Node>,
    /// Bound dispatch tables and their minor counts
    cdevs: BTreeMap<DevNum, u32>,
    device_create_calls: usize,
    cdev_add_calls: usize,
    journal: Vec<RegistrarOp>,
}

impl State {
    fn region_covers(&self, devno: DevNum, count: u32) -> bool {
        self.regions.get(&devno.major()).map_or(false, |region| {
            devno.minor() >= region.first_minor
                && devno.minor() + count <= region.first_minor + region.count
        })
    }
}

/// In-memory device registrar
pub struct MemRegistrar {
    state: Mutex<State>,
    faults: Faults,
}

impl MemRegistrar {
    /// Create a registrar that never fails on its own
    pub fn new() -> Self {
        Self::with_faults(Faults::default())
    }

    /// Create a registrar that fails as described by `faults`
    pub fn with_faults(faults: Faults) -> Self {
        Self {
            state: Mutex::new(State {
                regions: BTreeMap::new(),
                classes: BTreeMap::new(),
                next_class: 1,
                nodes: BTreeMap::new(),
                cdevs: BTreeMap::new(),
                device_create_calls: 0,
                cdev_add_calls: 0,
                journal: Vec::new(),
            }),
            faults,
        }
    }

    /// Find a device node by name
    pub fn lookup(&self, name: &str) -> Option<DevNum> {
        let state = self.state.lock();
        state
            .nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(devno, _)| *devno)
    }

    /// Check whether a dispatch table is bound to `devno`
    pub fn is_bound(&self, devno: DevNum) -> bool {
        let state = self.state.lock();
        state
            .cdevs
            .iter()
            .any(|(base, count)| base.major() == devno.major()
                && devno.minor() >= base.minor()
                && devno.minor() < base.minor() + count)
    }

    /// Registrations currently held
    pub fn outstanding(&self) -> Outstanding {
        let state = self.state.lock();
        Outstanding {
            regions: state.regions.len(),
            classes: state.classes.len(),
            nodes: state.nodes.len(),
            cdevs: state.cdevs.len(),
        }
    }

    /// True when every registration has been released
    pub fn is_clean(&self) -> bool {
        self.outstanding().is_empty()
    }

    /// All calls made so far, in order
    pub fn journal(&self) -> Vec<RegistrarOp> {
        self.state.lock().journal.clone()
    }
}

impl Default for MemRegistrar {
    fn default() -> Self {
        Self::new()
    }
}

impl Registrar for MemRegistrar {
    fn alloc_chrdev_region(
        &self,
        first_minor: u32,
        count: u32,
        name: &str,
    ) -> Result<DevNum, RegistrarError> {
        if self.faults.region {
            return Err(RegistrarError::Exhausted);
        }
        if count == 0 || first_minor.checked_add(count).map_or(true, |end| end > MINORMASK + 1) {
            return Err(RegistrarError::Rejected);
        }

        let mut state = self.state.lock();
        let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .find(|major| !state.regions.contains_key(major))
            .ok_or(RegistrarError::Exhausted)?;

        state.regions.insert(major, Region { first_minor, count });
        let first = DevNum::new(major, first_minor);
        state.journal.push(RegistrarOp::AllocRegion { first, count });
        log_debug!("registrar: region {} x{} for {}", first, count, name);
        Ok(first)
    }

    fn unregister_chrdev_region(&self, first: DevNum, count: u32) {
        let mut state = self.state.lock();
        state.regions.remove(&first.major());
        state.journal.push(RegistrarOp::UnregisterRegion { first, count });
    }

    fn class_create(&self, name: &str) -> Result<ClassId, RegistrarError> {
        if self.faults.class {
            return Err(RegistrarError::NoMemory);
        }

        let mut state = self.state.lock();
        if state.classes.values().any(|existing| existing == name) {
            return Err(RegistrarError::Exists);
        }

        let class = ClassId(state.next_class);
        state.next_class += 1;
        state.classes.insert(class, name.to_string());
        state.journal.push(RegistrarOp::ClassCreate(class));
        Ok(class)
    }

    fn class_destroy(&self, class: ClassId) {
        let mut state = self.state.lock();
        state.classes.remove(&class);
        state.journal.push(RegistrarOp::ClassDestroy(class));
    }

    fn device_create(
        &self,
        class: ClassId,
        devno: DevNum,
        name: &str,
    ) -> Result<(), RegistrarError> {
        let mut state = self.state.lock();
        let call = state.device_create_calls;
        state.device_create_calls += 1;
        if self.faults.device_create == Some(call) {
            return Err(RegistrarError::NoMemory);
        }

        if !state.classes.contains_key(&class) || !state.region_covers(devno, 1) {
            return Err(RegistrarError::Rejected);
        }
        if state.nodes.contains_key(&devno) || state.nodes.values().any(|node| node.name == name) {
            return Err(RegistrarError::Exists);
        }

        state.nodes.insert(
            devno,
            Node {
                class,
                name: name.to_string(),
            },
        );
        state.journal.push(RegistrarOp::DeviceCreate(devno));
        Ok(())
    }

    fn device_destroy(&self, class: ClassId, devno: DevNum) {
        let mut state = self.state.lock();
        if state.nodes.get(&devno).map_or(false, |node| node.class == class) {
            state.nodes.remove(&devno);
        }
        state.journal.push(RegistrarOp::DeviceDestroy(devno));
    }

    fn cdev_add(&self, devno: DevNum, count: u32) -> Result<(), RegistrarError> {
        let mut state = self.state.lock();
        let call = state.cdev_add_calls;
        state.cdev_add_calls += 1;
        if self.faults.cdev_add == Some(call) {
            return Err(RegistrarError::Exists);
        }

        if !state.region_covers(devno, count) {
            return Err(RegistrarError::Rejected);
        }
        if state.cdevs.contains_key(&devno) {
            return Err(RegistrarError::Exists);
        }

        state.cdevs.insert(devno, count);
        state.journal.push(RegistrarOp::CdevAdd(devno));
        Ok(())
    }

    fn cdev_del(&self, devno: DevNum) {
        let mut state = self.state.lock();
        state.cdevs.remove(&devno);
        state.journal.push(RegistrarOp::CdevDel(devno));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_devnum_encoding() {
        let devno = DevNum::new(250, 3);
        assert_eq!(devno.major(), 250);
        assert_eq!(devno.minor(), 3);
        assert_eq!(devno.raw(), (250 << 20) | 3);
        assert_eq!(DevNum::from_raw(devno.raw()), devno);
        assert_eq!(devno.offset(2), DevNum::new(250, 5));
        assert_eq!(devno.to_string(), "250:3");
    }

    #[test]
    fn test_dynamic_majors() {
        let reg = MemRegistrar::new();
        let a = reg.alloc_chrdev_region(0, 4, "a").unwrap();
        let b = reg.alloc_chrdev_region(0, 4, "b").unwrap();
        assert_eq!(a.major(), CHRDEV_MAJOR_DYN_START);
        assert_eq!(b.major(), CHRDEV_MAJOR_DYN_START - 1);

        reg.unregister_chrdev_region(a, 4);
        let c = reg.alloc_chrdev_region(0, 1, "c").unwrap();
        assert_eq!(c.major(), CHRDEV_MAJOR_DYN_START);
    }

    #[test]
    fn test_majors_exhausted() {
        let reg = MemRegistrar::new();
        let total = CHRDEV_MAJOR_DYN_START - CHRDEV_MAJOR_DYN_END + 1;
        for _ in 0..total {
            reg.alloc_chrdev_region(0, 1, "x").unwrap();
        }
        assert_eq!(reg.alloc_chrdev_region(0, 1, "x"), Err(RegistrarError::Exhausted));
    }

    #[test]
    fn test_node_registration_and_lookup() {
        let reg = MemRegistrar::new();
        let first = reg.alloc_chrdev_region(0, 2, "pchar").unwrap();
        let class = reg.class_create("pchar_class").unwrap();
        assert_eq!(reg.class_create("pchar_class"), Err(RegistrarError::Exists));

        reg.device_create(class, first, "pchar0").unwrap();
        reg.device_create(class, first.offset(1), "pchar1").unwrap();
        assert_eq!(
            reg.device_create(class, first.offset(2), "pchar2"),
            Err(RegistrarError::Rejected)
        );
        assert_eq!(reg.lookup("pchar1"), Some(first.offset(1)));
        assert_eq!(reg.lookup("pchar9"), None);

        reg.cdev_add(first, 1).unwrap();
        assert!(reg.is_bound(first));
        assert!(!reg.is_bound(first.offset(1)));
        assert_eq!(reg.cdev_add(first, 1), Err(RegistrarError::Exists));

        reg.cdev_del(first);
        reg.device_destroy(class, first.offset(1));
        reg.device_destroy(class, first);
        reg.class_destroy(class);
        reg.unregister_chrdev_region(first, 2);
        assert!(reg.is_clean());
    }

    #[test]
    fn test_injected_faults() {
        let reg = MemRegistrar::with_faults(Faults {
            device_create: Some(1),
            cdev_add: Some(0),
            ..Faults::default()
        });
        let first = reg.alloc_chrdev_region(0, 2, "pchar").unwrap();
        let class = reg.class_create("pchar_class").unwrap();
        reg.device_create(class, first, "pchar0").unwrap();
        assert_eq!(
            reg.device_create(class, first.offset(1), "pchar1"),
            Err(RegistrarError::NoMemory)
        );
        assert_eq!(reg.cdev_add(first, 1), Err(RegistrarError::Exists));

        let failing = MemRegistrar::with_faults(Faults {
            region: true,
            class: true,
            ..Faults::default()
        });
        assert_eq!(failing.alloc_chrdev_region(0, 1, "x"), Err(RegistrarError::Exhausted));
        assert_eq!(failing.class_create("x"), Err(RegistrarError::NoMemory));
        assert!(failing.journal().is_empty());
    }
}
