// Copyright 2025 The Rustux Authors
//
// Use of this source code is governed by a MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT

//! pchar Staged Initialization
//!
//! The driver comes up in six stages, each covering every device before
//! the next one starts:
//!
//! 1. Device array allocation
//! 2. Device number range
//! 3. Device class
//! 4. Device nodes (`pchar<i>`)
//! 5. Dispatch bindings (cdevs)
//! 6. FIFOs and locks
//!
//! Each completed stage pushes an [`Stage`] token onto a [`StageStack`].
//! Per-device stages record every device as it succeeds, so when a stage
//! fails half way its partial token is pushed too. Unwinding pops the stack
//! and undoes each token device-by-device in reverse, which is the same
//! path a normal shutdown takes.

use alloc::format;
use alloc::vec::Vec;
use core::mem::size_of;

use crate::err::{Error, Result};
use crate::kernel::lib::MemoryLimit;
use crate::{log_error, log_info};

use super::device::Device;
use super::registrar::{ClassId, DevNum, Registrar};

/// Name of the device number region
pub const PCHAR_REGION_NAME: &str = "pchar";

/// Name of the device class
pub const PCHAR_CLASS_NAME: &str = "pchar_class";

/// Initialization stage identifiers
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitStage {
    /// Device array allocated
    DeviceArray = 1,

    /// Device number range allocated
    ChrdevRegion = 2,

    /// Device class created
    Class = 3,

    /// Device nodes created
    DeviceNodes = 4,

    /// Dispatch tables bound
    Cdevs = 5,

    /// FIFOs allocated
    Fifos = 6,
}

/// Resources held by one completed (or partially completed) stage
#[derive(Debug)]
pub enum Stage {
    /// Bytes charged for the device array
    DeviceArray { bytes: usize },

    /// Device number range
    ChrdevRegion { first: DevNum, count: u32 },

    /// Device class
    Class(ClassId),

    /// Device nodes created so far
    DeviceNodes { class: ClassId, nodes: Vec<DevNum> },

    /// Dispatch tables bound so far
    Cdevs(Vec<DevNum>),

    /// Devices whose FIFO has been allocated
    Fifos,
}

impl Stage {
    /// Stage identifier
    pub fn id(&self) -> InitStage {
        match self {
            Stage::DeviceArray { .. } => InitStage::DeviceArray,
            Stage::ChrdevRegion { .. } => InitStage::ChrdevRegion,
            Stage::Class(_) => InitStage::Class,
            Stage::DeviceNodes { .. } => InitStage::DeviceNodes,
            Stage::Cdevs(_) => InitStage::Cdevs,
            Stage::Fifos => InitStage::Fifos,
        }
    }
}

/// Stack of completed stages, undone in reverse
#[derive(Debug, Default)]
pub struct StageStack {
    done: Vec<Stage>,
}

impl StageStack {
    /// Create an empty stack
    pub fn new() -> Self {
        Self { done: Vec::new() }
    }

    /// Record a completed stage
    pub fn push(&mut self, stage: Stage) {
        self.done.push(stage);
    }

    /// Identifiers of the recorded stages, oldest first
    pub fn stages(&self) -> Vec<InitStage> {
        self.done.iter().map(Stage::id).collect()
    }

    /// Undo every recorded stage, newest first
    pub fn unwind<R: Registrar>(
        &mut self,
        registrar: &R,
        devices: &mut Vec<Device>,
        limit: &MemoryLimit,
    ) {
        while let Some(stage) = self.done.pop() {
            undo(stage, registrar, devices, limit);
        }
    }
}

/// Undo one stage
fn undo<R: Registrar>(stage: Stage, registrar: &R, devices: &mut Vec<Device>, limit: &MemoryLimit) {
    match stage {
        Stage::Fifos => {
            while let Some(dev) = devices.pop() {
                let id = dev.id();
                dev.release(limit);
                log_info!("pchar: kfifo_free() released fifo for pchar{}", id);
            }
        }
        Stage::Cdevs(bound) => {
            for devno in bound.into_iter().rev() {
                registrar.cdev_del(devno);
                log_info!("pchar: cdev_del() removed cdev for pchar{}", devno.minor());
            }
        }
        Stage::DeviceNodes { class, nodes } => {
            for devno in nodes.into_iter().rev() {
                registrar.device_destroy(class, devno);
                log_info!("pchar: device_destroy() destroyed device file pchar{}", devno.minor());
            }
        }
        Stage::Class(class) => {
            registrar.class_destroy(class);
            log_info!("pchar: class_destroy() destroyed device class");
        }
        Stage::ChrdevRegion { first, count } => {
            registrar.unregister_chrdev_region(first, count);
            log_info!(
                "pchar: unregister_chrdev_region() released device numbers: major = {}",
                first.major()
            );
        }
        Stage::DeviceArray { bytes } => {
            *devices = Vec::new();
            limit.release(bytes);
            log_info!("pchar: device array released");
        }
    }
}

/// Run all six stages for `devcnt` devices of `bufsize` bytes
///
/// On success returns the stage stack, the devices and the first device
/// number of the region. On failure every resource acquired so far has
/// already been released, in reverse order.
pub fn init_stages<R: Registrar>(
    registrar: &R,
    devcnt: u32,
    bufsize: usize,
    limit: &MemoryLimit,
) -> Result<(StageStack, Vec<Device>, DevNum)> {
    let mut stack = StageStack::new();
    let mut devices = Vec::new();

    match run_stages(&mut stack, &mut devices, registrar, devcnt, bufsize, limit) {
        Ok(first) => Ok((stack, devices, first)),
        Err(err) => {
            log_error!("pchar: initialization failed ({}), rolling back", err);
            stack.unwind(registrar, &mut devices, limit);
            Err(err)
        }
    }
}

fn run_stages<R: Registrar>(
    stack: &mut StageStack,
    devices: &mut Vec<Device>,
    registrar: &R,
    devcnt: u32,
    bufsize: usize,
    limit: &MemoryLimit,
) -> Result<DevNum> {
    let count = devcnt as usize;

    // 1. allocate array of device structs
    let bytes = count
        .checked_mul(size_of::<Device>())
        .ok_or(Error::AllocationFailure)?;
    if let Err(err) = limit.charge(bytes) {
        log_error!("pchar: kmalloc() failed.");
        return Err(err);
    }
    if devices.try_reserve_exact(count).is_err() {
        limit.release(bytes);
        log_error!("pchar: kmalloc() failed.");
        return Err(Error::AllocationFailure);
    }
    stack.push(Stage::DeviceArray { bytes });

    // 2. allocate device numbers
    let first = registrar
        .alloc_chrdev_region(0, devcnt, PCHAR_REGION_NAME)
        .map_err(|err| {
            log_error!("pchar: alloc_chrdev_region() failed: {:?}", err);
            Error::IdentityRangeExhausted
        })?;
    stack.push(Stage::ChrdevRegion { first, count: devcnt });
    log_info!(
        "pchar: alloc_chrdev_region() allocated device number: major = {}",
        first.major()
    );

    // 3. create device class
    let class = registrar.class_create(PCHAR_CLASS_NAME).map_err(|err| {
        log_error!("pchar: class_create() failed: {:?}", err);
        Error::NamespaceRegistrationFailure
    })?;
    stack.push(Stage::Class(class));
    log_info!("pchar: class_create() created device class");

    // 4. create device files
    let mut nodes = Vec::with_capacity(count);
    for slot in 0..devcnt {
        let devno = first.offset(slot);
        let name = format!("pchar{}", slot);
        if let Err(err) = registrar.device_create(class, devno, &name) {
            log_error!("pchar: device_create() failed for pchar{}: {:?}", slot, err);
            stack.push(Stage::DeviceNodes { class, nodes });
            return Err(Error::EntryPointRegistrationFailure { slot: slot as usize });
        }
        nodes.push(devno);
        log_info!("pchar: device_create() created device file pchar{}", slot);
    }
    stack.push(Stage::DeviceNodes { class, nodes });

    // 5. bind dispatch tables
    let mut bound = Vec::with_capacity(count);
    for slot in 0..devcnt {
        let devno = first.offset(slot);
        if let Err(err) = registrar.cdev_add(devno, 1) {
            log_error!("pchar: cdev_add() failed for pchar{}: {:?}", slot, err);
            stack.push(Stage::Cdevs(bound));
            return Err(Error::DispatchBindingFailure { slot: slot as usize });
        }
        bound.push(devno);
        log_info!("pchar: cdev_add() added cdev into kernel for pchar{}", slot);
    }
    stack.push(Stage::Cdevs(bound));

    // 6. allocate fifos and init locks; `devices` holds the completed slots
    stack.push(Stage::Fifos);
    for slot in 0..count {
        match Device::new(slot, first.offset(slot as u32), bufsize, limit) {
            Ok(dev) => devices.push(dev),
            Err(err) => {
                log_error!("pchar: kfifo_alloc() failed for pchar{}: {}", slot, err);
                return Err(Error::QueueAllocationFailure { slot });
            }
        }
        log_info!("pchar: kfifo_alloc() allocated fifo for pchar{}", slot);
    }

    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::dev::pchar::registrar::{Faults, MemRegistrar};

    const DEVCNT: u32 = 4;
    const BUFSIZE: usize = 16;

    fn array_bytes() -> usize {
        DEVCNT as usize * size_of::<Device>()
    }

    #[test]
    fn test_init_and_unwind_release_memory() {
        let registrar = MemRegistrar::new();
        let limit = MemoryLimit::unlimited();

        let (mut stack, mut devices, first) =
            init_stages(&registrar, DEVCNT, BUFSIZE, &limit).unwrap();
        assert_eq!(devices.len(), DEVCNT as usize);
        assert_eq!(devices[3].devno(), first.offset(3));
        assert_eq!(limit.in_use(), array_bytes() + DEVCNT as usize * BUFSIZE);

        stack.unwind(&registrar, &mut devices, &limit);
        assert!(stack.stages().is_empty());
        assert!(devices.is_empty());
        assert_eq!(limit.in_use(), 0);
        assert!(registrar.is_clean());
    }

    #[test]
    fn test_registrar_faults_release_memory() {
        let mut faults = vec![
            Faults { region: true, ..Faults::default() },
            Faults { class: true, ..Faults::default() },
        ];
        for slot in 0..DEVCNT as usize {
            faults.push(Faults { device_create: Some(slot), ..Faults::default() });
            faults.push(Faults { cdev_add: Some(slot), ..Faults::default() });
        }

        for fault in faults {
            let registrar = MemRegistrar::with_faults(fault);
            let limit = MemoryLimit::unlimited();
            assert!(init_stages(&registrar, DEVCNT, BUFSIZE, &limit).is_err());
            assert_eq!(limit.in_use(), 0, "memory leaked after {:?}", fault);
            assert!(registrar.is_clean(), "registration leaked after {:?}", fault);
        }
    }

    #[test]
    fn test_queue_faults_release_memory() {
        for slot in 0..DEVCNT as usize {
            let registrar = MemRegistrar::new();
            let limit = MemoryLimit::new(array_bytes() + slot * BUFSIZE + BUFSIZE - 1);

            let err = init_stages(&registrar, DEVCNT, BUFSIZE, &limit).unwrap_err();
            assert_eq!(err, Error::QueueAllocationFailure { slot });
            assert_eq!(limit.in_use(), 0);
            assert!(registrar.is_clean());
        }
    }

    #[test]
    fn test_array_fault_touches_nothing() {
        let registrar = MemRegistrar::new();
        let limit = MemoryLimit::new(array_bytes() - 1);

        let err = init_stages(&registrar, DEVCNT, BUFSIZE, &limit).unwrap_err();
        assert_eq!(err, Error::AllocationFailure);
        assert_eq!(limit.in_use(), 0);
        assert!(registrar.journal().is_empty());
    }

    #[test]
    fn test_stage_ids() {
        let stages = [
            Stage::DeviceArray { bytes: 0 },
            Stage::Cdevs(Vec::new()),
            Stage::Fifos,
        ];
        let ids: Vec<u8> = stages.iter().map(|s| s.id() as u8).collect();
        assert_eq!(ids, [1, 5, 6]);
    }
}
