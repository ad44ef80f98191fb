//! Character device table: the host side of `register_chrdev` / `unregister_chrdev`.
//!
//! Responsibilities:
//! - Hand out major numbers, either the one a driver asks for or a free one from the dynamic
//!   ranges (scanned top-down, like Linux does).
//! - Keep each registered minor range together with the driver's [FileOperations] so that
//!   opening a device node can be routed to its driver via [ChrdevTable::lookup].
//!
//! Ownership and concurrency notes:
//! - Regions are kept behind an [RwLock]: every open performs a lookup, registrations are rare.
//! - The table holds one `Arc` of the callbacks per region. A region registered through a
//!   module's handle also records the module's usage count, which the open path takes so the
//!   module cannot go away under an open file.
use alloc::{boxed::Box, string::String, sync::Arc, vec::Vec};
use config::chrdev::{
    CHRDEV_MAJOR_DYN_END, CHRDEV_MAJOR_DYN_EXT_END, CHRDEV_MAJOR_DYN_EXT_START,
    CHRDEV_MAJOR_DYN_START, CHRDEV_MAJOR_MAX, CHRDEV_MINOR_COUNT,
};
use log::{error, warn};
use spin::RwLock;

use crate::{
    debug_ex,
    dev::{DevNum, MINORMASK},
    error::{Errno, KResult},
    fs::FileOperations,
    module::ModuleUsage,
};

/// Registration primitives a driver sees.
///
/// `major == 0` asks the host to pick a free major. On success the major actually in use is
/// returned, for static requests as well.
pub trait ChrdevHost: Send + Sync {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> KResult<u32>;
    fn unregister_chrdev(&self, major: u32, name: &str);
}

struct ChrdevRegion {
    major: u32,
    baseminor: u32,
    count: u32,
    name: Box<str>,
    fops: Arc<dyn FileOperations>,
    owner: Option<Arc<ModuleUsage>>,
}

impl ChrdevRegion {
    fn contains(&self, dev: DevNum) -> bool {
        dev.major == self.major
            && dev.minor >= self.baseminor
            && dev.minor - self.baseminor < self.count
    }

    fn overlaps(&self, major: u32, baseminor: u32, count: u32) -> bool {
        major == self.major
            && baseminor < self.baseminor + self.count
            && self.baseminor < baseminor + count
    }
}

pub struct ChrdevTable {
    regions: RwLock<Vec<ChrdevRegion>>,
}

impl ChrdevTable {
    pub const fn new() -> ChrdevTable {
        ChrdevTable {
            regions: RwLock::new(Vec::new()),
        }
    }

    /// Register `count` minors starting at `baseminor` under `major`.
    ///
    /// Errors:
    /// - [Errno::EINVAL]: `major` is not below `CHRDEV_MAJOR_MAX`, or the minor range is empty
    ///   or does not fit into [MINORMASK].
    /// - [Errno::EBUSY]: the range overlaps a registered one, or no dynamic major is left.
    pub fn register_region(
        &self,
        major: u32,
        baseminor: u32,
        count: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> KResult<u32> {
        self.add_region(major, baseminor, count, name, fops, None)
    }

    /// [ChrdevHost::register_chrdev] on behalf of the module counted by `owner`.
    pub(crate) fn register_owned_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
        owner: Arc<ModuleUsage>,
    ) -> KResult<u32> {
        self.add_region(major, 0, CHRDEV_MINOR_COUNT as u32, name, fops, Some(owner))
    }

    fn add_region(
        &self,
        major: u32,
        baseminor: u32,
        count: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
        owner: Option<Arc<ModuleUsage>>,
    ) -> KResult<u32> {
        if major as usize >= CHRDEV_MAJOR_MAX {
            error!(
                "CHRDEV \"{}\" major requested ({}) is greater than the maximum ({})",
                name,
                major,
                CHRDEV_MAJOR_MAX - 1
            );
            return Err(Errno::EINVAL);
        }
        let last_minor = baseminor
            .checked_add(count)
            .and_then(|end| end.checked_sub(1))
            .ok_or(Errno::EINVAL)?;
        if count == 0 || last_minor > MINORMASK {
            return Err(Errno::EINVAL);
        }

        let mut regions = self.regions.write();
        let major = if major == 0 {
            Self::find_dynamic_major(&regions).inspect_err(|_| {
                error!("CHRDEV \"{}\" dynamic allocation region is full", name)
            })?
        } else {
            major
        };
        if regions
            .iter()
            .any(|region| region.overlaps(major, baseminor, count))
        {
            return Err(Errno::EBUSY);
        }
        regions.push(ChrdevRegion {
            major,
            baseminor,
            count,
            name: Box::from(name),
            fops,
            owner,
        });
        debug_ex!(
            "\tRegistered chrdev '{}' at {}..={}.",
            name,
            DevNum::new(major, baseminor),
            DevNum::new(major, last_minor)
        );
        Ok(major)
    }

    fn find_dynamic_major(regions: &[ChrdevRegion]) -> KResult<u32> {
        let in_use = |major: u32| regions.iter().any(|region| region.major == major);
        (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
            .rev()
            .chain((CHRDEV_MAJOR_DYN_EXT_END..=CHRDEV_MAJOR_DYN_EXT_START).rev())
            .map(|major| major as u32)
            .find(|major| !in_use(*major))
            .ok_or(Errno::EBUSY)
    }

    /// Remove the region registered exactly as `(major, baseminor, count)`.
    ///
    /// Return whether a region was removed. The name is only checked for diagnostics.
    pub fn unregister_region(&self, major: u32, baseminor: u32, count: u32, name: &str) -> bool {
        let mut regions = self.regions.write();
        let Some(pos) = regions.iter().position(|region| {
            region.major == major && region.baseminor == baseminor && region.count == count
        }) else {
            warn!(
                "CHRDEV \"{}\": no region at {} with {} minors to unregister",
                name,
                DevNum::new(major, baseminor),
                count
            );
            return false;
        };
        let region = regions.remove(pos);
        if &*region.name != name {
            warn!(
                "CHRDEV \"{}\" unregistered under the name \"{}\"",
                region.name, name
            );
        }
        debug_ex!("\tUnregistered chrdev '{}' (major {}).", region.name, major);
        true
    }

    /// Find the callbacks serving `dev`.
    pub fn lookup(&self, dev: DevNum) -> Option<Arc<dyn FileOperations>> {
        self.resolve(dev).map(|(fops, _)| fops)
    }

    /// Find the callbacks serving `dev` and the usage count of the module owning them.
    pub(crate) fn resolve(
        &self,
        dev: DevNum,
    ) -> Option<(Arc<dyn FileOperations>, Option<Arc<ModuleUsage>>)> {
        let guard = self.regions.read();
        guard
            .iter()
            .find(|region| region.contains(dev))
            .map(|region| (region.fops.clone(), region.owner.clone()))
    }

    /// `(major, name)` of every region, ordered by major, like `/proc/devices`.
    pub fn registered(&self) -> Vec<(u32, String)> {
        let guard = self.regions.read();
        let mut res: Vec<(u32, String)> = guard
            .iter()
            .map(|region| (region.major, String::from(&*region.name)))
            .collect();
        res.sort();
        res
    }
}

impl Default for ChrdevTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ChrdevHost for ChrdevTable {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> KResult<u32> {
        self.register_region(major, 0, CHRDEV_MINOR_COUNT as u32, name, fops)
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.unregister_region(major, 0, CHRDEV_MINOR_COUNT as u32, name);
    }
}
