//! DevFS: the flat `/dev` namespace mapping node names to device numbers.
//!
//! Nodes are created out of band (`mknod`), never by drivers. A node only names a device
//! number; whether a driver serves it is decided when the node is opened.
use alloc::{boxed::Box, collections::BTreeMap, vec::Vec};
use config::chrdev::CHRDEV_MAJOR_MAX;
use spin::RwLock;

use crate::{
    dev::{DevNum, MINORMASK},
    error::{Errno, KResult},
};

pub const DEV_PREFIX: &str = "/dev/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    pub name: Box<str>,
    pub devnum: DevNum,
}

pub struct DevFs {
    nodes: RwLock<BTreeMap<Box<str>, DevNum>>,
}

impl DevFs {
    pub const fn new() -> DevFs {
        DevFs {
            nodes: RwLock::new(BTreeMap::new()),
        }
    }

    /// Strip [DEV_PREFIX]; the rest must be a single non-empty component.
    fn node_name(path: &str) -> Option<&str> {
        path.strip_prefix(DEV_PREFIX)
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }

    /// Create a character node at `path`.
    ///
    /// Errors: [Errno::EINVAL] for a path outside `/dev` or an unrepresentable device number,
    /// [Errno::EEXIST] if the node is already there.
    pub fn mknod(&self, path: &str, devnum: DevNum) -> KResult<()> {
        let name = Self::node_name(path).ok_or(Errno::EINVAL)?;
        if devnum.major as usize >= CHRDEV_MAJOR_MAX || devnum.minor > MINORMASK {
            return Err(Errno::EINVAL);
        }
        let mut nodes = self.nodes.write();
        if nodes.contains_key(name) {
            return Err(Errno::EEXIST);
        }
        nodes.insert(Box::from(name), devnum);
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> KResult<()> {
        let name = Self::node_name(path).ok_or(Errno::ENOENT)?;
        self.nodes
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or(Errno::ENOENT)
    }

    pub fn lookup(&self, path: &str) -> KResult<DevNum> {
        let name = Self::node_name(path).ok_or(Errno::ENOENT)?;
        self.nodes.read().get(name).copied().ok_or(Errno::ENOENT)
    }

    /// All nodes, ordered by name.
    pub fn list(&self) -> Vec<DeviceNode> {
        self.nodes
            .read()
            .iter()
            .map(|(name, devnum)| DeviceNode {
                name: name.clone(),
                devnum: *devnum,
            })
            .collect()
    }
}

impl Default for DevFs {
    fn default() -> Self {
        Self::new()
    }
}
