//! The host a driver module is loaded into.
//!
//! [Kernel] ties the pieces together: the character device table drivers register with, the
//! `/dev` namespace, the open path that routes a node to its driver, and the set of loaded
//! modules.
//!
//! A module is unloaded by [Kernel::rmmod], by [Kernel::shutdown], or when the last handle to
//! the kernel is dropped. Open files on a module's devices hold the kernel, so that last drop
//! never finds a module in use.
use alloc::{string::String, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicU64, Ordering};

use log::warn;
use spin::Mutex;

use crate::{
    debug_ex,
    dev::{
        DevNum,
        chrdev::{ChrdevHost, ChrdevTable},
    },
    error::{Errno, KResult},
    fs::{DevFs, File, FileOperations, OpenFile, OpenFlags},
    module::{Module, ModuleInfo, ModuleInstance, ThisModule},
};

struct LoadedModule {
    name: &'static str,
    this: Arc<ThisModule>,
    instance: ModuleInstance,
}

pub struct Kernel {
    chrdevs: Arc<ChrdevTable>,
    devfs: DevFs,
    modules: Mutex<Vec<LoadedModule>>,
    next_file_id: AtomicU64,
}

impl Kernel {
    pub fn new() -> Arc<Kernel> {
        Arc::new(Kernel {
            chrdevs: Arc::new(ChrdevTable::new()),
            devfs: DevFs::new(),
            modules: Mutex::new(Vec::new()),
            next_file_id: AtomicU64::new(1),
        })
    }

    pub fn chrdevs(&self) -> &ChrdevTable {
        &self.chrdevs
    }

    pub fn devfs(&self) -> &DevFs {
        &self.devfs
    }

    /// Load a module.
    ///
    /// Errors: [Errno::EEXIST] if a module of that name is loaded, otherwise whatever the
    /// module's init returned. A failed init leaves nothing loaded.
    pub fn insmod(&self, info: &ModuleInfo) -> KResult<()> {
        if self.is_loaded(info.name) {
            warn!("insmod: module '{}' is already loaded", info.name);
            return Err(Errno::EEXIST);
        }
        debug_ex!("Loading module '{}'...", info.name);
        let this = Arc::new(ThisModule::new(info.name, self.chrdevs.clone()));
        let instance = (info.init)(&this)
            .inspect_err(|err| warn!("insmod: init of module '{}' failed: {}", info.name, err))?;

        let mut modules = self.modules.lock();
        if modules.iter().any(|module| module.name == info.name) {
            // Lost a race with a concurrent insmod; exit outside the lock.
            drop(modules);
            drop(instance);
            return Err(Errno::EEXIST);
        }
        modules.push(LoadedModule {
            name: info.name,
            this,
            instance,
        });
        debug_ex!("Module '{}' loaded.", info.name);
        Ok(())
    }

    /// Unload a module, running its exit.
    ///
    /// Errors: [Errno::ENOENT] if no such module is loaded, [Errno::EBUSY] while files opened
    /// on its devices are alive.
    pub fn rmmod(&self, name: &str) -> KResult<()> {
        let module = {
            let mut modules = self.modules.lock();
            let pos = modules
                .iter()
                .position(|module| module.name == name)
                .ok_or(Errno::ENOENT)?;
            let this = &modules[pos].this;
            this.usage().begin_unload().inspect_err(|_| {
                warn!(
                    "rmmod: module '{}' is in use by {} open files",
                    name,
                    this.usage().count()
                )
            })?;
            modules.remove(pos)
        };
        drop(module);
        debug_ex!("Module '{}' unloaded.", name);
        Ok(())
    }

    /// Unload every module that is not in use, most recently loaded first.
    ///
    /// Modules still in use stay loaded.
    pub fn shutdown(&self) {
        let modules = core::mem::take(&mut *self.modules.lock());
        let mut busy = Vec::new();
        for module in modules.into_iter().rev() {
            if module.this.usage().begin_unload().is_err() {
                warn!(
                    "shutdown: module '{}' is in use by {} open files",
                    module.name,
                    module.this.usage().count()
                );
                busy.push(module);
                continue;
            }
            debug_ex!("Unloading module '{}'...", module.name);
            drop(module);
        }
        if !busy.is_empty() {
            busy.reverse();
            let mut modules = self.modules.lock();
            busy.append(&mut modules);
            *modules = busy;
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.modules.lock().iter().any(|module| module.name == name)
    }

    /// Names of the loaded modules in load order.
    pub fn loaded_modules(&self) -> Vec<&'static str> {
        self.modules.lock().iter().map(|module| module.name).collect()
    }

    /// Run `f` on the loaded module `name` if it is of type `M`.
    ///
    /// The module list stays locked while `f` runs; do not load or unload from inside it.
    pub fn with_module<M: Module, R>(&self, name: &str, f: impl FnOnce(&M) -> R) -> Option<R> {
        let modules = self.modules.lock();
        modules
            .iter()
            .find(|module| module.name == name)
            .and_then(|module| module.instance.downcast_ref::<M>())
            .map(f)
    }

    pub fn mknod(&self, path: &str, devnum: DevNum) -> KResult<()> {
        self.devfs.mknod(path, devnum)
    }

    pub fn unlink(&self, path: &str) -> KResult<()> {
        self.devfs.unlink(path)
    }

    /// Open a device node.
    ///
    /// Errors: [Errno::ENOENT] without a node at `path`, [Errno::ENXIO] when no driver serves
    /// its device number or its module is being unloaded, [Errno::EINVAL] for an invalid access
    /// mode, or the driver's `open` error.
    pub fn open(self: &Arc<Self>, path: &str, flags: OpenFlags) -> KResult<OpenFile> {
        let devnum = self.devfs.lookup(path)?;
        let (fops, owner) = self.chrdevs.resolve(devnum).ok_or(Errno::ENXIO)?;
        let owner = match owner {
            Some(usage) => Some(usage.try_get(self).ok_or(Errno::ENXIO)?),
            None => None,
        };
        let id = self.next_file_id.fetch_add(1, Ordering::Relaxed);
        let file = File::new(id, path, devnum, flags)?;
        OpenFile::open(file, fops, owner)
    }

    /// Registered character majors, like the "Character devices" part of `/proc/devices`.
    pub fn proc_devices(&self) -> Vec<(u32, String)> {
        self.chrdevs.registered()
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Registrations made directly on the kernel belong to no module.
impl ChrdevHost for Kernel {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> KResult<u32> {
        self.chrdevs.register_chrdev(major, name, fops)
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.chrdevs.unregister_chrdev(major, name)
    }
}
