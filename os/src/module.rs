//! Loadable module lifecycle.
//!
//! A module is a value: [Module::init] builds it when the module is inserted and dropping it is
//! the module's exit. The [Kernel] keeps the value alive in between.
//!
//! Every module gets a [ThisModule] handle to register its devices through. Devices registered
//! that way are owned by the module: each file opened on them holds a [ModuleRef], and the
//! module cannot be unloaded while any is alive. Once unloading has started no new reference is
//! handed out, so no callback of a module runs after its exit began.
use alloc::{boxed::Box, sync::Arc};
use core::{
    any::Any,
    sync::atomic::{AtomicUsize, Ordering},
};

use crate::{
    dev::chrdev::{ChrdevHost, ChrdevTable},
    error::{Errno, KResult},
    fs::FileOperations,
    kernel::Kernel,
};

/// Trait implemented by modules.
///
/// `init` may register with the kernel and must undo nothing on failure other than what it
/// already acquired; resources are expected to live in the returned value so that `Drop`
/// releases them.
pub trait Module: Sized + Send + Sync + 'static {
    fn init(module: &Arc<ThisModule>) -> KResult<Self>;
}

/// A loaded module, type-erased.
pub type ModuleInstance = Box<dyn Any + Send + Sync>;

/// Static description of a module, produced by [kernel_module](crate::kernel_module).
pub struct ModuleInfo {
    pub name: &'static str,
    pub init: fn(module: &Arc<ThisModule>) -> KResult<ModuleInstance>,
}

pub fn init_boxed<M: Module>(module: &Arc<ThisModule>) -> KResult<ModuleInstance> {
    Ok(Box::new(M::init(module)?))
}

/// Set in [ModuleUsage] once unloading has begun.
const MODULE_GOING: usize = 1 << (usize::BITS - 1);

/// Reference count of a module plus its "going" state, in one word.
pub struct ModuleUsage {
    refcnt: AtomicUsize,
}

impl ModuleUsage {
    const fn new() -> ModuleUsage {
        ModuleUsage {
            refcnt: AtomicUsize::new(0),
        }
    }

    /// Take a reference unless the module is being unloaded.
    ///
    /// The reference also pins `kernel`, so the kernel outlives every file that keeps one of
    /// its modules busy.
    pub(crate) fn try_get(self: &Arc<Self>, kernel: &Arc<Kernel>) -> Option<ModuleRef> {
        self.refcnt
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cnt| {
                (cnt & MODULE_GOING == 0).then_some(cnt + 1)
            })
            .ok()?;
        Some(ModuleRef {
            usage: self.clone(),
            _kernel: kernel.clone(),
        })
    }

    /// Mark the module as going. Fails with [Errno::EBUSY] while references are held.
    pub(crate) fn begin_unload(&self) -> KResult<()> {
        self.refcnt
            .compare_exchange(0, MODULE_GOING, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| Errno::EBUSY)
    }

    /// Number of references currently held.
    pub fn count(&self) -> usize {
        self.refcnt.load(Ordering::Acquire) & !MODULE_GOING
    }
}

/// A counted reference to a module, dropped when the file holding it is released.
pub struct ModuleRef {
    usage: Arc<ModuleUsage>,
    _kernel: Arc<Kernel>,
}

impl Drop for ModuleRef {
    fn drop(&mut self) {
        self.usage.refcnt.fetch_sub(1, Ordering::AcqRel);
    }
}

/// The handle a module registers its devices through.
///
/// It reaches the character device table directly rather than through the [Kernel], so a
/// module's exit can still unregister while the kernel itself is being dropped.
pub struct ThisModule {
    name: &'static str,
    chrdevs: Arc<ChrdevTable>,
    usage: Arc<ModuleUsage>,
}

impl ThisModule {
    pub(crate) fn new(name: &'static str, chrdevs: Arc<ChrdevTable>) -> ThisModule {
        ThisModule {
            name,
            chrdevs,
            usage: Arc::new(ModuleUsage::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn usage(&self) -> &ModuleUsage {
        &self.usage
    }
}

impl ChrdevHost for ThisModule {
    fn register_chrdev(
        &self,
        major: u32,
        name: &str,
        fops: Arc<dyn FileOperations>,
    ) -> KResult<u32> {
        self.chrdevs
            .register_owned_chrdev(major, name, fops, self.usage.clone())
    }

    fn unregister_chrdev(&self, major: u32, name: &str) {
        self.chrdevs.unregister_chrdev(major, name)
    }
}

/// Declare the module of a crate as `pub static __MODULE`.
///
/// ```ignore
/// kernel_module! {
///     type: MyModule,
///     name: "my_module",
/// }
/// ```
#[macro_export]
macro_rules! kernel_module {
    { type: $module:ty, name: $name:literal $(,)? } => {
        pub static __MODULE: $crate::module::ModuleInfo = $crate::module::ModuleInfo {
            name: $name,
            init: $crate::module::init_boxed::<$module>,
        };
    };
}
