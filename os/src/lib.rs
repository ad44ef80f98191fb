//! Host environment for character device drivers.
//!
//! The crate plays the kernel a driver module is loaded into: it owns the
//! character device table, the `/dev` node namespace, the dispatch of open
//! files to driver callbacks and the module lifecycle. Diagnostics go through
//! the `log` facade into the console and the `dmesg` ring.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

#[macro_use]
pub mod console;
pub mod dev;
pub mod error;
pub mod fs;
pub mod kernel;
pub mod logging;
pub mod module;

pub use error::{Errno, KResult};
pub use kernel::Kernel;

#[doc(hidden)]
pub use log as __log;
