//! `MY_CHAR_Device`: a character device whose callbacks only report that they ran.
//!
//! Loading the module registers the device under a dynamically assigned major number and logs
//! the `mknod` command that creates its node. Reads always end the stream; writes accept
//! everything and keep nothing.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod fops;
mod registrar;

use alloc::sync::Arc;

use os::{
    KResult, kernel_module,
    module::{Module, ThisModule},
};

pub use fops::MyCharOps;
pub use registrar::{DeviceConfig, DeviceRegistrar, DeviceRegistration, RegistrationError};

pub const DEVICE_NAME: &str = "MY_CHAR_Device";

pub struct MyCharModule {
    registrar: DeviceRegistrar,
}

impl MyCharModule {
    pub fn registration(&self) -> DeviceRegistration {
        self.registrar.registration()
    }
}

impl Module for MyCharModule {
    fn init(module: &Arc<ThisModule>) -> KResult<Self> {
        let registrar = DeviceRegistrar::initialize(
            module.clone(),
            DeviceConfig::dynamic(DEVICE_NAME),
            Arc::new(MyCharOps),
        )?;
        Ok(MyCharModule { registrar })
    }
}

kernel_module! {
    type: MyCharModule,
    name: "my_char",
}
