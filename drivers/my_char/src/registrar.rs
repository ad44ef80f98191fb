//! Registration lifecycle of the device.
//!
//! [DeviceRegistrar::initialize] is the module's init half and dropping the registrar (or
//! calling [DeviceRegistrar::teardown]) is its exit half. The major number lives only inside
//! the registrar, so exit always unregisters exactly what init registered.
use alloc::sync::Arc;
use core::fmt::{Display, Formatter};

use log::{error, info};
use os::{
    Errno,
    dev::chrdev::ChrdevHost,
    error::MessageError,
    fs::FileOperations,
};

/// What to register: the device name and the major to ask for (`0` lets the host pick).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    pub name: &'static str,
    pub requested_major: u32,
}

impl DeviceConfig {
    pub const fn dynamic(name: &'static str) -> Self {
        Self {
            name,
            requested_major: 0,
        }
    }

    pub const fn fixed(name: &'static str, major: u32) -> Self {
        Self {
            name,
            requested_major: major,
        }
    }
}

/// The name and the major the host assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceRegistration {
    pub name: &'static str,
    pub major: u32,
}

/// The host refused the registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationError {
    pub name: &'static str,
    pub requested_major: u32,
    pub errno: Errno,
}

impl Display for RegistrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "registering \"{}\" (requested major {}) failed with {}",
            self.name,
            self.requested_major,
            self.errno.as_ret()
        )
    }
}

impl MessageError for RegistrationError {}

impl From<RegistrationError> for Errno {
    fn from(err: RegistrationError) -> Self {
        err.errno
    }
}

pub struct DeviceRegistrar {
    host: Arc<dyn ChrdevHost>,
    registration: DeviceRegistration,
}

impl DeviceRegistrar {
    /// Register `fops` under `config.name` with `host`.
    ///
    /// On failure nothing is registered, the error is logged and returned, and none of the
    /// device announcements are emitted.
    pub fn initialize(
        host: Arc<dyn ChrdevHost>,
        config: DeviceConfig,
        fops: Arc<dyn FileOperations>,
    ) -> Result<DeviceRegistrar, RegistrationError> {
        info!("Entering Test Character Driver");
        let major = host
            .register_chrdev(config.requested_major, config.name, fops)
            .map_err(|errno| {
                let err = RegistrationError {
                    name: config.name,
                    requested_major: config.requested_major,
                    errno,
                };
                error!("{}", err);
                err
            })?;
        info!("Major Number = {}", major);
        info!("Name = {}", config.name);
        info!(
            "Generate the device file with mknod /dev/{} c {} 0",
            config.name, major
        );
        Ok(DeviceRegistrar {
            host,
            registration: DeviceRegistration {
                name: config.name,
                major,
            },
        })
    }

    pub fn registration(&self) -> DeviceRegistration {
        self.registration
    }

    pub fn major(&self) -> u32 {
        self.registration.major
    }

    pub fn name(&self) -> &'static str {
        self.registration.name
    }

    /// Unregister now. Equivalent to dropping the registrar.
    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for DeviceRegistrar {
    fn drop(&mut self) {
        self.host
            .unregister_chrdev(self.registration.major, self.registration.name);
        info!("Exiting Test Character Driver");
    }
}
