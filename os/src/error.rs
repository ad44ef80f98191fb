//! Error numbers returned by host primitives, and traits for printing errors

use core::fmt::{Debug, Display, Write};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// An error that can be printed to a string device
pub trait MessageError: Debug {
    /// Print the error message to a writer
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        f.write_fmt(format_args!("{:?}", self))
    }
}

impl Display for dyn MessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}

/// Error numbers, with the values user space sees negated in return codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    EIO = 5,
    ENXIO = 6,
    EBADF = 9,
    ENOMEM = 12,
    EBUSY = 16,
    EEXIST = 17,
    ENODEV = 19,
    EINVAL = 22,
    ENOTTY = 25,
    ESPIPE = 29,
}

pub type KResult<T> = Result<T, Errno>;

impl Errno {
    /// The negative return code carrying this error.
    pub fn as_ret(self) -> isize {
        -(i32::from(self) as isize)
    }

    /// Split a raw return code into a count or an error.
    ///
    /// Negative codes without a matching [Errno] become [Errno::EINVAL].
    pub fn from_ret(ret: isize) -> KResult<usize> {
        if ret >= 0 {
            return Ok(ret as usize);
        }
        let code = i32::try_from(ret.unsigned_abs()).map_err(|_| Errno::EINVAL)?;
        Err(Errno::try_from(code).unwrap_or(Errno::EINVAL))
    }

    pub fn description(self) -> &'static str {
        match self {
            Errno::EPERM => "Operation not permitted",
            Errno::ENOENT => "No such file or directory",
            Errno::EIO => "Input/output error",
            Errno::ENXIO => "No such device or address",
            Errno::EBADF => "Bad file descriptor",
            Errno::ENOMEM => "Cannot allocate memory",
            Errno::EBUSY => "Device or resource busy",
            Errno::EEXIST => "File exists",
            Errno::ENODEV => "No such device",
            Errno::EINVAL => "Invalid argument",
            Errno::ENOTTY => "Inappropriate ioctl for device",
            Errno::ESPIPE => "Illegal seek",
        }
    }
}

impl MessageError for Errno {
    fn print_to_writer(&self, f: &mut dyn Write) -> core::fmt::Result {
        f.write_fmt(format_args!("{:?} ({})", self, self.description()))
    }
}

impl Display for Errno {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.print_to_writer(f)
    }
}
