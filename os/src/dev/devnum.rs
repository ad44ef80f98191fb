use core::fmt::{Display, Formatter};

use config::dev::MINORBITS;

pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// A `major:minor` device number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevNum {
    pub major: u32,
    pub minor: u32,
}

impl DevNum {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Pack into the single-word form (`MKDEV`). Minor bits above [MINORMASK] are lost.
    pub const fn to_raw(self) -> u32 {
        (self.major << MINORBITS) | (self.minor & MINORMASK)
    }

    pub const fn from_raw(raw: u32) -> Self {
        Self {
            major: raw >> MINORBITS,
            minor: raw & MINORMASK,
        }
    }
}

impl Display for DevNum {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.major, self.minor)
    }
}
