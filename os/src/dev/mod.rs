//! This module contains device numbers and the character device table drivers register with

pub mod chrdev;
mod devnum;
pub use devnum::*;
