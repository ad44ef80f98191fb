//! Open files, the callback table drivers fill in, and the `/dev` node namespace

mod devfs;
mod file;
pub use devfs::*;
pub use file::*;
