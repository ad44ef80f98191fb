//! Configurations for the host environment.
//! The values live in `flags.json` at the repository root and are turned into
//! constants by the build script, one module per section.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

include!(concat!(env!("OUT_DIR"), "/build_flags.rs"));
