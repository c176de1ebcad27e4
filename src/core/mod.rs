//! Core implementation
//!
//! Leaves first: byte sources and checksums, the container tree and the
//! codec contract, the Nitro cartridge engine, then the scheduler and the
//! batch driver working on top of them.

pub mod checksum;
pub mod edit;
pub mod error;
pub mod format;
pub mod io;
pub mod nitro;
pub mod project;
pub mod scheduler;
pub mod validation;
pub mod vfs;
pub mod worker;

pub use error::{Direction, NitroError, Result};
