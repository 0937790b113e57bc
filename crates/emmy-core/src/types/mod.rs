//! # Types
//!
//! Platform-agnostic types shared by the bootstrap and transport layers.
//!
//! The bootstrap layer talks about module bases, entry routines and the process
//! that announced them. Wrapping those in newtypes keeps byte offsets, raw
//! addresses and pids from being mixed up at the FFI seams.

pub mod address;
pub mod process;

// Re-export all public types
pub use address::Address;
pub use process::ProcessId;
