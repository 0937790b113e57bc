//! # emmy-core
//!
//! Synchronization primitives and process bootstrap for the Emmy in-process
//! debugger engine.
//!
//! This crate provides the pieces that must work before any debugging can
//! happen:
//! - One lock/condition-variable vocabulary across Windows and Unix ([`sync`])
//! - The shared-memory descriptor that tells an injector where the engine's
//!   init routine landed ([`bootstrap`])
//! - The two-phase announce/initialize lifecycle that keeps the load handler
//!   legal under the OS loader lock
//! - Environment-driven engine configuration ([`config`])
//!
//! ## Platform Support
//!
//! - **Windows**: SRW locks, named file mappings, `GetModuleHandleExW`
//! - **Linux / macOS**: `std::sync`, POSIX shared memory, `dladdr`
//!
//! ## Why unsafe code is needed
//!
//! Mapping shared memory, asking the loader about module bases and wrapping
//! native locks all go through C APIs. We wrap these calls in safe
//! abstractions, but the calls themselves must be `unsafe`.

#![allow(unsafe_code)] // Required for shm/mmap, file mappings, SRW locks and dladdr

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod prelude;
pub mod sync;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, TransportConfig};
pub use error::{EmmyError, EmmyResult};
pub use types::{Address, ProcessId};
