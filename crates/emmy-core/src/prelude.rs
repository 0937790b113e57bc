//! Common module for library exports

pub use crate::bootstrap::{
    BootstrapError, BootstrapReader, BootstrapResult, Lifecycle, Phase, SegmentName, SharedMemoryDescriptor,
    SharedSegment,
};
pub use crate::config::{EngineConfig, TransportConfig};
pub use crate::error::{EmmyError, EmmyResult};
pub use crate::sync::{Condvar, LockGuard, Mutex, UniqueLock};
pub use crate::types::{Address, ProcessId};
