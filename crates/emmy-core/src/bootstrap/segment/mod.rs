//! # Shared-Memory Segment
//!
//! The handoff channel between injector and target: a small named region both
//! processes map. Three ways to get one:
//!
//! | constructor | side     | if missing | on drop               |
//! |-------------|----------|------------|-----------------------|
//! | `create`    | injector | created    | unmap, remove name    |
//! | `attach`    | target   | error      | unmap                 |
//! | `open`      | reader   | error      | unmap                 |
//!
//! `attach` is what the load handler uses. It performs OS calls only (no heap
//! allocation, no logging) so it is legal under the loader lock.
//!
//! ## Backends
//!
//! - **Unix**: POSIX shared memory (`shm_open` + `ftruncate` + `mmap`) via `libc`
//!   - See: [shm_open(3)](https://man7.org/linux/man-pages/man3/shm_open.3.html)
//! - **Windows**: pagefile-backed file mappings (`CreateFileMappingW` +
//!   `MapViewOfFile`) in the session-local namespace
//!   - See: [Creating Named Shared Memory](https://learn.microsoft.com/en-us/windows/win32/memory/creating-named-shared-memory)

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::SharedSegment;
#[cfg(windows)]
pub use windows::SharedSegment;

/// Size of every bootstrap segment.
pub const SEGMENT_SIZE: usize = 4096;
