//! # Process Bootstrap
//!
//! Hands the engine's init routine back to the injector across the
//! address-space gap.
//!
//! An injector cannot call a function inside another process without knowing
//! its address, and ASLR makes that address unpredictable. Inside the target
//! the module base is known, so the load handler publishes the *offset* of the
//! init routine from its module base. Outside, the injector learns the base
//! the loader used and adds the offset back:
//!
//! ```text
//! injector                         target (load handler)
//! --------                         ---------------------
//! SharedSegment::create(name)
//! inject library        ------->   SharedSegment::attach(name)
//!                                  zero segment
//!                                  offset = init_routine - module_base
//!                                  write {module_handle, offset}
//! BootstrapReader::read  <-------
//! entry = actual_base + offset
//! call entry remotely   ------->   init routine -> Lifecycle::initialize
//! ```
//!
//! ## Modules
//!
//! - [`name`]: allocation-free segment names
//! - [`segment`]: the mapped shared-memory region
//! - [`descriptor`]: the record layout and relocation math
//! - [`handoff`]: write-once / read-once access to the record
//! - [`lifecycle`]: the two-phase announce/initialize state machine
//! - [`module`]: module base lookup

pub mod descriptor;
pub mod error;
pub mod handoff;
pub mod lifecycle;
pub mod module;
pub mod name;
pub mod segment;

pub use descriptor::{SharedMemoryDescriptor, DESCRIPTOR_LEN, DESCRIPTOR_MAGIC, DESCRIPTOR_VERSION};
pub use error::{BootstrapError, BootstrapResult};
pub use handoff::{BootstrapReader, BootstrapWriter, HandoffRegion};
pub use lifecycle::{Lifecycle, Phase};
pub use module::module_base_of;
pub use name::{SegmentName, SEGMENT_PREFIX};
pub use segment::{SharedSegment, SEGMENT_SIZE};
