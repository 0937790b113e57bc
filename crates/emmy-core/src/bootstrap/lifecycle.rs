//! Two-phase engine lifecycle.
//!
//! The load event runs under the OS loader lock, where the runtime may not be
//! fully usable. Startup is therefore split:
//!
//! 1. **Announce** (load handler): open the segment, publish the descriptor,
//!    return. No allocation, no logging, no thread creation.
//! 2. **Initialize** (init routine, called later by the injector): everything
//!    heavy. Claimed exactly once.
//!
//! Unload releases the segment and nothing else; engine teardown belongs to
//! the session logic.
//!
//! ```text
//! Unloaded --announce--> Announced --initialize--> Initialized
//!  |  ^                      |                          |
//!  |  +-------release--------+----------release---------+
//!  |  |
//!  |  +-------release--------+
//!  +--announce fails--> Failed
//! ```
//!
//! A load handler that cannot reach the segment records [`Phase::Failed`], so
//! the init routine can tell "announce failed" apart from "never loaded".

use tracing::debug;

use super::descriptor::SharedMemoryDescriptor;
use super::error::{BootstrapError, BootstrapResult};
use super::handoff::{BootstrapWriter, HandoffRegion};
use super::segment::SharedSegment;
use crate::types::{Address, ProcessId};

/// Where the engine is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase
{
    /// Not loaded, or unloaded since
    Unloaded,
    /// Descriptor published, waiting for the init routine
    Announced,
    /// Init routine has run
    Initialized,
    /// The load handler could not publish a descriptor
    Failed,
}

/// Lifecycle state for one loaded instance of the engine.
///
/// `new` is `const` so the hook library can keep it in a `static` without any
/// runtime construction.
pub struct Lifecycle<R: HandoffRegion = SharedSegment>
{
    phase: Phase,
    region: Option<R>,
    descriptor: Option<SharedMemoryDescriptor>,
}

impl<R: HandoffRegion> Lifecycle<R>
{
    /// Lifecycle in the [`Phase::Unloaded`] state.
    pub const fn new() -> Self
    {
        Self {
            phase: Phase::Unloaded,
            region: None,
            descriptor: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase
    {
        self.phase
    }

    /// Descriptor published by the last announce, if still loaded.
    pub fn descriptor(&self) -> Option<SharedMemoryDescriptor>
    {
        self.descriptor
    }

    /// Load-event phase: publish the descriptor into `region` and keep the
    /// region open until [`Lifecycle::release`].
    ///
    /// Allocation-free on the success path.
    ///
    /// ## Errors
    ///
    /// - `AlreadyAnnounced`: announced before without an intervening release
    /// - `EntryBeforeBase` / `SegmentTooSmall`: from the descriptor write; the
    ///   lifecycle moves to [`Phase::Failed`]
    pub fn announce(
        &mut self,
        mut region: R,
        module_handle: Address,
        init_entry: Address,
        process_id: ProcessId,
    ) -> BootstrapResult<SharedMemoryDescriptor>
    {
        if !matches!(self.phase, Phase::Unloaded | Phase::Failed) {
            return Err(BootstrapError::AlreadyAnnounced);
        }

        let descriptor = match BootstrapWriter::new(&mut region).announce(module_handle, init_entry, process_id) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.mark_failed();
                return Err(e);
            }
        };
        self.region = Some(region);
        self.descriptor = Some(descriptor);
        self.phase = Phase::Announced;
        Ok(descriptor)
    }

    /// Record that the load handler could not announce, e.g. because the
    /// segment was missing. Allocation-free.
    pub fn mark_failed(&mut self)
    {
        self.region = None;
        self.descriptor = None;
        self.phase = Phase::Failed;
    }

    /// Claim the deferred initialize phase.
    ///
    /// Returns the announced descriptor; the caller performs the heavy setup
    /// after this returns, outside any lock guarding the lifecycle.
    ///
    /// ## Errors
    ///
    /// - `NotAnnouncedYet`: no descriptor was published
    /// - `AnnounceFailed`: the load handler tried and failed to publish
    /// - `AlreadyInitialized`: a previous call already claimed the phase
    pub fn initialize(&mut self) -> BootstrapResult<SharedMemoryDescriptor>
    {
        match self.phase {
            Phase::Unloaded => Err(BootstrapError::NotAnnouncedYet),
            Phase::Failed => Err(BootstrapError::AnnounceFailed),
            Phase::Initialized => Err(BootstrapError::AlreadyInitialized),
            Phase::Announced => {
                let descriptor = self.descriptor.ok_or(BootstrapError::NotAnnouncedYet)?;
                self.phase = Phase::Initialized;
                debug!(
                    module_handle = %descriptor.module_handle,
                    offset = descriptor.init_entry_offset,
                    "Initialize phase claimed"
                );
                Ok(descriptor)
            }
        }
    }

    /// Unload-event phase: drop the region handle.
    ///
    /// Returns the descriptor of the released load instance.
    pub fn release(&mut self) -> Option<SharedMemoryDescriptor>
    {
        self.region = None;
        self.phase = Phase::Unloaded;
        self.descriptor.take()
    }
}

impl<R: HandoffRegion> Default for Lifecycle<R>
{
    fn default() -> Self
    {
        Self::new()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::bootstrap::segment::SEGMENT_SIZE;

    fn region() -> Vec<u8>
    {
        vec![0u8; SEGMENT_SIZE]
    }

    #[test]
    fn test_phases_in_order()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        assert_eq!(lifecycle.phase(), Phase::Unloaded);

        let announced = lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap();
        assert_eq!(lifecycle.phase(), Phase::Announced);

        let initialized = lifecycle.initialize().unwrap();
        assert_eq!(initialized, announced);
        assert_eq!(lifecycle.phase(), Phase::Initialized);
    }

    #[test]
    fn test_initialize_requires_announce()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        assert!(matches!(lifecycle.initialize(), Err(BootstrapError::NotAnnouncedYet)));
    }

    #[test]
    fn test_initialize_runs_once()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap();
        lifecycle.initialize().unwrap();
        assert!(matches!(lifecycle.initialize(), Err(BootstrapError::AlreadyInitialized)));
    }

    #[test]
    fn test_second_announce_without_release_is_rejected()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap();

        let err = lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1080), ProcessId::from(3))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::AlreadyAnnounced));
        assert_eq!(lifecycle.descriptor().unwrap().init_entry_offset, 0x40);
    }

    #[test]
    fn test_failed_announce_is_distinguishable()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        lifecycle.mark_failed();
        assert_eq!(lifecycle.phase(), Phase::Failed);
        assert!(matches!(lifecycle.initialize(), Err(BootstrapError::AnnounceFailed)));

        lifecycle.release();
        assert!(matches!(lifecycle.initialize(), Err(BootstrapError::NotAnnouncedYet)));
    }

    #[test]
    fn test_bad_descriptor_write_marks_failed()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        let err = lifecycle
            .announce(vec![0u8; 8], Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap_err();
        assert!(matches!(err, BootstrapError::SegmentTooSmall { .. }));
        assert_eq!(lifecycle.phase(), Phase::Failed);

        // A later successful announce recovers.
        lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap();
        assert_eq!(lifecycle.phase(), Phase::Announced);
    }

    #[test]
    fn test_reload_after_release()
    {
        let mut lifecycle: Lifecycle<Vec<u8>> = Lifecycle::new();
        lifecycle
            .announce(region(), Address::new(0x1000), Address::new(0x1040), ProcessId::from(3))
            .unwrap();
        lifecycle.initialize().unwrap();

        let released = lifecycle.release().unwrap();
        assert_eq!(released.module_handle, Address::new(0x1000));
        assert_eq!(lifecycle.phase(), Phase::Unloaded);
        assert!(lifecycle.descriptor().is_none());

        // Loaded again at a different base: a fresh descriptor is allowed.
        let reloaded = lifecycle
            .announce(region(), Address::new(0x9000), Address::new(0x9040), ProcessId::from(3))
            .unwrap();
        assert_eq!(reloaded.init_entry_offset, 0x40);
        assert_eq!(lifecycle.initialize().unwrap(), reloaded);
    }
}
