//! Load and unload handlers.
//!
//! These run under the OS loader lock. The announce path opens the segment,
//! writes the descriptor and returns: no allocation, no logging, no threads.
//! Everything else waits for [`emmy_startup`](crate::emmy_startup).

use emmy_core::bootstrap::{BootstrapResult, HandoffRegion, Lifecycle, SharedMemoryDescriptor};
use emmy_core::sync::Mutex;
use emmy_core::types::{Address, ProcessId};

use crate::error::HookError;

/// Address of the init routine inside this module.
pub(crate) fn startup_entry() -> Address
{
    Address::new(crate::emmy_startup as usize as u64)
}

/// Load-event announce. `opened` is the attached region and the module base,
/// or the error hit while obtaining them; a failure is recorded in the
/// lifecycle for [`claim`] to report. Returns `false` if the descriptor was not
/// published.
pub(crate) fn announce<R: HandoffRegion>(lifecycle: &Mutex<Lifecycle<R>>, opened: BootstrapResult<(R, Address)>) -> bool
{
    let mut lifecycle = lifecycle.lock();
    match opened {
        Ok((region, module_base)) => lifecycle
            .announce(region, module_base, startup_entry(), ProcessId::current())
            .is_ok(),
        Err(_) => {
            lifecycle.mark_failed();
            false
        }
    }
}

/// Claim the initialize phase; the lock is released before returning.
pub(crate) fn claim<R: HandoffRegion>(lifecycle: &Mutex<Lifecycle<R>>) -> Result<SharedMemoryDescriptor, HookError>
{
    Ok(lifecycle.lock().initialize()?)
}

/// Unload-event release.
#[cfg_attr(target_vendor = "apple", allow(dead_code))]
pub(crate) fn release<R: HandoffRegion>(lifecycle: &Mutex<Lifecycle<R>>)
{
    lifecycle.lock().release();
}

#[cfg(windows)]
#[cfg_attr(test, allow(unused_imports))]
pub(crate) mod dll
{
    use std::ffi::c_void;

    use emmy_core::bootstrap::{SegmentName, SharedSegment};
    use emmy_core::types::{Address, ProcessId};
    use windows::Win32::Foundation::{BOOL, HINSTANCE, TRUE};
    use windows::Win32::System::SystemServices::{DLL_PROCESS_ATTACH, DLL_PROCESS_DETACH};

    use crate::LIFECYCLE;

    /// Loader entry point. The `HINSTANCE` is the module base.
    #[cfg(not(test))]
    #[no_mangle]
    #[allow(non_snake_case)]
    pub extern "system" fn DllMain(module: HINSTANCE, reason: u32, _reserved: *mut c_void) -> BOOL
    {
        match reason {
            DLL_PROCESS_ATTACH => {
                let opened = SharedSegment::attach(SegmentName::for_process(ProcessId::current()))
                    .map(|segment| (segment, Address::new(module.0 as u64)));
                BOOL::from(super::announce(&LIFECYCLE, opened))
            }
            DLL_PROCESS_DETACH => {
                super::release(&LIFECYCLE);
                TRUE
            }
            _ => TRUE,
        }
    }
}

#[cfg(unix)]
#[cfg_attr(test, allow(dead_code))]
pub(crate) mod ctor
{
    use emmy_core::bootstrap::{module_base_of, SegmentName, SharedSegment};
    use emmy_core::types::ProcessId;

    use crate::LIFECYCLE;

    /// A constructor cannot fail `dlopen`, so a failed announce is only
    /// recorded; `emmy_startup` reports it to the injector.
    extern "C" fn on_load()
    {
        let opened = module_base_of(super::startup_entry()).and_then(|base| {
            SharedSegment::attach(SegmentName::for_process(ProcessId::current())).map(|segment| (segment, base))
        });
        super::announce(&LIFECYCLE, opened);
    }

    #[cfg_attr(target_vendor = "apple", allow(dead_code))]
    extern "C" fn on_unload()
    {
        super::release(&LIFECYCLE);
    }

    #[cfg(not(test))]
    #[used]
    #[cfg_attr(any(target_os = "linux", target_os = "android", target_os = "freebsd"), link_section = ".init_array")]
    #[cfg_attr(target_vendor = "apple", link_section = "__DATA,__mod_init_func")]
    static ON_LOAD: extern "C" fn() = on_load;

    // Apple's linker no longer honours termination sections; the segment
    // handle is released with the process there.
    #[cfg(all(not(test), any(target_os = "linux", target_os = "android", target_os = "freebsd")))]
    #[used]
    #[link_section = ".fini_array"]
    static ON_UNLOAD: extern "C" fn() = on_unload;
}

#[cfg(test)]
mod tests
{
    use emmy_core::bootstrap::{BootstrapError, BootstrapReader, Phase, SegmentName, SEGMENT_SIZE};

    use super::*;
    use crate::error::StartupStatus;

    #[test]
    fn test_announce_publishes_startup_offset()
    {
        let lifecycle: Mutex<Lifecycle<Vec<u8>>> = Mutex::new(Lifecycle::new());
        let entry = startup_entry();
        let base = Address::new(entry.value() - 0x1000);

        assert!(announce(&lifecycle, Ok((vec![0u8; SEGMENT_SIZE], base))));
        let descriptor = lifecycle.lock().descriptor().unwrap();
        assert_eq!(descriptor.init_entry_offset, 0x1000);
        assert_eq!(descriptor.entry_address(base).unwrap(), entry);

        // Still loaded: a second announce is refused.
        assert!(!announce(&lifecycle, Ok((vec![0u8; SEGMENT_SIZE], base))));
    }

    #[test]
    fn test_announce_rejects_base_above_entry()
    {
        let lifecycle: Mutex<Lifecycle<Vec<u8>>> = Mutex::new(Lifecycle::new());
        let base = Address::new(startup_entry().value() + 1);
        assert!(!announce(&lifecycle, Ok((vec![0u8; SEGMENT_SIZE], base))));
        assert_eq!(lifecycle.lock().phase(), Phase::Failed);
    }

    #[test]
    fn test_missing_segment_is_reported_at_startup()
    {
        let lifecycle: Mutex<Lifecycle<Vec<u8>>> = Mutex::new(Lifecycle::new());
        let missing = Err(BootstrapError::SegmentOpen {
            name: SegmentName::for_process(ProcessId::current()),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });

        assert!(!announce(&lifecycle, missing));
        assert_eq!(lifecycle.lock().phase(), Phase::Failed);

        let err = claim(&lifecycle).unwrap_err();
        assert!(matches!(err, HookError::Bootstrap(BootstrapError::AnnounceFailed)));
        assert_eq!(StartupStatus::from(&err), StartupStatus::SegmentUnavailable);
        assert_ne!(StartupStatus::SegmentUnavailable.code(), StartupStatus::NotAnnounced.code());
    }

    #[test]
    fn test_claim_once_per_load()
    {
        let lifecycle: Mutex<Lifecycle<Vec<u8>>> = Mutex::new(Lifecycle::new());
        assert!(matches!(
            claim(&lifecycle),
            Err(HookError::Bootstrap(BootstrapError::NotAnnouncedYet))
        ));

        let base = Address::new(startup_entry().value() - 0x40);
        assert!(announce(&lifecycle, Ok((vec![0u8; SEGMENT_SIZE], base))));
        assert_eq!(claim(&lifecycle).unwrap().init_entry_offset, 0x40);
        assert!(matches!(
            claim(&lifecycle),
            Err(HookError::Bootstrap(BootstrapError::AlreadyInitialized))
        ));

        release(&lifecycle);
        assert_eq!(lifecycle.lock().phase(), Phase::Unloaded);
        assert!(announce(&lifecycle, Ok((vec![0u8; SEGMENT_SIZE], base))));
    }

    #[test]
    fn test_descriptor_readable_by_injector()
    {
        let base = Address::new(startup_entry().value() - 0x2f40);
        let mut region = vec![0u8; SEGMENT_SIZE];
        {
            let lifecycle: Mutex<Lifecycle<&mut Vec<u8>>> = Mutex::new(Lifecycle::new());
            assert!(announce(&lifecycle, Ok((&mut region, base))));
        }

        let descriptor = BootstrapReader::new(region).read().unwrap();
        assert_eq!(descriptor.module_handle, base);
        assert_eq!(descriptor.init_entry_offset, 0x2f40);
        assert_eq!(descriptor.process_id, ProcessId::current());
    }
}
