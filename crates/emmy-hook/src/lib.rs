//! # emmy-hook
//!
//! The dynamic library an injector loads into a target process.
//!
//! ## Startup sequence
//!
//! 1. **Load event** ([`loader`]): the library opens the bootstrap segment
//!    named after its process id and publishes where [`emmy_startup`] lives,
//!    relative to the module base. Nothing else happens under the loader lock.
//! 2. **Injector**: reads the descriptor, adds the offset to the base it saw
//!    the library load at, and calls the result on a thread of its own.
//! 3. **[`emmy_startup`]**: claims the initialize phase exactly once, starts
//!    file logging and connects the engine to the front-end pipe named by
//!    `EMMY_PIPE_NAME`.
//! 4. **Unload event**: releases the segment handle.
//!
//! ## Exports
//!
//! - `emmy_startup`: thread-start compatible init routine; its return value is
//!   a [`StartupStatus`] code
//! - `DllMain` on Windows; `.init_array` / `.fini_array` entries elsewhere

#![allow(unsafe_code)] // Required for the loader entry points and init sections

pub mod engine;
pub mod error;
mod loader;

use std::ffi::c_void;
use std::panic;

use emmy_core::bootstrap::Lifecycle;
use emmy_core::sync::Mutex;
use emmy_core::EngineConfig;
use tracing::{info, warn};

pub use engine::{engine, Engine};
pub use error::{HookError, StartupStatus};

/// Lifecycle of this load instance. Constant-initialized, so the load handler
/// never constructs anything.
pub(crate) static LIFECYCLE: Mutex<Lifecycle> = Mutex::new(Lifecycle::new());

/// Init routine called by the injector once the library is loaded.
///
/// Shaped like a thread start routine so it can be the target of a remote
/// thread directly. The parameter is ignored.
#[no_mangle]
pub extern "system" fn emmy_startup(_param: *mut c_void) -> u32
{
    let status = match panic::catch_unwind(startup) {
        Ok(Ok(())) => StartupStatus::Started,
        Ok(Err(e)) => {
            warn!(error = %e, "Engine startup refused");
            StartupStatus::from(&e)
        }
        Err(_) => StartupStatus::Panicked,
    };
    status.code()
}

fn startup() -> Result<(), HookError>
{
    let descriptor = loader::claim(&LIFECYCLE)?;

    // The host may already own the global subscriber; then we log through it.
    let log_file = emmy_utils::init_logging_to_file(None).ok();

    info!(
        pid = %descriptor.process_id,
        module_handle = %descriptor.module_handle,
        offset = descriptor.init_entry_offset,
        log_file = ?log_file,
        "Emmy engine starting"
    );

    let config = EngineConfig::from_env()?;
    let engine = engine::install(Engine::start(config)?)?;
    info!(pipe = %engine.config().pipe_name, "Engine connecting to front-end");
    Ok(())
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_startup_before_announce_is_refused()
    {
        // Unit tests are not loaded through the loader, so nothing announced.
        assert_eq!(emmy_startup(std::ptr::null_mut()), StartupStatus::NotAnnounced.code());
        assert!(engine().is_none());
    }
}
