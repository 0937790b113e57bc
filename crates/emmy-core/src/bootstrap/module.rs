//! Module base lookup.
//!
//! The relocation offset is measured from the base of the module that
//! contains the init routine. Inside the load handler Windows hands us that
//! base as the `HINSTANCE`; everywhere else we ask the loader which module
//! contains a given address.

use super::error::{BootstrapError, BootstrapResult};
use crate::types::Address;

/// Base load address of the module containing `addr`.
///
/// ## Platform-specific behavior
///
/// - **Unix**: `dladdr()` and its `dli_fbase`
/// - **Windows**: `GetModuleHandleExW` with `FROM_ADDRESS`, without touching
///   the module's reference count
///
/// ## Errors
///
/// - `ModuleBaseUnavailable`: no loaded module maps `addr`
#[cfg(unix)]
pub fn module_base_of(addr: Address) -> BootstrapResult<Address>
{
    // SAFETY: `Dl_info` is plain data, fully written by dladdr on success.
    let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
    let found = unsafe { libc::dladdr(addr.value() as usize as *const libc::c_void, &mut info) };
    if found == 0 || info.dli_fbase.is_null() {
        return Err(BootstrapError::ModuleBaseUnavailable(addr));
    }
    Ok(Address::of_ptr(info.dli_fbase.cast_const()))
}

/// Base load address of the module containing `addr`.
///
/// ## Platform-specific behavior
///
/// - **Unix**: `dladdr()` and its `dli_fbase`
/// - **Windows**: `GetModuleHandleExW` with `FROM_ADDRESS`, without touching
///   the module's reference count
///
/// ## Errors
///
/// - `ModuleBaseUnavailable`: no loaded module maps `addr`
#[cfg(windows)]
pub fn module_base_of(addr: Address) -> BootstrapResult<Address>
{
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HMODULE;
    use windows::Win32::System::LibraryLoader::{
        GetModuleHandleExW, GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
    };

    let mut module = HMODULE::default();
    // SAFETY: with FROM_ADDRESS the "name" argument is an address inside the module.
    let found = unsafe {
        GetModuleHandleExW(
            GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
            PCWSTR(addr.value() as usize as *const u16),
            &mut module,
        )
    };
    if found.is_err() || module.0 == 0 {
        return Err(BootstrapError::ModuleBaseUnavailable(addr));
    }
    Ok(Address::new(module.0 as usize as u64))
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn marker() -> u32
    {
        7
    }

    #[test]
    fn test_module_base_precedes_function()
    {
        let entry = Address::of_ptr(marker as fn() -> u32 as *const ());
        let base = module_base_of(entry).unwrap();
        assert!(base <= entry);
        assert!(!base.is_null());
    }

    #[test]
    fn test_functions_in_one_module_share_a_base()
    {
        let first = module_base_of(Address::of_ptr(marker as fn() -> u32 as *const ())).unwrap();
        let second = module_base_of(Address::of_ptr(
            test_module_base_precedes_function as fn() as *const (),
        ))
        .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unmapped_address_has_no_module()
    {
        assert!(matches!(
            module_base_of(Address::new(0x10)),
            Err(BootstrapError::ModuleBaseUnavailable(_))
        ));
    }
}
