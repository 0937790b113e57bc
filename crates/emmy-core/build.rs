//! Build script for emmy-core
//!
//! This script checks system requirements before compilation:
//! - Minimum Rust version (`std::sync::OnceLock`, `io::Error::other`)
//! - Platform support for the bootstrap segment backends
//!
//! ## Requirements
//!
//! - **Rust**: 1.74.0 or newer
//! - **Unix**: POSIX shared memory (`shm_open`) and `dladdr`
//! - **Windows**: file mappings and SRW locks (Windows Vista+)

fn main()
{
    let min_rust_version = rustc_version::Version::new(1, 74, 0);

    if let Ok(rustc_version) = rustc_version::version() {
        if rustc_version < min_rust_version {
            panic!(
                "emmy-core requires Rust {} or newer, found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    check_platform();
}

fn check_platform()
{
    let family = std::env::var("CARGO_CFG_TARGET_FAMILY").unwrap_or_default();
    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    let supported = family.split(',').any(|f| f == "unix" || f == "windows");
    if !supported {
        println!("cargo:warning=emmy-core has no bootstrap backend for target os '{os}'");
    }
}
