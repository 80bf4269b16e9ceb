// Platform facts for the update URL - one implementation per OS

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub mod unix;

use minorgate_shared::PlatformInfo;

/// `PlatformInfo` for the OS this binary was built for.
pub fn current() -> Box<dyn PlatformInfo> {
    #[cfg(target_os = "windows")]
    return Box::new(windows::WindowsInfo);
    #[cfg(target_os = "macos")]
    return Box::new(macos::MacInfo);
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    return Box::new(unix::UnixInfo);
}

/// Compiler-flavoured ABI string, e.g. `x86_64-msvc` or `aarch64-gcc3`.
pub fn abi() -> String {
    let toolchain = if cfg!(target_env = "msvc") {
        "msvc"
    } else {
        "gcc3"
    };
    format!("{}-{}", std::env::consts::ARCH, toolchain)
}
