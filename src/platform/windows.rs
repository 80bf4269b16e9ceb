// Windows platform facts: version, service pack and native architecture

#![cfg(target_os = "windows")]

use minorgate_shared::PlatformInfo;
use windows::Win32::System::SystemInformation::{
    GetNativeSystemInfo, GetVersionExW, OSVERSIONINFOEXW, OSVERSIONINFOW,
    PROCESSOR_ARCHITECTURE_AMD64, PROCESSOR_ARCHITECTURE_ARM64, PROCESSOR_ARCHITECTURE_IA64,
    PROCESSOR_ARCHITECTURE_INTEL, SYSTEM_INFO,
};

pub struct WindowsInfo;

impl PlatformInfo for WindowsInfo {
    fn os_name(&self) -> String {
        "WINNT".into()
    }

    fn abi(&self) -> String {
        super::abi()
    }

    /// `Windows_NT <major>.<minor>.<sp major>.<sp minor> (<arch>)`
    fn os_version(&self) -> Option<String> {
        let info = version_info()?;
        Some(format!(
            "Windows_NT {}.{}.{}.{} ({})",
            info.dwMajorVersion,
            info.dwMinorVersion,
            info.wServicePackMajor,
            info.wServicePackMinor,
            native_arch()
        ))
    }
}

fn version_info() -> Option<OSVERSIONINFOEXW> {
    let mut info = OSVERSIONINFOEXW {
        dwOSVersionInfoSize: std::mem::size_of::<OSVERSIONINFOEXW>() as u32,
        ..Default::default()
    };
    // OSVERSIONINFOEXW starts with the OSVERSIONINFOW layout.
    let ok = unsafe { GetVersionExW(&mut info as *mut OSVERSIONINFOEXW as *mut OSVERSIONINFOW) };
    ok.ok().map(|_| info)
}

fn native_arch() -> &'static str {
    let mut info = SYSTEM_INFO::default();
    unsafe { GetNativeSystemInfo(&mut info) };
    let arch = unsafe { info.Anonymous.Anonymous.wProcessorArchitecture };
    match arch {
        PROCESSOR_ARCHITECTURE_AMD64 => "x64",
        PROCESSOR_ARCHITECTURE_IA64 => "IA64",
        PROCESSOR_ARCHITECTURE_INTEL => "x86",
        PROCESSOR_ARCHITECTURE_ARM64 => "ARM64",
        _ => "unknown",
    }
}
