// macOS platform facts via NSProcessInfo

#![cfg(target_os = "macos")]

use minorgate_shared::PlatformInfo;
use objc2_foundation::NSProcessInfo;

pub struct MacInfo;

impl PlatformInfo for MacInfo {
    fn os_name(&self) -> String {
        "Darwin".into()
    }

    fn abi(&self) -> String {
        super::abi()
    }

    fn os_version(&self) -> Option<String> {
        let info = NSProcessInfo::processInfo();
        let v = info.operatingSystemVersion();
        Some(format!(
            "Darwin {}.{}.{}",
            v.majorVersion, v.minorVersion, v.patchVersion
        ))
    }
}
