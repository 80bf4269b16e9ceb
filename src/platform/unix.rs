// Linux / BSD platform facts from the kernel

#![cfg(not(any(target_os = "windows", target_os = "macos")))]

use std::process::Command;

use minorgate_shared::PlatformInfo;

pub struct UnixInfo;

impl PlatformInfo for UnixInfo {
    fn os_name(&self) -> String {
        match std::env::consts::OS {
            "linux" => "Linux".into(),
            "freebsd" => "FreeBSD".into(),
            "openbsd" => "OpenBSD".into(),
            "netbsd" => "NetBSD".into(),
            other => other.into(),
        }
    }

    fn abi(&self) -> String {
        super::abi()
    }

    fn os_version(&self) -> Option<String> {
        let release = kernel_release()?;
        Some(format!("{} {}", self.os_name(), release))
    }
}

fn kernel_release() -> Option<String> {
    if let Ok(release) = std::fs::read_to_string("/proc/sys/kernel/osrelease") {
        let release = release.trim();
        if !release.is_empty() {
            return Some(release.to_string());
        }
    }

    let output = Command::new("uname").arg("-r").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let release = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!release.is_empty()).then_some(release)
}
