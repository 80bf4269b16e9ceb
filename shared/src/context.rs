//! Runtime facts the gate needs about the host application and the OS.
//!
//! Everything is resolved once at startup into a [`RuntimeContext`] that
//! the gate owns, instead of being looked up lazily on each check.

use crate::config::GateConfig;

/// Fallback for distribution id/version when the host has none.
pub const DEFAULT_DISTRIBUTION: &str = "default";

/// Normalized facts about the running OS.
///
/// Implementations hide native calls and struct layouts behind plain
/// strings.
pub trait PlatformInfo {
    /// Host OS identifier, e.g. `WINNT`, `Darwin` or `Linux`.
    fn os_name(&self) -> String;
    /// CPU/compiler ABI, e.g. `x86_64-msvc`.
    fn abi(&self) -> String;
    /// Human readable OS version, `None` when it cannot be determined.
    fn os_version(&self) -> Option<String>;
    /// Secondary widget library such as `GTK 3.24`, where the OS has one.
    fn secondary_library(&self) -> Option<String> {
        None
    }
}

/// OS families that get distinct update-window features.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Mac,
    Other,
}

impl OsFamily {
    pub fn from_os_name(os: &str) -> Self {
        let os = os.to_ascii_lowercase();
        if os.starts_with("win") {
            Self::Windows
        } else if os.contains("darwin") || os.contains("mac") {
            Self::Mac
        } else {
            Self::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Windows => "windows",
            Self::Mac => "mac",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContext {
    pub product: String,
    pub version: String,
    pub build_id: String,
    pub os: String,
    pub abi: String,
    pub os_version: String,
    pub locale: Option<String>,
    pub channel: String,
    pub platform_version: String,
    pub distribution_id: String,
    pub distribution_version: String,
}

impl RuntimeContext {
    /// Combines the host configuration with what the platform reports.
    pub fn detect(config: &GateConfig, platform: &dyn PlatformInfo) -> Self {
        let locale = config
            .locale
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(sys_locale::get_locale);

        Self {
            product: config.product.clone(),
            version: config.app_version.clone(),
            build_id: config.build_id.clone(),
            os: platform.os_name(),
            abi: platform.abi(),
            os_version: os_version(config, platform),
            locale,
            channel: config.channel.clone(),
            platform_version: config.platform_version.clone(),
            distribution_id: distribution_value(config.distribution_id.as_deref()),
            distribution_version: distribution_value(config.distribution_version.as_deref()),
        }
    }

    /// `%BUILD_TARGET%` value: OS and ABI joined by an underscore.
    pub fn build_target(&self) -> String {
        format!("{}_{}", self.os, self.abi)
    }

    pub fn os_family(&self) -> OsFamily {
        OsFamily::from_os_name(&self.os)
    }
}

/// OS version with the widget library appended in parentheses, when known.
fn os_version(config: &GateConfig, platform: &dyn PlatformInfo) -> String {
    let Some(mut version) = platform.os_version().filter(|v| !v.is_empty()) else {
        return String::new();
    };
    let library = config
        .secondary_library
        .clone()
        .filter(|l| !l.trim().is_empty())
        .or_else(|| platform.secondary_library());
    if let Some(library) = library {
        version.push_str(&format!(" ({})", library));
    }
    version
}

fn distribution_value(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => DEFAULT_DISTRIBUTION.to_string(),
    }
}
