use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

/// Name of the cached descriptor inside the profile directory.
pub const CACHE_FILE_NAME: &str = "update.xml";

/// Gate configuration stored in JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Update URL template with `%PLACEHOLDER%` tokens
    pub update_url: String,
    pub product: String,
    /// Version of the running host application
    pub app_version: String,
    pub build_id: String,
    pub platform_version: String,
    pub channel: String,
    /// Falls back to the system locale when unset
    pub locale: Option<String>,
    pub distribution_id: Option<String>,
    pub distribution_version: Option<String>,
    /// Widget library appended to the OS version, e.g. `GTK 3.24`
    pub secondary_library: Option<String>,
    /// Directory holding the cached descriptor and preferences
    pub profile_dir: Option<PathBuf>,
    pub cache_lifetime_secs: u64,
    pub invalidate_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub check_interval_secs: u64,
    /// Page opened for the manual update flow
    pub manual_update_url: Option<String>,
    /// Command line that asks the host updater for a background check
    pub background_check_command: Vec<String>,
    pub log_level: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            update_url: "https://aus3.mozilla.org/update/3/%PRODUCT%/%VERSION%/%BUILD_ID%/%BUILD_TARGET%/%LOCALE%/%CHANNEL%/%OS_VERSION%/%DISTRIBUTION%/%DISTRIBUTION_VERSION%/update.xml".into(),
            product: "Firefox".into(),
            app_version: "0.0".into(),
            build_id: "0".into(),
            platform_version: "0.0".into(),
            channel: "release".into(),
            locale: None,
            distribution_id: None,
            distribution_version: None,
            secondary_library: None,
            profile_dir: None,
            cache_lifetime_secs: 30 * 60,
            invalidate_delay_ms: 5000,
            fetch_timeout_secs: 30,
            poll_interval_ms: 100,
            check_interval_secs: 12 * 60 * 60,
            manual_update_url: None,
            background_check_command: Vec::new(),
            log_level: "info".into(),
        }
    }
}

/// Durations the gate works with, derived from [`GateConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub cache_lifetime: Duration,
    pub invalidate_delay: Duration,
    pub fetch_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        GateConfig::default().timing()
    }
}

impl GateConfig {
    pub fn timing(&self) -> Timing {
        Timing {
            cache_lifetime: Duration::from_secs(self.cache_lifetime_secs),
            invalidate_delay: Duration::from_millis(self.invalidate_delay_ms),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(default_profile_dir)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.profile_dir().join(CACHE_FILE_NAME)
    }
}

fn default_profile_dir() -> PathBuf {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("MinorGate")
}

pub fn config_path() -> PathBuf {
    let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("MinorGate").join("config.json")
}

/// Loads the config at `path`. A missing file yields the defaults; a
/// malformed one is an error so a typo never silently resets the gate.
pub fn load_config(path: &Path) -> Result<GateConfig> {
    if !path.exists() {
        return Ok(GateConfig::default());
    }
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

pub fn save_config(path: &Path, config: &GateConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(config)?;
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.json")).unwrap();
        assert_eq!(cfg.cache_lifetime_secs, 1800);
        assert_eq!(cfg.channel, "release");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "app_version": "31.0", "locale": "de" }"#).unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.app_version, "31.0");
        assert_eq!(cfg.locale.as_deref(), Some("de"));
        assert_eq!(cfg.invalidate_delay_ms, 5000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let cfg = GateConfig {
            product: "App".into(),
            profile_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        save_config(&path, &cfg).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.product, "App");
        assert_eq!(loaded.cache_path(), dir.path().join(CACHE_FILE_NAME));
    }

    #[test]
    fn timing_defaults() {
        let t = Timing::default();
        assert_eq!(t.cache_lifetime, Duration::from_secs(30 * 60));
        assert_eq!(t.invalidate_delay, Duration::from_secs(5));
        assert_eq!(t.fetch_timeout, Duration::from_secs(30));
        assert_eq!(t.poll_interval, Duration::from_millis(100));
    }
}
