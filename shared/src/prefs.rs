use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Preference the host updater reads its update URL override from.
pub const URL_OVERRIDE_PREF: &str = "app.update.url.override";

/// File name of the JSON preference store inside the profile directory.
pub const PREFS_FILE_NAME: &str = "prefs.json";

/// String preferences shared with the host application.
pub trait PrefStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Flat `{ "key": "value" }` JSON file.
#[derive(Debug, Clone)]
pub struct JsonPrefs {
    path: PathBuf,
}

impl JsonPrefs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_profile(profile_dir: &Path) -> Self {
        Self::new(profile_dir.join(PREFS_FILE_NAME))
    }

    fn load(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl PrefStore for JsonPrefs {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut prefs = self.load()?;
        prefs.insert(key.to_string(), value.to_string());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&prefs)?)?;
        Ok(())
    }
}
