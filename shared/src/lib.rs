//! Platform-agnostic core of minorgate: descriptor cache, parser, URL
//! builder and the update gate that ties them together.

pub mod cache;
pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod fetcher;
pub mod prefs;
pub mod update_url;
pub mod updater;

pub use cache::DescriptorCache;
pub use config::{GateConfig, Timing};
pub use context::{OsFamily, PlatformInfo, RuntimeContext};
pub use error::{Error, Result};
pub use fetcher::{Fetcher, HttpFetcher};
pub use prefs::{JsonPrefs, PrefStore};
pub use updater::{Decision, GateState, ManualUpdate, UpdateGate};
