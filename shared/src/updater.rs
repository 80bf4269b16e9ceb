// Update gate: decides whether the host updater may run on its own

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::cache::DescriptorCache;
use crate::config::{GateConfig, Timing};
use crate::context::{OsFamily, RuntimeContext};
use crate::descriptor::{parse_candidate_version, same_major};
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;
use crate::prefs::{PrefStore, URL_OVERRIDE_PREF};
use crate::update_url;

/// Outcome of one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Leave the host's ordinary update check alone.
    ProceedNormal,
    /// Send the user through the explicit update flow.
    RedirectManual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Checking,
}

/// Host-side manual update flow.
pub trait ManualUpdate: Send + Sync {
    /// Whether an update UI surface is available to reopen.
    fn has_update_ui(&self) -> bool;
    fn open_update_ui(&self, window_features: &str);
    /// Ask the host updater to run its own background check.
    fn check_in_background(&self);
}

/// Window features for the update dialog on each OS family.
pub fn window_features(family: OsFamily) -> &'static str {
    match family {
        OsFamily::Windows => "chrome,centerscreen,dependent",
        OsFamily::Mac => "chrome,resizable=no,minimizable=no",
        OsFamily::Other => "chrome,centerscreen,dependent,dialog=no",
    }
}

/// Redirect only when the candidate shares the running major version.
/// An empty candidate always proceeds.
pub fn decide(current_version: &str, candidate_version: &str) -> Decision {
    if candidate_version.trim().is_empty() {
        return Decision::ProceedNormal;
    }
    if same_major(current_version, candidate_version) {
        Decision::RedirectManual
    } else {
        Decision::ProceedNormal
    }
}

pub struct UpdateGate {
    context: RuntimeContext,
    template: String,
    timing: Timing,
    cache: DescriptorCache,
    fetcher: Arc<dyn Fetcher>,
    prefs: Arc<dyn PrefStore>,
    manual: Arc<dyn ManualUpdate>,
    effective_url: OnceLock<String>,
    checking: Arc<AtomicBool>,
}

impl UpdateGate {
    pub fn new(
        config: &GateConfig,
        context: RuntimeContext,
        fetcher: Arc<dyn Fetcher>,
        prefs: Arc<dyn PrefStore>,
        manual: Arc<dyn ManualUpdate>,
    ) -> Self {
        let timing = config.timing();
        Self {
            context,
            template: config.update_url.clone(),
            timing,
            cache: DescriptorCache::new(config.cache_path(), timing.cache_lifetime),
            fetcher,
            prefs,
            manual,
            effective_url: OnceLock::new(),
            checking: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn state(&self) -> GateState {
        if self.checking.load(Ordering::SeqCst) {
            GateState::Checking
        } else {
            GateState::Idle
        }
    }

    pub fn cache(&self) -> &DescriptorCache {
        &self.cache
    }

    /// The substituted update URL, built on first use and reused after.
    pub fn effective_url(&self) -> Result<&str> {
        if let Some(url) = self.effective_url.get() {
            return Ok(url.as_str());
        }
        let url = update_url::build(&self.template, &self.context)?;
        Ok(self.effective_url.get_or_init(|| url).as_str())
    }

    /// Points the host updater at the cached descriptor. Returns whether the
    /// preference had to be written.
    pub fn install_override(&self) -> Result<bool> {
        let cache_url = ::url::Url::from_file_path(self.cache.path())
            .map_err(|_| Error::Config(format!("cache path {:?} is not absolute", self.cache.path())))?
            .to_string();

        match self.prefs.get(URL_OVERRIDE_PREF) {
            Ok(Some(current)) if current == cache_url => return Ok(false),
            Ok(_) => {}
            Err(e) => tracing::warn!("Cannot read {}: {}", URL_OVERRIDE_PREF, e),
        }

        self.prefs.set(URL_OVERRIDE_PREF, &cache_url)?;
        tracing::info!("Set {} to {}", URL_OVERRIDE_PREF, cache_url);
        Ok(true)
    }

    /// One-time startup: install the override and drop any descriptor left
    /// over from a previous run.
    pub async fn on_profile_ready(&self) {
        if let Err(e) = self.install_override() {
            tracing::error!("Failed to install update URL override: {}", e);
        }
        if let Err(e) = self.cache.invalidate().await {
            tracing::warn!("Failed to remove old cached descriptor: {}", e);
        }
    }

    /// Runs one check cycle and logs any failure. Never returns an error to
    /// the host.
    pub async fn on_check_start(&self) -> Option<Decision> {
        match self.check().await {
            Ok(decision) => Some(decision),
            Err(Error::CheckInFlight) => {
                tracing::warn!("Update check requested while another is running, ignoring");
                None
            }
            Err(e) => {
                tracing::error!("Update check abandoned: {}", e);
                None
            }
        }
    }

    /// Runs one check cycle: refresh the cache if stale, parse, decide, act.
    ///
    /// The cached descriptor is removed `invalidate_delay` after the cycle
    /// ends, whether it succeeded or not. Until then the gate reports
    /// [`GateState::Checking`] and rejects new cycles.
    pub async fn check(&self) -> Result<Decision> {
        let _cycle = CycleGuard::acquire(&self.checking, &self.cache, self.timing.invalidate_delay)
            .ok_or(Error::CheckInFlight)?;

        let decision = self.evaluate().await?;
        self.act(decision);
        Ok(decision)
    }

    async fn evaluate(&self) -> Result<Decision> {
        let url = self.effective_url()?;

        if self.cache.is_stale() {
            tracing::debug!("Cached descriptor is stale, fetching {}", url);
            self.cache.refresh(self.fetcher.as_ref(), url, &self.timing).await?;
        } else {
            tracing::debug!("Using fresh cached descriptor {:?}", self.cache.path());
        }

        let raw = self.cache.read().await?;
        let candidate = parse_candidate_version(&raw);
        let decision = decide(&self.context.version, &candidate);
        tracing::info!(
            "Running {}, candidate {:?}: {:?}",
            self.context.version,
            candidate,
            decision
        );
        Ok(decision)
    }

    fn act(&self, decision: Decision) {
        match decision {
            Decision::ProceedNormal => {}
            Decision::RedirectManual if self.manual.has_update_ui() => {
                let features = window_features(self.context.os_family());
                tracing::debug!("Reopening update UI with features {}", features);
                self.manual.open_update_ui(features);
            }
            Decision::RedirectManual => {
                tracing::debug!("No update UI open, asking host updater to check");
                self.manual.check_in_background();
            }
        }
    }
}

/// Holds the single-flight flag for one cycle. Dropping it, on success,
/// error or cancellation, schedules the cache invalidation and releases
/// the flag once that has run.
struct CycleGuard {
    flag: Arc<AtomicBool>,
    cache: DescriptorCache,
    delay: Duration,
}

impl CycleGuard {
    fn acquire(flag: &Arc<AtomicBool>, cache: &DescriptorCache, delay: Duration) -> Option<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(Self {
            flag: flag.clone(),
            cache: cache.clone(),
            delay,
        })
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        let flag = self.flag.clone();
        let cache = self.cache.clone();
        let delay = self.delay;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Err(e) = cache.invalidate().await {
                        tracing::warn!("Failed to invalidate cached descriptor: {}", e);
                    }
                    flag.store(false, Ordering::SeqCst);
                });
            }
            Err(_) => {
                if let Err(e) = remove_now(cache.path()) {
                    tracing::warn!("Failed to invalidate cached descriptor: {}", e);
                }
                flag.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Synchronous removal for when no runtime is left to defer to.
fn remove_now(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
