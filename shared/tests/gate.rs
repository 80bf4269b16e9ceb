use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use minorgate_shared::prefs::URL_OVERRIDE_PREF;
use minorgate_shared::{
    Decision, Error, Fetcher, GateConfig, GateState, ManualUpdate, PrefStore, Result,
    RuntimeContext, UpdateGate,
};
use tempfile::TempDir;

const INVALIDATE_MS: u64 = 50;

fn descriptor(version: &str) -> String {
    format!(
        r#"<?xml version="1.0"?>
<updates>
  <update type="minor" displayVersion="{v}" version="{v}" buildID="20140101000000"/>
</updates>"#,
        v = version
    )
}

struct FakeFetcher {
    body: String,
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
}

impl FakeFetcher {
    fn serving(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            delay: Duration::ZERO,
            fail: false,
            calls: AtomicUsize::new(0),
            urls: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::serving("")
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(source.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            std::fs::write(destination, "<updates><upd")?;
            return Err(Error::Fetch("connection reset".into()));
        }
        std::fs::write(destination, &self.body)?;
        Ok(())
    }
}

#[derive(Default)]
struct FakeManual {
    has_ui: bool,
    opened: Mutex<Vec<String>>,
    background: AtomicUsize,
}

impl ManualUpdate for FakeManual {
    fn has_update_ui(&self) -> bool {
        self.has_ui
    }

    fn open_update_ui(&self, window_features: &str) {
        self.opened.lock().unwrap().push(window_features.to_string());
    }

    fn check_in_background(&self) {
        self.background.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakePrefs {
    value: Mutex<Option<String>>,
    writes: AtomicUsize,
    broken_reads: AtomicBool,
}

impl PrefStore for FakePrefs {
    fn get(&self, key: &str) -> Result<Option<String>> {
        assert_eq!(key, URL_OVERRIDE_PREF);
        if self.broken_reads.load(Ordering::SeqCst) {
            return Err(Error::Config("unreadable".into()));
        }
        Ok(self.value.lock().unwrap().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        assert_eq!(key, URL_OVERRIDE_PREF);
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.value.lock().unwrap() = Some(value.to_string());
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    gate: UpdateGate,
    fetcher: Arc<FakeFetcher>,
    manual: Arc<FakeManual>,
    prefs: Arc<FakePrefs>,
}

fn config(dir: &TempDir, running: &str) -> GateConfig {
    GateConfig {
        update_url: "http://updates.test/%PRODUCT%/%VERSION%/%DISTRIBUTION%/update.xml".into(),
        product: "App".into(),
        app_version: running.into(),
        locale: Some("en-US".into()),
        profile_dir: Some(dir.path().to_path_buf()),
        invalidate_delay_ms: INVALIDATE_MS,
        fetch_timeout_secs: 2,
        poll_interval_ms: 5,
        ..Default::default()
    }
}

fn context(cfg: &GateConfig) -> RuntimeContext {
    RuntimeContext {
        product: cfg.product.clone(),
        version: cfg.app_version.clone(),
        build_id: cfg.build_id.clone(),
        os: "Linux".into(),
        abi: "x86_64-gcc3".into(),
        os_version: "Linux 6.1".into(),
        locale: cfg.locale.clone(),
        channel: cfg.channel.clone(),
        platform_version: cfg.platform_version.clone(),
        distribution_id: "default".into(),
        distribution_version: "default".into(),
    }
}

fn harness_with(running: &str, fetcher: FakeFetcher, manual: FakeManual) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(&dir, running);
    let fetcher = Arc::new(fetcher);
    let manual = Arc::new(manual);
    let prefs = Arc::new(FakePrefs::default());
    let gate = UpdateGate::new(
        &cfg,
        context(&cfg),
        fetcher.clone(),
        prefs.clone(),
        manual.clone(),
    );
    Harness {
        dir,
        gate,
        fetcher,
        manual,
        prefs,
    }
}

fn harness(running: &str, served: &str) -> Harness {
    harness_with(running, FakeFetcher::serving(descriptor(served)), FakeManual::default())
}

async fn wait_for_invalidation() {
    tokio::time::sleep(Duration::from_millis(INVALIDATE_MS * 4)).await;
}

#[tokio::test]
async fn stale_cache_fetches_once_and_redirects_same_major() {
    let h = harness("31.0", "31.2");

    let decision = h.gate.check().await.unwrap();

    assert_eq!(decision, Decision::RedirectManual);
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.manual.background.load(Ordering::SeqCst), 1);
    assert!(h.manual.opened.lock().unwrap().is_empty());
    assert_eq!(
        h.fetcher.urls.lock().unwrap().as_slice(),
        ["http://updates.test/App/31.0/default/update.xml?force=1"]
    );
}

#[tokio::test]
async fn aged_cache_is_fetched_once_and_replaced() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = GateConfig {
        cache_lifetime_secs: 0,
        ..config(&dir, "31.0")
    };
    let fetcher = Arc::new(FakeFetcher::serving(descriptor("31.4")));
    let manual = Arc::new(FakeManual::default());
    let gate = UpdateGate::new(
        &cfg,
        context(&cfg),
        fetcher.clone(),
        Arc::new(FakePrefs::default()),
        manual.clone(),
    );
    std::fs::write(gate.cache().path(), descriptor("32.0")).unwrap();
    assert!(gate.cache().is_stale());

    assert_eq!(gate.check().await.unwrap(), Decision::RedirectManual);
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(manual.background.load(Ordering::SeqCst), 1);

    let content = std::fs::read_to_string(gate.cache().path()).unwrap();
    assert!(content.contains(r#"version="31.4""#));
    assert!(!content.contains("32.0"));
}

#[tokio::test]
async fn fresh_cache_skips_fetch() {
    let h = harness("31.0", "99.0");
    std::fs::write(h.gate.cache().path(), descriptor("32.0")).unwrap();

    let decision = h.gate.check().await.unwrap();

    assert_eq!(decision, Decision::ProceedNormal);
    assert_eq!(h.fetcher.calls(), 0);
}

#[tokio::test]
async fn different_major_proceeds_without_manual_flow() {
    let h = harness("31.0", "32.0");

    assert_eq!(h.gate.check().await.unwrap(), Decision::ProceedNormal);
    assert_eq!(h.manual.background.load(Ordering::SeqCst), 0);
    assert!(h.manual.opened.lock().unwrap().is_empty());
}

#[tokio::test]
async fn open_update_ui_gets_platform_features() {
    let manual = FakeManual {
        has_ui: true,
        ..Default::default()
    };
    let h = harness_with("24.0", FakeFetcher::serving(descriptor("24.8.1")), manual);

    assert_eq!(h.gate.check().await.unwrap(), Decision::RedirectManual);
    assert_eq!(
        h.manual.opened.lock().unwrap().as_slice(),
        ["chrome,centerscreen,dependent,dialog=no"]
    );
    assert_eq!(h.manual.background.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unparseable_descriptor_fails_open() {
    let h = harness_with(
        "31.0",
        FakeFetcher::serving("<updates><update version=\"31.5\">"),
        FakeManual::default(),
    );

    assert_eq!(h.gate.check().await.unwrap(), Decision::ProceedNormal);

    let h = harness_with("31.0", FakeFetcher::serving("<updates/>"), FakeManual::default());
    assert_eq!(h.gate.on_check_start().await, Some(Decision::ProceedNormal));
}

#[tokio::test]
async fn cache_is_removed_after_delay() {
    let h = harness("31.0", "31.2");
    let path = h.gate.cache().path().to_path_buf();

    h.gate.check().await.unwrap();
    assert!(path.exists());
    assert_eq!(h.gate.state(), GateState::Checking);

    wait_for_invalidation().await;
    assert!(!path.exists());
    assert_eq!(h.gate.state(), GateState::Idle);
}

#[tokio::test]
async fn fetch_error_abandons_cycle_and_still_cleans_up() {
    let h = harness_with("31.0", FakeFetcher::failing(), FakeManual::default());
    let path = h.gate.cache().path().to_path_buf();

    assert!(matches!(h.gate.check().await, Err(Error::Fetch(_))));
    assert!(path.exists(), "partial download is left until invalidation");

    wait_for_invalidation().await;
    assert!(!path.exists());
    assert_eq!(h.gate.state(), GateState::Idle);

    assert_eq!(h.gate.on_check_start().await, None);
    assert_eq!(h.fetcher.calls(), 2);
    assert_eq!(h.manual.background.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn overlapping_check_is_rejected() {
    let mut fetcher = FakeFetcher::serving(descriptor("31.2"));
    fetcher.delay = Duration::from_millis(100);
    let h = harness_with("31.0", fetcher, FakeManual::default());

    let (first, second) = tokio::join!(h.gate.check(), h.gate.check());

    assert_eq!(first.unwrap(), Decision::RedirectManual);
    assert!(matches!(second, Err(Error::CheckInFlight)));
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn check_during_pending_invalidation_is_rejected() {
    let h = harness("31.0", "32.0");

    h.gate.check().await.unwrap();
    assert!(matches!(h.gate.check().await, Err(Error::CheckInFlight)));

    wait_for_invalidation().await;
    assert_eq!(h.gate.check().await.unwrap(), Decision::ProceedNormal);
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn missing_locale_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = config(&dir, "31.0");
    cfg.update_url = "http://updates.test/%LOCALE%/update.xml".into();
    let mut ctx = context(&cfg);
    ctx.locale = None;
    let fetcher = Arc::new(FakeFetcher::serving(descriptor("31.2")));
    let gate = UpdateGate::new(
        &cfg,
        ctx,
        fetcher.clone(),
        Arc::new(FakePrefs::default()),
        Arc::new(FakeManual::default()),
    );

    assert!(matches!(gate.check().await, Err(Error::Config(_))));
    assert_eq!(fetcher.calls(), 0);
}

#[tokio::test]
async fn override_is_written_once() {
    let h = harness("31.0", "31.2");

    assert!(h.gate.install_override().unwrap());
    assert!(!h.gate.install_override().unwrap());
    assert_eq!(h.prefs.writes.load(Ordering::SeqCst), 1);

    let value = h.prefs.value.lock().unwrap().clone().unwrap();
    assert!(value.starts_with("file://"));
    assert!(value.ends_with("/update.xml"));
}

#[tokio::test]
async fn unreadable_override_is_rewritten() {
    let h = harness("31.0", "31.2");
    h.prefs.broken_reads.store(true, Ordering::SeqCst);

    assert!(h.gate.install_override().unwrap());
    assert_eq!(h.prefs.writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn profile_ready_installs_override_and_clears_leftover_cache() {
    let h = harness("31.0", "31.2");
    let leftover = h.dir.path().join("update.xml");
    std::fs::write(&leftover, descriptor("31.1")).unwrap();

    h.gate.on_profile_ready().await;

    assert!(!leftover.exists());
    assert_eq!(h.prefs.writes.load(Ordering::SeqCst), 1);
    assert_eq!(h.gate.state(), GateState::Idle);
}

#[tokio::test]
async fn effective_url_is_reused() {
    let h = harness("31.0", "31.2");
    let first = h.gate.effective_url().unwrap().to_string();
    assert_eq!(h.gate.effective_url().unwrap(), first);
    assert!(first.ends_with("?force=1"));
}
