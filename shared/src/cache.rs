//! On-disk copy of the update descriptor.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::config::Timing;
use crate::error::{Error, Result};
use crate::fetcher::Fetcher;

#[derive(Debug, Clone)]
pub struct DescriptorCache {
    path: PathBuf,
    lifetime: Duration,
}

impl DescriptorCache {
    pub fn new(path: impl Into<PathBuf>, lifetime: Duration) -> Self {
        Self {
            path: path.into(),
            lifetime,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when there is no cached file or it is at least `lifetime` old.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(SystemTime::now())
    }

    pub fn is_stale_at(&self, now: SystemTime) -> bool {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return true,
        };
        is_expired(modified, now, self.lifetime)
    }

    /// Downloads `url` over the cached file and waits until the new file is
    /// visible on disk. Bounded by `timing.fetch_timeout`.
    pub async fn refresh(&self, fetcher: &dyn Fetcher, url: &str, timing: &Timing) -> Result<()> {
        let work = async {
            fetcher.fetch(url, &self.path).await?;
            self.wait_until_visible(timing.poll_interval).await;
            Ok(())
        };

        match tokio::time::timeout(timing.fetch_timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(Error::FetchTimeout(timing.fetch_timeout)),
        }
    }

    async fn wait_until_visible(&self, poll_interval: Duration) {
        while !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            tracing::trace!("Waiting for {:?} to appear", self.path);
            tokio::time::sleep(poll_interval).await;
        }
    }

    pub async fn read(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::CacheRead {
                path: self.path.clone(),
                source,
            })
    }

    /// Removes the cached file. A file that is already gone is fine.
    pub async fn invalidate(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::debug!("Removed cached descriptor {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// `now - modified >= lifetime`; a timestamp in the future counts as fresh.
fn is_expired(modified: SystemTime, now: SystemTime, lifetime: Duration) -> bool {
    match now.duration_since(modified) {
        Ok(age) => age >= lifetime,
        Err(_) => false,
    }
}
