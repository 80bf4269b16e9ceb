//! Downloading the update descriptor into a local file.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};

/// Retrieves `source` into `destination`, replacing any existing file.
/// Resolves once the transfer is complete.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()>;
}

/// Blocking HTTP fetcher, run on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("MinorGate/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &str, destination: &Path) -> Result<()> {
        let agent = self.agent.clone();
        let source = source.to_string();
        let destination = destination.to_path_buf();

        tokio::task::spawn_blocking(move || download(&agent, &source, &destination))
            .await
            .map_err(|e| Error::Fetch(format!("download task failed: {}", e)))?
    }
}

fn download(agent: &ureq::Agent, source: &str, destination: &Path) -> Result<()> {
    let response = agent
        .get(source)
        .set("Accept", "application/xml, text/xml")
        .set("Cache-Control", "no-cache")
        .call()
        .map_err(|e| Error::Fetch(e.to_string()))?;

    let expected = response
        .header("Content-Length")
        .and_then(|v| v.trim().parse::<u64>().ok());

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    // Write next to the destination and rename, so readers never see a
    // half-written descriptor under the real name.
    let partial = partial_path(destination);
    let received = {
        let mut reader = response.into_reader();
        let mut file = File::create(&partial)?;
        let n = io::copy(&mut reader, &mut file)?;
        file.flush()?;
        n
    };

    if let Some(expected) = expected {
        if received < expected {
            let _ = fs::remove_file(&partial);
            return Err(Error::IncompleteDownload { received, expected });
        }
    }

    fs::rename(&partial, destination)?;
    tracing::debug!("Saved {} bytes from {} to {:?}", received, source, destination);
    Ok(())
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
