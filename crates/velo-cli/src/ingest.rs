//! Downloads raw snapshots into the dated layout.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Serialize, Serializer};
use tracing::{error, info};
use velo_core::source::{SnapshotLayout, Source};

use crate::settings::Settings;

/// Result of fetching one source.
#[derive(Debug, Serialize)]
pub struct FetchOutcome {
  pub source: Source,
  #[serde(serialize_with = "message")]
  pub result: Result<PathBuf>,
}

impl FetchOutcome {
  pub fn is_success(&self) -> bool { self.result.is_ok() }
}

/// HTTP fetcher for the raw feeds.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct Ingestor {
  client: Client,
  layout: SnapshotLayout,
}

impl Ingestor {
  pub fn new(layout: SnapshotLayout) -> Result<Self> {
    let client = Client::builder()
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, layout })
  }

  /// Fetch every source in turn. A failed fetch is reported and the next
  /// source is still attempted.
  pub async fn fetch_all(
    &self,
    settings: &Settings,
    sources: &[Source],
    date: NaiveDate,
  ) -> Vec<FetchOutcome> {
    let mut outcomes = Vec::with_capacity(sources.len());
    for &source in sources {
      let result = self.fetch(source, settings.url_for(source), date).await;
      match &result {
        Ok(path) => info!(%source, path = %path.display(), "snapshot saved"),
        Err(e) => error!(%source, error = %format!("{e:#}"), "fetch failed"),
      }
      outcomes.push(FetchOutcome { source, result });
    }
    outcomes
  }

  /// `GET url` and write the body verbatim to the layout path of `source`.
  pub async fn fetch(&self, source: Source, url: &str, date: NaiveDate) -> Result<PathBuf> {
    let resp = self
      .client
      .get(url)
      .send()
      .await
      .with_context(|| format!("GET {url} failed"))?;

    if !resp.status().is_success() {
      return Err(anyhow!("GET {url} → {}", resp.status()));
    }
    let body = resp
      .bytes()
      .await
      .with_context(|| format!("reading body of {url}"))?;

    let path = self.layout.path(source, date);
    save(&path, &body).await?;
    Ok(path)
  }
}

async fn save(path: &Path, body: &[u8]) -> Result<()> {
  if let Some(dir) = path.parent() {
    tokio::fs::create_dir_all(dir)
      .await
      .with_context(|| format!("creating {}", dir.display()))?;
  }
  tokio::fs::write(path, body)
    .await
    .with_context(|| format!("writing {}", path.display()))
}

fn message<S: Serializer>(result: &Result<PathBuf>, s: S) -> Result<S::Ok, S::Error> {
  match result {
    Ok(path) => s.collect_str(&format_args!("saved {}", path.display())),
    Err(e) => s.collect_str(&format_args!("failed: {e:#}")),
  }
}
