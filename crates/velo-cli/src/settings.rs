//! Layered settings: built-in defaults, then the TOML file, then `VELO_*`
//! environment variables. Command-line flags are applied last by `main`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use velo_core::source::{SnapshotLayout, Source};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// SQLite database file.
  pub store_path:   PathBuf,
  /// Root of the dated raw snapshot directories.
  pub raw_data_dir: PathBuf,
  pub paris_url:    String,
  pub toulouse_url: String,
  pub city_url:     String,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      store_path:   PathBuf::from("velo.db"),
      raw_data_dir: PathBuf::from("data/raw"),
      paris_url:    Source::Paris.default_url().to_owned(),
      toulouse_url: Source::Toulouse.default_url().to_owned(),
      city_url:     Source::CityRegistry.default_url().to_owned(),
    }
  }
}

impl Settings {
  /// Read `file` (when it exists) and the environment over the defaults.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("VELO"))
      .build()
      .with_context(|| format!("failed to read config file {}", file.display()))?;

    settings
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn url_for(&self, source: Source) -> &str {
    match source {
      Source::Paris => &self.paris_url,
      Source::Toulouse => &self.toulouse_url,
      Source::CityRegistry => &self.city_url,
    }
  }

  pub fn layout(&self) -> SnapshotLayout { SnapshotLayout::new(expand_tilde(&self.raw_data_dir)) }

  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
