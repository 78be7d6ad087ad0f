//! Runtime server configuration.
//!
//! Defaults, then the optional TOML file, then `DOCKET_*` environment
//! variables, each layer overriding the one before.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where requests are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  Sqlite,
  /// Nothing survives a restart.
  Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub backend:    Backend,
  pub store_path: PathBuf,
}

impl ServerConfig {
  pub fn load(file: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("backend", "sqlite")?
      .set_default("store_path", "docket.db")?
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("DOCKET"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}
