//! Server wiring for Docket: configuration and the top-level router.

use std::path::{Path, PathBuf};

use axum::Router;
use config::{ConfigError, Environment, File, Source};
use docket_api::{AppState, Backend, api_router};
use docket_core::timeline::TimelinePolicy;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` overlaid
/// with `DOCKET_*` environment variables (`DOCKET_TIMELINE__PLACEHOLDER`
/// for nested keys).
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  #[serde(default)]
  pub timeline:   TimelinePolicy,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/docket/docket.db") }

impl ServerConfig {
  /// Load from the TOML file at `path` (optional) and the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_file(File::from(path.to_path_buf()).required(false))
  }

  fn from_file<F>(file: F) -> Result<Self, ConfigError>
  where
    F: Source + Send + Sync + 'static,
  {
    config::Config::builder()
      .add_source(file)
      .add_source(
        Environment::with_prefix("DOCKET")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The API nested under `/api`, with request tracing.
pub fn router<S: Backend>(state: AppState<S>) -> Router {
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}
