//! docket server binary.
//!
//! Reads `docket.toml` (or the path given with `--config`), opens the
//! configured request store, and serves the JSON API over HTTP.

mod settings;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use docket_core::{
  audit::{AuditSink, TracingSink},
  engine::TransitionEngine,
  memory::MemoryStore,
  store::RequestStore,
};
use docket_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::settings::{Backend, ServerConfig};

#[derive(Parser)]
#[command(author, version, about = "Docket request-approval server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "docket.toml", env = "DOCKET_CONFIG")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  match cfg.backend {
    Backend::Sqlite => {
      let path = cfg.resolved_store_path();
      let store = SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?;
      tracing::info!(?path, "using sqlite store");
      serve(TransitionEngine::new(store.clone(), store), &cfg).await
    }
    Backend::Memory => {
      tracing::warn!("using in-memory store; requests are lost on exit");
      serve(TransitionEngine::new(MemoryStore::new(), TracingSink), &cfg).await
    }
  }
}

async fn serve<S, A>(engine: TransitionEngine<S, A>, cfg: &ServerConfig) -> anyhow::Result<()>
where
  S: RequestStore + 'static,
  A: AuditSink + 'static,
{
  let engine = Arc::new(engine);
  let app = docket_api::api_router(Arc::clone(&engine)).layer(TraceLayer::new_for_http());
  let address = cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  let remaining = engine.retry_undelivered().await;
  if remaining > 0 {
    tracing::warn!(remaining, "exiting with undelivered audit events");
  }
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}
