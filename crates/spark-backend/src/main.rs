//! spark-backend binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `SPARK_*`
//! environment variables, connects to the platform as the bot, and serves
//! webhook deliveries over HTTP until interrupted.
//!
//! ```sh
//! SPARK_TOKEN=... SPARK_CHATROOM_PRESENCE=R1,R2 cargo run -p spark-backend
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use spark_backend::{Backend, BackendConfig, Settings};
use spark_client::{ClientConfig, SparkClient};
use spark_core::{Identifier as _, Message, api::SparkApi, memory::MemoryStore};
use spark_store_sqlite::SqliteStore;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

/// Resolved messages waiting for the framework.
const DISPATCH_QUEUE: usize = 256;

#[derive(Parser)]
#[command(author, version, about = "Spark chat backend")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Reply to every message with its own text.
  #[arg(long)]
  echo: bool,
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

  let raw = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(
      config::Environment::with_prefix("SPARK")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("chatroom_presence"),
    )
    .build()
    .context("failed to read config file")?;

  let backend_cfg: BackendConfig = raw
    .try_deserialize()
    .context("failed to deserialise BackendConfig")?;

  let settings = Settings::from_config(backend_cfg).context("invalid configuration")?;

  let client = SparkClient::new(ClientConfig {
    base_url: settings.api_url.clone(),
    timeout: settings.request_timeout,
    ..ClientConfig::new(settings.token.clone())
  })
  .context("failed to build platform client")?;

  let store_path = expand_tilde(&settings.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let address = settings.listen_addr.clone();
  let backend = Backend::connect(settings, client, store)
    .await
    .context("failed to connect to the platform")?;
  info!(mode = backend.mode(), "backend initialised");

  let (tx, rx) = mpsc::channel(DISPATCH_QUEUE);
  tokio::spawn(consume(backend.clone(), rx, cli.echo));

  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  info!("Listening on http://{address}");

  backend
    .serve(listener, tx, shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

/// Stand-in for the framework side: log each message, optionally echo it.
async fn consume<A, M>(backend: Backend<A, M>, mut rx: mpsc::Receiver<Message>, echo: bool)
where
  A: SparkApi + 'static,
  M: MemoryStore + 'static,
{
  while let Some(message) = rx.recv().await {
    info!(
      from = message.from.person(),
      room = message.to.room_id().unwrap_or("direct"),
      body = %message.body,
      "message received"
    );
    if echo {
      let reply = backend.build_reply(&message, message.body.clone(), false);
      if let Err(e) = backend.send_message(&reply).await {
        warn!(error = %e, "echo failed");
      }
    }
  }
}

async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      error!(error = %e, "failed to listen for ctrl-c");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }
  info!("shutdown signal received");
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
