//! halo server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `HALO_*` environment variables, opens the SQLite store, starts the
//! reminder job, and serves the JSON API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `admin_password_hash`:
//!
//! ```text
//! cargo run -p halo-server --bin halo -- --hash-password
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use halo_server::{
  ServerConfig,
  auth::{AuthService, hash_password},
  config::expand_tilde,
  mail::ConfiguredMailer,
  reminders::ReminderJob,
};
use halo_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Halo survey server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Run one reminder sweep and exit.
  #[arg(long)]
  sweep_once: bool,
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

  if cli.hash_password {
    let password = read_password()?;
    let hash = hash_password(&password).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
    println!("{hash}");
    return Ok(());
  }

  let config = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  let store_path = expand_tilde(&config.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let store = Arc::new(store);

  let mailer = ConfiguredMailer::from_config(&config.mail).context("invalid [mail] section")?;
  let job = ReminderJob::new(
    store.clone(),
    Arc::new(mailer),
    config.base_url.clone(),
    chrono::Duration::days(config.reminders.threshold_days),
    Duration::from_secs(config.reminders.interval_secs.max(1)),
  );

  if cli.sweep_once {
    let report = job
      .sweep(chrono::Utc::now())
      .await
      .context("reminder sweep failed")?;
    tracing::info!(
      groups = report.groups,
      sent = report.sent,
      failed = report.failed,
      stamped = report.stamped,
      "reminder sweep finished"
    );
    return Ok(());
  }

  if config.reminders.enabled {
    job.spawn();
  } else {
    tracing::info!("reminder job disabled");
  }

  let app = halo_server::router(store, Arc::new(AuthService::from_config(&config)));
  let address = format!("{}:{}", config.host, config.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;
  Ok(line.trim_end_matches(['\n', '\r']).to_owned())
}
