//! Runtime configuration, deserialised from `config.toml` layered with
//! `HALO_*` environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  /// Public origin used to build links in outgoing mail.
  pub base_url:            String,
  pub store_path:          PathBuf,
  pub jwt_secret:          String,
  #[serde(default = "default_issuer")]
  pub jwt_issuer:          String,
  #[serde(default = "default_audience")]
  pub jwt_audience:        String,
  #[serde(default = "default_expiry")]
  pub jwt_expiry_minutes:  i64,
  /// Super-admin login for `POST /auth/login`.
  pub admin_email:         String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub admin_password_hash: String,
  #[serde(default)]
  pub reminders:           ReminderConfig,
  #[serde(default)]
  pub mail:                MailConfig,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ReminderConfig {
  #[serde(default = "default_true")]
  pub enabled:        bool,
  #[serde(default = "default_interval")]
  pub interval_secs:  u64,
  #[serde(default = "default_threshold")]
  pub threshold_days: i64,
}

impl Default for ReminderConfig {
  fn default() -> Self {
    Self {
      enabled:        true,
      interval_secs:  default_interval(),
      threshold_days: default_threshold(),
    }
  }
}

#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailKind {
  /// Write messages to the log instead of sending them.
  #[default]
  Log,
  Http,
}

#[derive(Deserialize, Clone, Debug)]
pub struct MailConfig {
  #[serde(default)]
  pub kind:     MailKind,
  #[serde(default = "default_from")]
  pub from:     String,
  /// Required when `kind = "http"`.
  pub endpoint: Option<String>,
  pub api_key:  Option<String>,
}

impl Default for MailConfig {
  fn default() -> Self {
    Self {
      kind:     MailKind::Log,
      from:     default_from(),
      endpoint: None,
      api_key:  None,
    }
  }
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_issuer() -> String { "halo".into() }
fn default_audience() -> String { "halo-api".into() }
fn default_expiry() -> i64 { 60 }
fn default_true() -> bool { true }
fn default_interval() -> u64 { 86_400 }
fn default_threshold() -> i64 { 7 }
fn default_from() -> String { "halo@localhost".into() }

/// Upper bound for `reminders.threshold_days`.
pub const MAX_THRESHOLD_DAYS: i64 = 3650;

impl ServerConfig {
  /// Read `path` (optional) and `HALO_*` variables; nested keys use `__`,
  /// e.g. `HALO_REMINDERS__INTERVAL_SECS`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("HALO")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize::<Self>()?
      .validated()
  }

  /// Reject values that would make the reminder job misbehave.
  pub fn validated(self) -> Result<Self, config::ConfigError> {
    let days = self.reminders.threshold_days;
    if !(1..=MAX_THRESHOLD_DAYS).contains(&days) {
      return Err(config::ConfigError::Message(format!(
        "reminders.threshold_days must be between 1 and {MAX_THRESHOLD_DAYS}, got {days}"
      )));
    }
    if self.reminders.interval_secs == 0 {
      return Err(config::ConfigError::Message(
        "reminders.interval_secs must be positive".into(),
      ));
    }
    Ok(self)
  }
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
