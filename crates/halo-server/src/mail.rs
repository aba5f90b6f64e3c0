//! Outgoing mail transports.

use std::future::Future;

use halo_core::reminder::OutgoingMail;
use serde_json::json;
use thiserror::Error;

use crate::config::{MailConfig, MailKind};

#[derive(Debug, Error)]
pub enum MailError {
  #[error("mail transport misconfigured: {0}")]
  Config(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("mail endpoint answered {status}: {body}")]
  Rejected { status: u16, body: String },
}

/// Delivers one message. Failures are reported, never retried here.
pub trait Mailer: Send + Sync {
  fn send(
    &self,
    mail: &OutgoingMail,
  ) -> impl Future<Output = Result<(), MailError>> + Send;
}

// ─── Log ──────────────────────────────────────────────────────────────────────

/// Logs messages instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
  async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
    tracing::info!(to = %mail.to, subject = %mail.subject, "mail (log transport)");
    tracing::debug!(to = %mail.to, html = %mail.html);
    Ok(())
  }
}

// ─── HTTP ─────────────────────────────────────────────────────────────────────

/// POSTs `{from, to, subject, html}` as JSON to a mail relay.
#[derive(Debug, Clone)]
pub struct HttpMailer {
  client:   reqwest::Client,
  endpoint: String,
  api_key:  Option<String>,
  from:     String,
}

impl HttpMailer {
  pub fn new(endpoint: String, api_key: Option<String>, from: String) -> Self {
    Self { client: reqwest::Client::new(), endpoint, api_key, from }
  }
}

impl Mailer for HttpMailer {
  async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
    let mut req = self.client.post(&self.endpoint).json(&json!({
      "from":    self.from,
      "to":      mail.to,
      "subject": mail.subject,
      "html":    mail.html,
    }));
    if let Some(key) = &self.api_key {
      req = req.bearer_auth(key);
    }

    let res = req.send().await?;
    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      return Err(MailError::Rejected { status: status.as_u16(), body });
    }
    Ok(())
  }
}

// ─── Configured ───────────────────────────────────────────────────────────────

/// The transport selected by `[mail] kind`.
#[derive(Debug, Clone)]
pub enum ConfiguredMailer {
  Log(LogMailer),
  Http(HttpMailer),
}

impl ConfiguredMailer {
  pub fn from_config(cfg: &MailConfig) -> Result<Self, MailError> {
    match cfg.kind {
      MailKind::Log => Ok(Self::Log(LogMailer)),
      MailKind::Http => {
        let endpoint = cfg
          .endpoint
          .clone()
          .ok_or_else(|| MailError::Config("mail.endpoint is required".into()))?;
        Ok(Self::Http(HttpMailer::new(
          endpoint,
          cfg.api_key.clone(),
          cfg.from.clone(),
        )))
      }
    }
  }
}

impl Mailer for ConfiguredMailer {
  async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
    match self {
      Self::Log(m) => m.send(mail).await,
      Self::Http(m) => m.send(mail).await,
    }
  }
}
