//! Email transport for unlock and reminder notifications.
//!
//! The transport is pluggable behind [`EmailProvider`]. When no SMTP
//! configuration is present the disabled provider is used, which reports
//! [`SendOutcome::Skipped`] instead of failing, so callers never have to
//! special-case a missing transport.

mod smtp;

pub use smtp::SmtpProvider;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// SMTP transport settings, read from the environment by the server.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub from_address: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Failed to send email: {0}")]
    SendFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug)]
pub enum SendOutcome {
    /// Accepted by the transport; `detail` carries the SMTP reply code.
    Sent { detail: String },
    /// Transport disabled; nothing went out.
    Skipped,
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<SendOutcome, EmailError>;
}

/// Transport used when no SMTP configuration exists.
struct DisabledProvider;

#[async_trait]
impl EmailProvider for DisabledProvider {
    async fn send(
        &self,
        _to: &str,
        _subject: &str,
        _html_body: &str,
        _text_body: &str,
    ) -> Result<SendOutcome, EmailError> {
        Ok(SendOutcome::Skipped)
    }
}

/// Build the provider for the given configuration; `None` yields the
/// disabled transport.
pub fn create_provider(
    config: Option<EmailConfig>,
) -> Result<Arc<dyn EmailProvider>, EmailError> {
    match config {
        Some(cfg) => Ok(Arc::new(SmtpProvider::new(cfg)?)),
        None => Ok(Arc::new(DisabledProvider)),
    }
}
