//! Logger mailer that only logs what would be sent.
//!
//! Useful for staging environments: single emails and whole batches are
//! reported as tracing events and nothing leaves the process.

use async_trait::async_trait;
use std::sync::Arc;

use crate::batch::{BatchMessageResult, BatchRequest, BatchResult, RecipientResult};
use crate::config::ProviderProfile;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{BulkConnector, BulkMailer, DeliveryResult, Mailer};

/// Logger mailer that emits tracing events for emails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerMailer {
    /// If true, log bodies and all addresses. If false, just recipients.
    log_full: bool,
}

impl LoggerMailer {
    /// Create a logger mailer with brief output (just recipients).
    pub fn new() -> Self {
        Self { log_full: false }
    }

    /// Create a logger mailer with full email details.
    pub fn full() -> Self {
        Self { log_full: true }
    }

    pub fn log_full(mut self, full: bool) -> Self {
        self.log_full = full;
        self
    }
}

#[async_trait]
impl Mailer for LoggerMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let message_id = uuid::Uuid::new_v4().to_string();

        if self.log_full {
            tracing::info!(
                message_id = %message_id,
                from = ?email.from.as_ref().map(|a| a.formatted()),
                to = ?email.to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                cc = ?email.cc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                bcc = ?email.bcc.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                reply_to = ?email.reply_to.iter().map(|a| a.formatted()).collect::<Vec<_>>(),
                subject = %email.subject,
                has_html = email.html_body.is_some(),
                has_text = email.text_body.is_some(),
                "Email logged (full)"
            );

            if let Some(ref text) = email.text_body {
                tracing::debug!(body = %text, "Text body");
            }
            if let Some(ref html) = email.html_body {
                tracing::debug!(body = %html, "HTML body");
            }
        } else {
            tracing::info!(
                message_id = %message_id,
                to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
                subject = %email.subject,
                "Email logged"
            );
        }

        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}

#[async_trait]
impl BulkMailer for LoggerMailer {
    async fn send_batch(&self, request: &BatchRequest) -> Result<BatchResult, MailError> {
        tracing::info!(messages = request.len(), "Batch logged");

        let messages = request
            .messages
            .iter()
            .map(|message| {
                if self.log_full {
                    tracing::info!(
                        from = %message.from.email,
                        to = ?message.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
                        subject = %message.subject,
                        template_id = ?message.content.template_id(),
                        "Batch message logged"
                    );
                }
                BatchMessageResult {
                    status: "success".to_string(),
                    to: message
                        .to
                        .iter()
                        .map(|to| RecipientResult {
                            email: to.email.clone(),
                            message_id: None,
                            message_uuid: Some(uuid::Uuid::new_v4().to_string()),
                        })
                        .collect(),
                    errors: Vec::new(),
                }
            })
            .collect();

        Ok(BatchResult { messages })
    }

    fn provider_name(&self) -> &'static str {
        "logger"
    }
}

impl BulkConnector for LoggerMailer {
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> {
        tracing::debug!(provider = %profile.provider, "Logging batches instead of sending");
        Ok(Arc::new(*self))
    }
}
