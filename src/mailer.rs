//! Provider traits and delivery result types.
//!
//! # Architecture: Why `async_trait`?
//!
//! The orchestrators hold their collaborators as `Arc<dyn Mailer>`,
//! `Arc<dyn BulkConnector>` and so on, so each one can be swapped for a test
//! double. Native async traits are not object-safe; `#[async_trait]` boxes the
//! returned futures to allow dynamic dispatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::batch::{BatchRequest, BatchResult};
use crate::config::ProviderProfile;
use crate::email::Email;
use crate::error::MailError;

/// Result of a successful single email delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the provider
    pub message_id: String,
    /// Optional provider-specific response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_response: Option<serde_json::Value>,
}

impl DeliveryResult {
    /// Create a new delivery result with just a message ID.
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: None,
        }
    }

    /// Create a delivery result with provider response.
    pub fn with_response(message_id: impl Into<String>, response: serde_json::Value) -> Self {
        Self {
            message_id: message_id.into(),
            provider_response: Some(response),
        }
    }
}

/// Generic "send one message" provider.
///
/// # Example
///
/// ```ignore
/// use stencil_mail::{Email, Mailer};
/// use stencil_mail::providers::MailjetMailer;
///
/// let mailer = MailjetMailer::new("api_key", "secret_key");
///
/// let email = Email::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .text_body("World");
///
/// let result = mailer.deliver(&email).await?;
/// println!("Sent with ID: {}", result.message_id);
/// ```
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send a single email.
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError>;

    /// Get the provider name (for logging/debugging).
    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

/// Provider that accepts many addressed messages in one request.
#[async_trait]
pub trait BulkMailer: Send + Sync {
    /// Submit the whole batch in a single call.
    ///
    /// Transport failures and whole-batch rejections are errors; per-message
    /// outcomes are reported in the [`BatchResult`].
    async fn send_batch(&self, request: &BatchRequest) -> Result<BatchResult, MailError>;

    fn provider_name(&self) -> &'static str {
        "unknown"
    }
}

/// Builds a [`BulkMailer`] from a resolved profile's credentials.
pub trait BulkConnector: Send + Sync {
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError>;
}

/// Any closure mapping a profile to a bulk mailer is a connector.
impl<F> BulkConnector for F
where
    F: Fn(&ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> + Send + Sync,
{
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> {
        self(profile)
    }
}
