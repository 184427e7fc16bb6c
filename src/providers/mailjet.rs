//! Mailjet API provider.
//!
//! For reference: [Mailjet API docs](https://dev.mailjet.com/guides/#send-api-v3-1)
//!
//! `MailjetMailer` is both a generic [`Mailer`] (one email per request) and a
//! [`BulkMailer`] (one request carrying a whole [`BatchRequest`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use stencil_mail::providers::MailjetMailer;
//!
//! let mailer = MailjetMailer::new("api_key", "secret_key");
//! ```
//!
//! ## Provider Options
//!
//! Single sends honor these [`Email::provider_option`] keys:
//!
//! * `template_id` (integer) - Mailjet template to render instead of the parts
//! * `variables` (map) - Key/value variables for template substitution
//! * `custom_id` (string) - Custom ID for tracking

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::batch::{BatchAddress, BatchRequest, BatchResult, API_VERSION};
use crate::config::{ProviderKind, ProviderProfile};
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{BulkConnector, BulkMailer, DeliveryResult, Mailer};

const MAILJET_API_URL: &str = "https://api.mailjet.com";

/// Mailjet API email provider.
pub struct MailjetMailer {
    api_key: String,
    secret_key: String,
    client: Client,
    base_url: String,
}

impl MailjetMailer {
    /// Create a new Mailjet mailer with the given API key and secret key.
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::with_client(api_key, secret_key, Client::new())
    }

    /// Create with a custom reqwest client (timeouts, proxies, ...).
    pub fn with_client(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            client,
            base_url: format!("{}/{}", MAILJET_API_URL, API_VERSION),
        }
    }

    /// Set a custom base URL (for testing).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn auth_header(&self) -> String {
        let credentials = format!("{}:{}", self.api_key, self.secret_key);
        format!("Basic {}", BASE64.encode(credentials.as_bytes()))
    }

    fn build_message(&self, email: &Email) -> Result<MailjetMessage, MailError> {
        let from = email.from.as_ref().ok_or(MailError::MissingField("from"))?;

        if email.to.is_empty() {
            return Err(MailError::MissingField("to"));
        }

        let list = |addrs: &[crate::Address]| -> Option<Vec<BatchAddress>> {
            if addrs.is_empty() {
                None
            } else {
                Some(addrs.iter().map(BatchAddress::from).collect())
            }
        };

        let template_id = email
            .provider_options
            .get("template_id")
            .and_then(Value::as_i64);

        Ok(MailjetMessage {
            from: from.into(),
            to: email.to.iter().map(BatchAddress::from).collect(),
            cc: list(&email.cc),
            bcc: list(&email.bcc),
            reply_to: email.reply_to.first().map(BatchAddress::from),
            subject: email.subject.clone(),
            text_part: email.text_body.clone(),
            html_part: email.html_body.clone(),
            headers: if email.headers.is_empty() {
                None
            } else {
                Some(email.headers.clone())
            },
            template_id,
            template_language: template_id.map(|_| true),
            variables: email.provider_options.get("variables").cloned(),
            custom_id: email
                .provider_options
                .get("custom_id")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    /// POST a `{"Messages": [...]}` body and return the status and raw body.
    async fn post_send<T: Serialize + ?Sized>(&self, body: &T) -> Result<(u16, String), MailError> {
        let url = format!("{}/send", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .header("User-Agent", format!("stencil-mail/{}", crate::VERSION))
            .json(body)
            .send()
            .await
            .map_err(|e| MailError::provider("mailjet", e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| MailError::provider_with_status("mailjet", e.to_string(), status))?;
        Ok((status, body))
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Best description of what went wrong, from per-message errors or the
/// top-level error body.
fn error_message(result: Option<&BatchResult>, body: &str) -> String {
    if let Some(result) = result {
        let messages: Vec<_> = result
            .messages
            .iter()
            .flat_map(|m| m.errors.iter())
            .map(|e| e.error_message.clone())
            .filter(|m| !m.is_empty())
            .collect();
        if !messages.is_empty() {
            return messages.join("; ");
        }
    }
    match serde_json::from_str::<MailjetErrorBody>(body) {
        Ok(MailjetErrorBody {
            error_message: Some(message),
        }) => message,
        _ if body.is_empty() => "Unknown error".to_string(),
        _ => body.to_string(),
    }
}

#[async_trait]
impl Mailer for MailjetMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        let request = MailjetRequest {
            messages: vec![self.build_message(email)?],
        };

        let (status, body) = self.post_send(&request).await?;
        let result = serde_json::from_str::<BatchResult>(&body).ok();

        match result.as_ref().and_then(|r| r.messages.first()) {
            Some(msg) if is_success(status) && msg.is_success() => {
                let message_id = msg
                    .to
                    .first()
                    .and_then(|t| t.message_id)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

                Ok(DeliveryResult::with_response(
                    message_id,
                    serde_json::json!({ "provider": "mailjet", "status": msg.status }),
                ))
            }
            None if is_success(status) => Ok(DeliveryResult::with_response(
                uuid::Uuid::new_v4().to_string(),
                serde_json::json!({ "provider": "mailjet" }),
            )),
            _ => Err(MailError::provider_with_status(
                "mailjet",
                error_message(result.as_ref(), &body),
                status,
            )),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mailjet"
    }
}

#[async_trait]
impl BulkMailer for MailjetMailer {
    /// Non-2xx responses whose body still reports at least one accepted
    /// message are partial successes and come back as `Ok`.
    async fn send_batch(&self, request: &BatchRequest) -> Result<BatchResult, MailError> {
        if request.is_empty() {
            return Ok(BatchResult::default());
        }

        let (status, body) = self.post_send(request).await?;
        let result = serde_json::from_str::<BatchResult>(&body).ok();

        match result {
            Some(result) if is_success(status) || result.succeeded() > 0 => {
                if result.failed() > 0 {
                    tracing::warn!(
                        status,
                        succeeded = result.succeeded(),
                        failed = result.failed(),
                        "Mailjet accepted batch with failures"
                    );
                }
                Ok(result)
            }
            None if is_success(status) => Err(MailError::provider_with_status(
                "mailjet",
                "unreadable batch response",
                status,
            )),
            result => Err(MailError::provider_with_status(
                "mailjet",
                error_message(result.as_ref(), &body),
                status,
            )),
        }
    }

    fn provider_name(&self) -> &'static str {
        "mailjet"
    }
}

/// Connects Mailjet profiles to [`MailjetMailer`]s sharing one HTTP client.
#[derive(Clone, Default)]
pub struct MailjetConnector {
    client: Client,
}

impl MailjetConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom reqwest client for every connected mailer.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl BulkConnector for MailjetConnector {
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> {
        if profile.provider != ProviderKind::Mailjet {
            return Err(MailError::UnsupportedProvider(profile.provider.to_string()));
        }
        let options = &profile.provider_options;
        if options.public_api_key.is_empty() || options.secret_api_key.is_empty() {
            return Err(MailError::Configuration(
                "mailjet profile requires publicApiKey and secretApiKey".into(),
            ));
        }

        let mut mailer = MailjetMailer::with_client(
            &options.public_api_key,
            &options.secret_api_key,
            self.client.clone(),
        );
        if let Some(base_url) = &options.base_url {
            mailer = mailer.base_url(base_url);
        }
        Ok(Arc::new(mailer))
    }
}

// ============================================================================
// Mailjet API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetRequest {
    messages: Vec<MailjetMessage>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetMessage {
    from: BatchAddress,
    to: Vec<BatchAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cc: Option<Vec<BatchAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bcc: Option<Vec<BatchAddress>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<BatchAddress>,
    subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text_part: Option<String>,
    #[serde(rename = "HTMLPart", skip_serializing_if = "Option::is_none")]
    html_part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    headers: Option<HashMap<String, String>>,
    #[serde(rename = "TemplateID", skip_serializing_if = "Option::is_none")]
    template_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    template_language: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<Value>,
    #[serde(rename = "CustomID", skip_serializing_if = "Option::is_none")]
    custom_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MailjetErrorBody {
    #[serde(default)]
    error_message: Option<String>,
}
