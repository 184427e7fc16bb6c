//! Batch request and result shapes for bulk providers.
//!
//! Mirrors the Mailjet Send API v3.1 body:
//!
//! ```json
//! {
//!   "Messages": [
//!     {
//!       "From": { "Email": "noreply@example.com", "Name": "Example" },
//!       "To": [{ "Email": "ann@example.com", "Name": "" }],
//!       "Subject": "Hi Ann",
//!       "TextPart": "Hi Ann",
//!       "HTMLPart": "<p>Hi Ann</p>"
//!     }
//!   ]
//! }
//! ```
//!
//! Provider-native messages replace the parts with `TemplateID`,
//! `TemplateLanguage` and `Variables`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::address::Address;

/// Send API version the batch shape belongs to.
pub const API_VERSION: &str = "v3.1";

/// One batched send call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchRequest {
    pub messages: Vec<BatchMessage>,
}

impl BatchRequest {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// A single addressed message within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchMessage {
    pub from: BatchAddress,
    pub to: Vec<BatchAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<BatchAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<BatchAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<BatchAddress>,
    pub subject: String,
    #[serde(flatten)]
    pub content: BatchContent,
}

impl BatchMessage {
    pub fn new(
        from: BatchAddress,
        to: Vec<BatchAddress>,
        subject: impl Into<String>,
        content: BatchContent,
    ) -> Self {
        Self {
            from,
            to,
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            subject: subject.into(),
            content,
        }
    }

    pub fn cc(mut self, cc: Vec<BatchAddress>) -> Self {
        self.cc = cc;
        self
    }

    pub fn bcc(mut self, bcc: Vec<BatchAddress>) -> Self {
        self.bcc = bcc;
        self
    }

    pub fn reply_to(mut self, reply_to: BatchAddress) -> Self {
        self.reply_to = Some(reply_to);
        self
    }
}

/// Body of a batched message: locally rendered parts, or a reference to a
/// template the provider renders itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BatchContent {
    Template {
        #[serde(rename = "TemplateID")]
        template_id: i64,
        #[serde(rename = "TemplateLanguage")]
        template_language: bool,
        #[serde(rename = "Variables")]
        variables: TemplateVariables,
    },
    Parts {
        #[serde(rename = "TextPart", default, skip_serializing_if = "Option::is_none")]
        text_part: Option<String>,
        #[serde(rename = "HTMLPart", default, skip_serializing_if = "Option::is_none")]
        html_part: Option<String>,
    },
}

impl BatchContent {
    /// Provider-native template with the item's raw data as variables.
    pub fn template(template_id: i64, data: Value) -> Self {
        Self::Template {
            template_id,
            template_language: true,
            variables: TemplateVariables { data },
        }
    }

    pub fn parts(text: Option<String>, html: Option<String>) -> Self {
        Self::Parts {
            text_part: text,
            html_part: html,
        }
    }

    pub fn template_id(&self) -> Option<i64> {
        match self {
            Self::Template { template_id, .. } => Some(*template_id),
            Self::Parts { .. } => None,
        }
    }
}

/// Substitution variables for provider-native templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateVariables {
    pub data: Value,
}

/// Address as it appears in a batch message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchAddress {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

impl BatchAddress {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: String::new(),
        }
    }
}

impl From<&Address> for BatchAddress {
    fn from(address: &Address) -> Self {
        Self {
            email: address.email.clone(),
            name: address.display_name().to_string(),
        }
    }
}

/// Provider response to a batch: one status entry per submitted message.
///
/// Partial failures are reported here and are not turned into errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchResult {
    #[serde(default)]
    pub messages: Vec<BatchMessageResult>,
}

impl BatchResult {
    /// Number of messages the provider accepted.
    pub fn succeeded(&self) -> usize {
        self.messages.iter().filter(|m| m.is_success()).count()
    }

    /// Number of messages the provider rejected.
    pub fn failed(&self) -> usize {
        self.messages.len() - self.succeeded()
    }

    /// Provider message ids of all accepted recipients.
    pub fn message_ids(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|m| m.to.iter())
            .filter_map(|r| r.message_id.map(|id| id.to_string()))
            .collect()
    }
}

/// Status of one message within a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchMessageResult {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub to: Vec<RecipientResult>,
    #[serde(default)]
    pub errors: Vec<BatchError>,
}

impl BatchMessageResult {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Per-recipient delivery handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecipientResult {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "MessageID", default)]
    pub message_id: Option<i64>,
    #[serde(rename = "MessageUUID", default)]
    pub message_uuid: Option<String>,
}

/// Provider-reported error for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BatchError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: String,
    #[serde(default)]
    pub status_code: Option<u16>,
}
