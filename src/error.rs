//! Error types for stencil-mail.

use thiserror::Error;

/// Errors that can occur when rendering or sending templated emails.
///
/// Everything up to and including [`MailError::InvalidParameters`] is a
/// validation failure raised before any network call is made.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// An address failed syntax validation.
    #[error("Invalid \"{role}\" email address with value \"{value}\"")]
    InvalidAddress {
        /// Role the address was supplied under (`to`, `from`, `replyTo`, ...)
        role: String,
        /// The rejected address
        value: String,
    },

    /// The template spec lacks required attributes.
    #[error("Following attributes are missing from your email template: {}", .0.join(", "))]
    MissingTemplateAttributes(Vec<&'static str>),

    /// No stored template matched the lookup.
    #[error("Email template not found: {0}")]
    TemplateNotFound(String),

    /// The profile's provider cannot perform bulk sends.
    #[error("Provider \"{0}\" not supported")]
    UnsupportedProvider(String),

    /// Bulk input was empty or malformed.
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// The provider rejected the request or could not be reached.
    #[error("Provider send failure ({provider}): {message}")]
    ProviderSendFailure {
        provider: &'static str,
        message: String,
        /// Optional HTTP status code
        status: Option<u16>,
    },

    /// Configuration error (missing env var, unknown profile, etc.)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Missing required field on an outgoing email.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Template compilation or rendering error.
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Template store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error sending the email.
    #[error("Send error: {0}")]
    SendError(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl MailError {
    /// Create an address validation error.
    pub fn invalid_address(role: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidAddress {
            role: role.into(),
            value: value.into(),
        }
    }

    /// Create a provider send failure.
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::ProviderSendFailure {
            provider,
            message: message.into(),
            status: None,
        }
    }

    /// Create a provider send failure with HTTP status.
    pub fn provider_with_status(
        provider: &'static str,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::ProviderSendFailure {
            provider,
            message: message.into(),
            status: Some(status),
        }
    }

    /// Whether this error was raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAddress { .. }
                | Self::MissingTemplateAttributes(_)
                | Self::TemplateNotFound(_)
                | Self::UnsupportedProvider(_)
                | Self::InvalidParameters(_)
                | Self::MissingField(_)
                | Self::TemplateError(_)
        )
    }
}

#[cfg(feature = "_http")]
impl From<reqwest::Error> for MailError {
    fn from(err: reqwest::Error) -> Self {
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<handlebars::RenderError> for MailError {
    fn from(err: handlebars::RenderError) -> Self {
        Self::TemplateError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_address_message() {
        let err = MailError::invalid_address("to", "not-an-email");
        assert_eq!(
            err.to_string(),
            "Invalid \"to\" email address with value \"not-an-email\""
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_missing_attributes_message() {
        let err = MailError::MissingTemplateAttributes(vec!["name", "subject"]);
        assert_eq!(
            err.to_string(),
            "Following attributes are missing from your email template: name, subject"
        );
    }

    #[test]
    fn test_provider_failure_is_not_validation() {
        let err = MailError::provider_with_status("mailjet", "Unauthorized", 401);
        assert!(!err.is_validation());
        match err {
            MailError::ProviderSendFailure { status, .. } => assert_eq!(status, Some(401)),
            _ => panic!("wrong variant"),
        }
    }
}
