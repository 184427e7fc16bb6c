//! Provider profiles.
//!
//! A profile names a provider and carries its credentials and default sender.
//! Templates pick a profile by name; templates without one use
//! [`DEFAULT_PROFILE`].
//!
//! Profiles can be loaded from JSON:
//!
//! ```
//! use stencil_mail::{ProfileRegistry, ProfileSource, ProviderKind};
//!
//! let registry = ProfileRegistry::from_json(serde_json::json!({
//!     "default": {
//!         "provider": "mailjet",
//!         "providerOptions": { "publicApiKey": "pk", "secretApiKey": "sk" },
//!         "settings": { "defaultFrom": "noreply@example.com", "defaultFromName": "Example" }
//!     }
//! })).unwrap();
//!
//! let profile = registry.get_profile("default").unwrap();
//! assert_eq!(profile.provider, ProviderKind::Mailjet);
//! ```
//!
//! or from environment variables for the default profile:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `TEMPLATED_EMAIL_PROVIDER` | Provider kind (default: `mailjet`) |
//! | `MAILJET_API_KEY` | Mailjet public API key |
//! | `MAILJET_SECRET_KEY` | Mailjet secret API key |
//! | `MAILJET_BASE_URL` | Override for the Mailjet API base URL |
//! | `EMAIL_FROM` | Default sender email |
//! | `EMAIL_FROM_NAME` | Default sender name |

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;

use crate::address::Address;
use crate::error::MailError;

/// Profile used when a template names none.
pub const DEFAULT_PROFILE: &str = "default";

/// Provider kind tag.
///
/// Mailjet is the only kind that supports bulk sends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProviderKind {
    Mailjet,
    Other(String),
}

impl ProviderKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Mailjet => "mailjet",
            Self::Other(other) => other,
        }
    }

    pub fn supports_bulk(&self) -> bool {
        matches!(self, Self::Mailjet)
    }
}

impl From<String> for ProviderKind {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("mailjet") {
            Self::Mailjet
        } else {
            Self::Other(value)
        }
    }
}

impl From<&str> for ProviderKind {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<ProviderKind> for String {
    fn from(kind: ProviderKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider credentials.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOptions {
    #[serde(default)]
    pub public_api_key: String,
    #[serde(default)]
    pub secret_api_key: String,
    /// API base URL override (testing, regional endpoints)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

// Keep secrets out of logs
impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("public_api_key", &self.public_api_key)
            .field("secret_api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Sender defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSettings {
    #[serde(default)]
    pub default_from: Option<String>,
    #[serde(default)]
    pub default_from_name: Option<String>,
}

/// A named provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderProfile {
    pub provider: ProviderKind,
    #[serde(default)]
    pub provider_options: ProviderOptions,
    #[serde(default)]
    pub settings: ProfileSettings,
}

impl ProviderProfile {
    /// Mailjet profile with the given API key pair.
    pub fn mailjet(public_api_key: impl Into<String>, secret_api_key: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Mailjet,
            provider_options: ProviderOptions {
                public_api_key: public_api_key.into(),
                secret_api_key: secret_api_key.into(),
                base_url: None,
            },
            settings: ProfileSettings::default(),
        }
    }

    /// Profile for any other provider kind.
    pub fn other(provider: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::from(provider.into()),
            provider_options: ProviderOptions::default(),
            settings: ProfileSettings::default(),
        }
    }

    /// Set the default sender.
    pub fn default_from(mut self, email: impl Into<String>, name: Option<&str>) -> Self {
        self.settings.default_from = Some(email.into());
        self.settings.default_from_name = name.map(str::to_string);
        self
    }

    /// Set an API base URL override.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.provider_options.base_url = Some(url.into());
        self
    }

    /// The default sender as an address, if configured.
    pub fn sender(&self) -> Option<Address> {
        let email = self.settings.default_from.as_ref()?;
        Some(match &self.settings.default_from_name {
            Some(name) => Address::with_name(name, email),
            None => Address::new(email),
        })
    }
}

/// Source of provider profiles.
pub trait ProfileSource: Send + Sync {
    /// Look up the profile called `name`.
    fn get_profile(&self, name: &str) -> Option<ProviderProfile>;

    /// Look up `name`, or [`DEFAULT_PROFILE`] when `name` is absent or empty.
    fn resolve(&self, name: Option<&str>) -> Result<ProviderProfile, MailError> {
        let name = name.filter(|n| !n.is_empty()).unwrap_or(DEFAULT_PROFILE);
        self.get_profile(name).ok_or_else(|| {
            MailError::Configuration(format!("email profile \"{}\" is not configured", name))
        })
    }
}

/// In-memory profile registry.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: RwLock<HashMap<String, ProviderProfile>>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding a single default profile.
    pub fn with_default(profile: ProviderProfile) -> Self {
        let registry = Self::new();
        registry.insert(DEFAULT_PROFILE, profile);
        registry
    }

    /// Add or replace a profile.
    pub fn insert(&self, name: impl Into<String>, profile: ProviderProfile) {
        self.profiles.write().insert(name.into(), profile);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn profile(self, name: impl Into<String>, profile: ProviderProfile) -> Self {
        self.insert(name, profile);
        self
    }

    /// Load from a JSON object keyed by profile name.
    pub fn from_json(value: serde_json::Value) -> Result<Self, MailError> {
        let profiles: HashMap<String, ProviderProfile> = serde_json::from_value(value)
            .map_err(|e| MailError::Configuration(format!("invalid profile configuration: {}", e)))?;
        Ok(Self {
            profiles: RwLock::new(profiles),
        })
    }

    /// Build the default profile from environment variables.
    pub fn from_env() -> Result<Self, MailError> {
        let provider = env::var("TEMPLATED_EMAIL_PROVIDER").unwrap_or_else(|_| "mailjet".to_string());
        let mut profile = match ProviderKind::from(provider) {
            ProviderKind::Mailjet => {
                let key = env::var("MAILJET_API_KEY")
                    .map_err(|_| MailError::Configuration("MAILJET_API_KEY not set".into()))?;
                let secret = env::var("MAILJET_SECRET_KEY")
                    .map_err(|_| MailError::Configuration("MAILJET_SECRET_KEY not set".into()))?;
                ProviderProfile::mailjet(key, secret)
            }
            ProviderKind::Other(other) => {
                tracing::warn!(provider = %other, "Configured provider does not support bulk sends");
                ProviderProfile::other(other)
            }
        };

        if let Ok(base_url) = env::var("MAILJET_BASE_URL") {
            profile = profile.base_url(base_url);
        }
        if let Ok(from) = env::var("EMAIL_FROM") {
            let name = env::var("EMAIL_FROM_NAME").ok();
            profile = profile.default_from(from, name.as_deref());
        }

        Ok(Self::with_default(profile))
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.profiles.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ProfileSource for ProfileRegistry {
    fn get_profile(&self, name: &str) -> Option<ProviderProfile> {
        self.profiles.read().get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!(ProviderKind::from("mailjet"), ProviderKind::Mailjet);
        assert_eq!(ProviderKind::from("Mailjet"), ProviderKind::Mailjet);
        assert_eq!(
            ProviderKind::from("sendgrid"),
            ProviderKind::Other("sendgrid".into())
        );
        assert!(!ProviderKind::from("sendgrid").supports_bulk());
    }

    #[test]
    fn test_from_json() {
        let registry = ProfileRegistry::from_json(json!({
            "default": {
                "provider": "mailjet",
                "providerOptions": { "publicApiKey": "pk", "secretApiKey": "sk" },
                "settings": { "defaultFrom": "noreply@example.com", "defaultFromName": "Example" }
            },
            "legacy": { "provider": "smtp" }
        }))
        .unwrap();

        let default = registry.resolve(None).unwrap();
        assert_eq!(default.provider_options.secret_api_key, "sk");
        assert_eq!(
            default.sender(),
            Some(Address::with_name("Example", "noreply@example.com"))
        );

        let legacy = registry.resolve(Some("legacy")).unwrap();
        assert_eq!(legacy.provider, ProviderKind::Other("smtp".into()));
        assert_eq!(legacy.sender(), None);
        assert_eq!(registry.names(), vec!["default", "legacy"]);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ProfileRegistry::from_json(json!({ "default": 3 })),
            Err(MailError::Configuration(_))
        ));
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = ProfileRegistry::with_default(ProviderProfile::mailjet("pk", "sk"));
        assert!(registry.resolve(Some("")).is_ok());
        assert!(matches!(
            registry.resolve(Some("marketing")),
            Err(MailError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let profile = ProviderProfile::mailjet("pk", "super-secret");
        let debug = format!("{:?}", profile);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
