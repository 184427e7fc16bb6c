//! Role-keyed address options (`to`, `from`, `replyTo`, ...).
//!
//! Callers hand the orchestrators a loose mapping from role to one address or
//! a list of addresses, mirroring how the options arrive over JSON:
//!
//! ```
//! use stencil_mail::EmailOptions;
//!
//! let options: EmailOptions = serde_json::from_value(serde_json::json!({
//!     "to": "ann@example.com",
//!     "bcc": ["audit@example.com", "archive@example.com"]
//! })).unwrap();
//!
//! assert!(options.validate().is_ok());
//! assert_eq!(options.addresses("bcc").len(), 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::address::{validate_address, Address};
use crate::email::Email;
use crate::error::MailError;

/// Role name for primary recipients.
pub const TO: &str = "to";
/// Role name for the sender.
pub const FROM: &str = "from";
/// Role name for reply-to addresses.
pub const REPLY_TO: &str = "replyTo";
/// Role name for carbon copy recipients.
pub const CC: &str = "cc";
/// Role name for blind carbon copy recipients.
pub const BCC: &str = "bcc";

/// One address or an ordered sequence of addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AddressValue {
    One(String),
    Many(Vec<String>),
}

impl AddressValue {
    /// Iterate the individual address strings.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            Self::One(one) => std::slice::from_ref(one),
            Self::Many(many) => many,
        };
        slice.iter().map(String::as_str)
    }
}

impl From<&str> for AddressValue {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

impl From<String> for AddressValue {
    fn from(value: String) -> Self {
        Self::One(value)
    }
}

impl<S: Into<String>> From<Vec<S>> for AddressValue {
    fn from(values: Vec<S>) -> Self {
        Self::Many(values.into_iter().map(Into::into).collect())
    }
}

/// Mapping from role to address(es), in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>", into = "serde_json::Map<String, serde_json::Value>")]
pub struct EmailOptions {
    entries: Vec<(String, AddressValue)>,
}

impl EmailOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the addresses for `role`, replacing any previous value.
    pub fn set(mut self, role: impl Into<String>, value: impl Into<AddressValue>) -> Self {
        let role = role.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(r, _)| *r == role) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((role, value)),
        }
        self
    }

    /// Set the `to` role.
    pub fn to(self, value: impl Into<AddressValue>) -> Self {
        self.set(TO, value)
    }

    /// Set the `from` role.
    pub fn from(self, value: impl Into<AddressValue>) -> Self {
        self.set(FROM, value)
    }

    /// Set the `replyTo` role.
    pub fn reply_to(self, value: impl Into<AddressValue>) -> Self {
        self.set(REPLY_TO, value)
    }

    /// Set the `cc` role.
    pub fn cc(self, value: impl Into<AddressValue>) -> Self {
        self.set(CC, value)
    }

    /// Set the `bcc` role.
    pub fn bcc(self, value: impl Into<AddressValue>) -> Self {
        self.set(BCC, value)
    }

    /// Value for `role`, if set.
    pub fn get(&self, role: &str) -> Option<&AddressValue> {
        self.entries
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, value)| value)
    }

    /// Addresses for `role` (empty if unset).
    pub fn addresses(&self, role: &str) -> Vec<&str> {
        self.get(role).map(|v| v.iter().collect()).unwrap_or_default()
    }

    /// Iterate `(role, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AddressValue)> {
        self.entries.iter().map(|(role, value)| (role.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Validate every address at every role.
    ///
    /// Fails on the first invalid address with [`MailError::InvalidAddress`].
    pub fn validate(&self) -> Result<(), MailError> {
        for (role, value) in self.iter() {
            for address in value.iter() {
                validate_address(role, address)?;
            }
        }
        Ok(())
    }

    /// Copy the addresses onto an outgoing [`Email`].
    ///
    /// `to`, `cc`, `bcc` and `replyTo` map to their email fields; the first
    /// `from` address becomes the sender. Unknown roles are ignored.
    pub fn apply_to(&self, mut email: Email) -> Email {
        for (role, value) in self.iter() {
            let addrs = value.iter().map(Address::new);
            match role {
                TO => email.to.extend(addrs),
                CC => email.cc.extend(addrs),
                BCC => email.bcc.extend(addrs),
                REPLY_TO => email.reply_to.extend(addrs),
                FROM => {
                    if let Some(from) = value.iter().next() {
                        email.from = Some(Address::new(from));
                    }
                }
                other => tracing::debug!(role = other, "Ignoring unknown address role"),
            }
        }
        email
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for EmailOptions {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        let mut entries = Vec::with_capacity(map.len());
        for (role, value) in map {
            let value = match value {
                serde_json::Value::String(s) => AddressValue::One(s),
                serde_json::Value::Array(items) => AddressValue::Many(
                    items.into_iter().map(|item| json_to_address(&item)).collect(),
                ),
                other => AddressValue::One(json_to_address(&other)),
            };
            entries.push((role, value));
        }
        Self { entries }
    }
}

impl From<EmailOptions> for serde_json::Map<String, serde_json::Value> {
    fn from(options: EmailOptions) -> Self {
        options
            .entries
            .into_iter()
            .map(|(role, value)| {
                let value = match value {
                    AddressValue::One(s) => serde_json::Value::String(s),
                    AddressValue::Many(many) => many.into_iter().map(serde_json::Value::String).collect(),
                };
                (role, value)
            })
            .collect()
    }
}

// Non-string values are kept as their JSON text so validation rejects them
// with the offending value instead of silently dropping the role.
fn json_to_address(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
