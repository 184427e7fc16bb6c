//! Stored template records and the lookups that address them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::MailError;

/// A stored email template.
///
/// Records are created and edited through a [`TemplateStore`](crate::TemplateStore);
/// the send path only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailTemplate {
    /// Opaque identifier assigned by the store
    pub id: String,
    /// Unique template name
    pub name: String,
    /// Subject line (may contain placeholders)
    #[serde(default)]
    pub subject: String,
    /// HTML body, possibly entity-encoded
    #[serde(default)]
    pub body_html: Option<String>,
    /// Plain text body, possibly entity-encoded
    #[serde(default)]
    pub body_text: Option<String>,
    /// Reference to a provider-native template, as entered (number or text)
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_id: Option<String>,
    /// Named provider profile to send bulk mail through
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl EmailTemplate {
    /// Provider-native template id, if `external_id` parses to a positive
    /// integer.
    ///
    /// Parsing is lenient: leading whitespace and a trailing non-numeric tail
    /// are ignored (`" 42abc"` is 42). Zero, negatives and non-numeric values
    /// yield `None`.
    pub fn external_template_id(&self) -> Option<i64> {
        self.external_id
            .as_deref()
            .and_then(parse_leading_int)
            .filter(|id| *id > 0)
    }
}

fn parse_leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;
    Some(if negative { -value } else { value })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// How a caller addresses a stored template.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateLookup {
    Id(String),
    Name(String),
}

impl TemplateLookup {
    /// Does `template` match this lookup?
    pub fn matches(&self, template: &EmailTemplate) -> bool {
        match self {
            Self::Id(id) => template.id == *id,
            Self::Name(name) => template.name == *name,
        }
    }
}

impl fmt::Display for TemplateLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "id \"{}\"", id),
            Self::Name(name) => write!(f, "name \"{}\"", name),
        }
    }
}

/// Caller-supplied identification of the template to send.
///
/// `subject` and at least one of `id` / `name` are required.
///
/// ```
/// use stencil_mail::{TemplateLookup, TemplateSpec};
///
/// let spec = TemplateSpec::named("welcome").subject("Welcome {{name}}");
/// assert_eq!(spec.lookup().unwrap(), TemplateLookup::Name("welcome".into()));
///
/// assert!(TemplateSpec::named("welcome").lookup().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    #[serde(default, alias = "templateId", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "templateName", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl TemplateSpec {
    /// Spec addressing a template by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Spec addressing a template by id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Set the subject line.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// No field is set at all.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.subject.is_none()
    }

    /// Names of required attributes that are absent or empty.
    pub fn missing_attributes(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.id).is_none() && present(&self.name).is_none() {
            missing.push("name");
        }
        if present(&self.subject).is_none() {
            missing.push("subject");
        }
        missing
    }

    /// Validate required attributes and pick the lookup key.
    ///
    /// The id wins when both id and name are given.
    pub fn lookup(&self) -> Result<TemplateLookup, MailError> {
        let missing = self.missing_attributes();
        if !missing.is_empty() {
            return Err(MailError::MissingTemplateAttributes(missing));
        }

        match (present(&self.id), present(&self.name)) {
            (Some(id), _) => Ok(TemplateLookup::Id(id.to_string())),
            (None, Some(name)) => Ok(TemplateLookup::Name(name.to_string())),
            (None, None) => Err(MailError::MissingTemplateAttributes(vec!["name"])),
        }
    }

    /// The validated subject line.
    pub fn subject_line(&self) -> &str {
        present(&self.subject).unwrap_or_default()
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Filter for listing templates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateQuery {
    /// Exact name match
    pub name: Option<String>,
    /// Only templates sent through this profile
    pub profile: Option<String>,
    /// Case-insensitive substring of name or subject
    pub search: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl TemplateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive search on name and subject.
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, template: &EmailTemplate) -> bool {
        if let Some(name) = &self.name {
            if template.name != *name {
                return false;
            }
        }
        if let Some(profile) = &self.profile {
            if template.profile.as_deref() != Some(profile.as_str()) {
                return false;
            }
        }
        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            if !template.name.to_lowercase().contains(&term)
                && !template.subject.to_lowercase().contains(&term)
            {
                return false;
            }
        }
        true
    }
}

/// Fields for creating a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTemplate {
    pub name: String,
    pub subject: String,
    #[serde(default)]
    pub body_html: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_id: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl NewTemplate {
    pub fn new(name: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn body_html(mut self, html: impl Into<String>) -> Self {
        self.body_html = Some(html.into());
        self
    }

    pub fn body_text(mut self, text: impl Into<String>) -> Self {
        self.body_text = Some(text.into());
        self
    }

    pub fn external_id(mut self, id: impl ToString) -> Self {
        self.external_id = Some(id.to_string());
        self
    }

    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Materialize a record with a fresh id and timestamps.
    pub fn into_template(self) -> EmailTemplate {
        let now = Utc::now();
        EmailTemplate {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name,
            subject: self.subject,
            body_html: self.body_html,
            body_text: self.body_text,
            external_id: self.external_id,
            profile: self.profile,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a template. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub subject: Option<String>,
    pub body_html: Option<String>,
    pub body_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub external_id: Option<String>,
    pub profile: Option<String>,
}

impl TemplatePatch {
    pub fn apply(self, template: &mut EmailTemplate) {
        if let Some(name) = self.name {
            template.name = name;
        }
        if let Some(subject) = self.subject {
            template.subject = subject;
        }
        if self.body_html.is_some() {
            template.body_html = self.body_html;
        }
        if self.body_text.is_some() {
            template.body_text = self.body_text;
        }
        if self.external_id.is_some() {
            template.external_id = self.external_id;
        }
        if self.profile.is_some() {
            template.profile = self.profile;
        }
        template.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_prefers_id() {
        let spec = TemplateSpec {
            id: Some("t-1".into()),
            name: Some("welcome".into()),
            subject: Some("Hi".into()),
        };
        assert_eq!(spec.lookup().unwrap(), TemplateLookup::Id("t-1".into()));
    }

    #[test]
    fn test_missing_attributes() {
        assert_eq!(
            TemplateSpec::default().missing_attributes(),
            vec!["name", "subject"]
        );
        assert_eq!(
            TemplateSpec::named("welcome").missing_attributes(),
            vec!["subject"]
        );
        assert_eq!(
            TemplateSpec::default().subject("Hi").missing_attributes(),
            vec!["name"]
        );
        assert!(TemplateSpec::with_id("t-1").subject("Hi").missing_attributes().is_empty());
    }

    #[test]
    fn test_empty_strings_count_as_missing() {
        let spec = TemplateSpec::named("").subject("");
        assert!(matches!(
            spec.lookup(),
            Err(MailError::MissingTemplateAttributes(list)) if list == vec!["name", "subject"]
        ));
    }

    #[test]
    fn test_spec_deserializes_legacy_keys() {
        let spec: TemplateSpec = serde_json::from_value(json!({
            "templateName": "welcome",
            "subject": "Hi"
        }))
        .unwrap();
        assert_eq!(spec.lookup().unwrap(), TemplateLookup::Name("welcome".into()));
    }

    #[test]
    fn test_external_template_id_parsing() {
        let mut template = NewTemplate::new("t", "s").into_template();
        for (raw, expected) in [
            ("42", Some(42)),
            (" 42abc", Some(42)),
            ("0", None),
            ("-3", None),
            ("abc", None),
            ("", None),
        ] {
            template.external_id = Some(raw.to_string());
            assert_eq!(template.external_template_id(), expected, "raw: {:?}", raw);
        }
        template.external_id = None;
        assert_eq!(template.external_template_id(), None);
    }

    #[test]
    fn test_external_id_accepts_numbers() {
        let template: EmailTemplate = serde_json::from_value(json!({
            "id": "t-1",
            "name": "welcome",
            "subject": "Hi",
            "externalId": 42
        }))
        .unwrap();
        assert_eq!(template.external_template_id(), Some(42));
    }

    #[test]
    fn test_query_matches() {
        let template = NewTemplate::new("Welcome", "Hello there")
            .profile("marketing")
            .into_template();

        assert!(TemplateQuery::new().matches(&template));
        assert!(TemplateQuery::search("hello").matches(&template));
        assert!(TemplateQuery::search("WELC").matches(&template));
        assert!(!TemplateQuery::search("invoice").matches(&template));
        assert!(!TemplateQuery {
            profile: Some("default".into()),
            ..TemplateQuery::default()
        }
        .matches(&template));
    }

    #[test]
    fn test_patch_apply() {
        let mut template = NewTemplate::new("welcome", "Hi").into_template();
        let before = template.updated_at;
        TemplatePatch {
            subject: Some("Hello".into()),
            external_id: Some("7".into()),
            ..TemplatePatch::default()
        }
        .apply(&mut template);

        assert_eq!(template.subject, "Hello");
        assert_eq!(template.name, "welcome");
        assert_eq!(template.external_template_id(), Some(7));
        assert!(template.updated_at >= before);
    }
}
