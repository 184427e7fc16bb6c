//! # Stencil Mail
//!
//! Render stored email templates and send them, one recipient at a time or as
//! a provider-side batch.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use serde_json::json;
//! use stencil_mail::prelude::*;
//! use stencil_mail::providers::LoggerMailer;
//!
//! let templates = MemoryTemplateStore::shared();
//! TemplateManager::new(templates.clone())
//!     .add(NewTemplate::new("welcome", "Welcome").body_html("<h1>Hi {{name}}</h1>"))
//!     .await?;
//!
//! let service = TemplatedMailer::new(templates, ProfileRegistry::from_env()?, LoggerMailer::new());
//!
//! // One rendered email through the generic mailer
//! service
//!     .send_templated_email(
//!         &EmailOptions::new().to("ann@example.com"),
//!         &TemplateSpec::named("welcome").subject("Welcome {{name}}"),
//!         json!({ "name": "Ann" }).as_object().unwrap(),
//!     )
//!     .await?;
//!
//! // One Mailjet batch, one message per item
//! service
//!     .send_bulk_templated_email(
//!         &TemplateSpec::named("welcome").subject("Welcome {{name}}"),
//!         &[
//!             BulkItem::to("ann@example.com").field("name", "Ann"),
//!             BulkItem::to("bob@example.com").field("name", "Bob"),
//!         ],
//!     )
//!     .await?;
//! ```
//!
//! ## Rendering
//!
//! Placeholders use `{{name}}` / `{{user.name}}`. Values are inserted as-is
//! and unknown names render empty. Stored bodies are entity-decoded first; a
//! template without a text body gets one derived from its html.
//!
//! Bulk sends render each item locally, unless the template carries a
//! positive `externalId`: then every message references that Mailjet template
//! and passes the item through as `Variables.data`.
//!
//! ## Environment Variables
//!
//! [`ProfileRegistry::from_env`] builds the default profile from:
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `TEMPLATED_EMAIL_PROVIDER` | Provider kind (default: `mailjet`) |
//! | `MAILJET_API_KEY` | Mailjet public API key |
//! | `MAILJET_SECRET_KEY` | Mailjet secret API key |
//! | `MAILJET_BASE_URL` | Mailjet API base URL override |
//! | `EMAIL_FROM` | Default sender email |
//! | `EMAIL_FROM_NAME` | Default sender name |
//!
//! ## Feature Flags
//!
//! - `mailjet` (default) - Mailjet Send API v3.1 provider and bulk connector
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `templated_email_sent_total` | Counter | provider, status | Emails sent (batch messages included) |
//! | `templated_email_delivery_duration_seconds` | Histogram | provider | Provider call duration |
//! | `templated_email_batch_total` | Counter | provider, status | Batch submissions |
//! | `templated_email_batch_size` | Histogram | provider | Messages per batch |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the stencil-mail crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod batch;
mod config;
mod email;
mod error;
mod mailer;
mod manager;
mod options;
mod service;
mod store;
mod template;

pub mod providers;
pub mod render;
pub mod testing;

// Re-exports
pub use address::{is_valid_email, validate_address, Address, ToAddress};
pub use batch::{
    BatchAddress, BatchContent, BatchError, BatchMessage, BatchMessageResult, BatchRequest,
    BatchResult, RecipientResult, TemplateVariables, API_VERSION,
};
pub use config::{
    ProfileRegistry, ProfileSettings, ProfileSource, ProviderKind, ProviderOptions,
    ProviderProfile, DEFAULT_PROFILE,
};
pub use email::Email;
pub use error::MailError;
pub use mailer::{BulkConnector, BulkMailer, DeliveryResult, Mailer};
pub use manager::TemplateManager;
pub use options::{AddressValue, EmailOptions};
pub use service::{BulkItem, ComposedBodies, RenderMode, SendRequest, TemplatedMailer};
pub use store::{MemoryTemplateStore, TemplateStore};
pub use template::{
    EmailTemplate, NewTemplate, TemplateLookup, TemplatePatch, TemplateQuery, TemplateSpec,
};

/// Role names accepted in [`EmailOptions`].
pub mod roles {
    pub use crate::options::{BCC, CC, FROM, REPLY_TO, TO};
}

/// Prelude for convenient imports.
///
/// ```rust
/// use stencil_mail::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BulkItem, DeliveryResult, Email, EmailOptions, MailError, Mailer, MemoryTemplateStore,
        NewTemplate, ProfileRegistry, ProfileSource, ProviderProfile, TemplateManager,
        TemplateSpec, TemplateStore, TemplatedMailer,
    };
}
