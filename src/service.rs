//! Templated send orchestration.
//!
//! [`TemplatedMailer`] ties the collaborators together: it resolves a stored
//! template, validates every address, renders the bodies and hands the result
//! to a [`Mailer`] (single sends) or to a [`BulkMailer`] obtained from the
//! template's provider profile (bulk sends).
//!
//! All validation happens before the first network call. Each call makes at
//! most one provider call and returns its outcome; there are no retries.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::address::Address;
use crate::batch::{BatchAddress, BatchContent, BatchMessage, BatchRequest, BatchResult};
use crate::config::{ProfileSource, ProviderProfile};
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{BulkConnector, BulkMailer, DeliveryResult, Mailer};
use crate::options::{AddressValue, EmailOptions, BCC, CC, REPLY_TO, TO};
use crate::render::{decode_entities, Renderer, TemplateParts};
use crate::store::TemplateStore;
use crate::template::{EmailTemplate, TemplateLookup, TemplateSpec};

/// How the bodies of a bulk send are produced.
///
/// Chosen once per call from the resolved template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderMode {
    /// Render subject and bodies here, once per item.
    Local(TemplateParts),
    /// Let the provider render its own template with this id.
    ProviderNative(i64),
}

impl RenderMode {
    /// Provider-native when the template's external id is a positive
    /// integer, local otherwise.
    pub fn for_template(template: &EmailTemplate, subject: &str) -> Self {
        match template.external_template_id() {
            Some(id) => Self::ProviderNative(id),
            None => {
                if let Some(raw) = template.external_id.as_deref().filter(|id| !id.trim().is_empty()) {
                    tracing::warn!(
                        template = %template.name,
                        external_id = raw,
                        "External id is not a positive integer, rendering locally"
                    );
                }
                Self::Local(TemplateParts::from_stored(
                    Some(subject),
                    template.body_html.as_deref(),
                    template.body_text.as_deref(),
                ))
            }
        }
    }
}

/// One recipient entry of a bulk send.
///
/// Everything besides `emailOptions` is template data. The whole item,
/// `emailOptions` included, is the rendering context and the provider-native
/// variables payload.
///
/// ```
/// use stencil_mail::BulkItem;
///
/// let item: BulkItem = serde_json::from_value(serde_json::json!({
///     "emailOptions": { "to": "ann@example.com" },
///     "name": "Ann"
/// })).unwrap();
///
/// assert_eq!(item.email_options.addresses("to"), vec!["ann@example.com"]);
/// assert_eq!(item.data["name"], "Ann");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkItem {
    #[serde(rename = "emailOptions", default)]
    pub email_options: EmailOptions,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl BulkItem {
    /// Item addressed to a single recipient.
    pub fn to(address: impl Into<String>) -> Self {
        Self {
            email_options: EmailOptions::new().to(address.into()),
            data: Map::new(),
        }
    }

    /// Item with explicit address options.
    pub fn with_options(email_options: EmailOptions) -> Self {
        Self {
            email_options,
            data: Map::new(),
        }
    }

    /// Add a data field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// The item as a JSON object.
    pub fn context(&self) -> Result<Value, MailError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Rendered bodies returned by [`TemplatedMailer::compose`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedBodies {
    pub html: String,
    pub text: String,
}

/// Arguments of [`TemplatedMailer::send`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub template_name: String,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub to: String,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub bcc: Option<AddressValue>,
    pub subject: String,
}

impl SendRequest {
    pub fn new(
        template_name: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            template_name: template_name.into(),
            to: to.into(),
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    pub fn bcc(mut self, bcc: impl Into<AddressValue>) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    fn email_options(&self) -> EmailOptions {
        let mut options = EmailOptions::new().to(self.to.clone());
        if let Some(from) = &self.from {
            options = options.from(from.clone());
        }
        if let Some(reply_to) = &self.reply_to {
            options = options.reply_to(reply_to.clone());
        }
        if let Some(bcc) = &self.bcc {
            options = options.bcc(bcc.clone());
        }
        options
    }
}

#[cfg(not(feature = "mailjet"))]
struct NoBulkConnector;

#[cfg(not(feature = "mailjet"))]
impl BulkConnector for NoBulkConnector {
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> {
        Err(MailError::UnsupportedProvider(profile.provider.to_string()))
    }
}

fn default_connector() -> Arc<dyn BulkConnector> {
    #[cfg(feature = "mailjet")]
    {
        Arc::new(crate::providers::MailjetConnector::new())
    }
    #[cfg(not(feature = "mailjet"))]
    {
        Arc::new(NoBulkConnector)
    }
}

/// Renders stored templates and sends them.
///
/// ```rust,ignore
/// use stencil_mail::{EmailOptions, MemoryTemplateStore, ProfileRegistry, TemplateSpec, TemplatedMailer};
/// use stencil_mail::providers::LoggerMailer;
///
/// let service = TemplatedMailer::new(
///     MemoryTemplateStore::shared(),
///     ProfileRegistry::from_env()?,
///     LoggerMailer::new(),
/// );
///
/// service
///     .send_templated_email(
///         &EmailOptions::new().to("ann@example.com"),
///         &TemplateSpec::named("welcome").subject("Welcome {{name}}"),
///         json!({ "name": "Ann" }).as_object().unwrap(),
///     )
///     .await?;
/// ```
pub struct TemplatedMailer {
    store: Arc<dyn TemplateStore>,
    profiles: Arc<dyn ProfileSource>,
    mailer: Arc<dyn Mailer>,
    connector: Arc<dyn BulkConnector>,
    renderer: Renderer,
}

impl TemplatedMailer {
    /// Build a service over the given collaborators.
    ///
    /// Bulk sends connect through Mailjet unless another connector is set
    /// with [`bulk_connector`](Self::bulk_connector).
    pub fn new<S, P, M>(store: S, profiles: P, mailer: M) -> Self
    where
        S: TemplateStore + 'static,
        P: ProfileSource + 'static,
        M: Mailer + 'static,
    {
        Self::from_shared(Arc::new(store), Arc::new(profiles), Arc::new(mailer))
    }

    /// Build a service over already shared collaborators.
    pub fn from_shared(
        store: Arc<dyn TemplateStore>,
        profiles: Arc<dyn ProfileSource>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            store,
            profiles,
            mailer,
            connector: default_connector(),
            renderer: Renderer::new(),
        }
    }

    /// Replace the connector used to reach bulk providers.
    pub fn bulk_connector(mut self, connector: impl BulkConnector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    // =========================================================================
    // Template Resolution
    // =========================================================================

    /// Validate `spec` and fetch the template it names.
    ///
    /// Missing attributes fail before the store is consulted.
    pub async fn resolve(&self, spec: &TemplateSpec) -> Result<EmailTemplate, MailError> {
        let lookup = spec.lookup()?;
        self.find(lookup).await
    }

    async fn find(&self, lookup: TemplateLookup) -> Result<EmailTemplate, MailError> {
        match self.store.find_one(&lookup).await? {
            Some(template) => {
                tracing::debug!(template_id = %template.id, %lookup, "Resolved email template");
                Ok(template)
            }
            None => Err(MailError::TemplateNotFound(lookup.to_string())),
        }
    }

    /// Sender of the template's profile, if that profile is configured.
    fn profile_sender(&self, template: &EmailTemplate) -> Option<Address> {
        match self.profiles.resolve(template.profile.as_deref()) {
            Ok(profile) => profile.sender(),
            Err(e) => {
                tracing::debug!(template = %template.name, error = %e, "No profile sender");
                None
            }
        }
    }

    // =========================================================================
    // Single Send
    // =========================================================================

    /// Render the template named by `spec` with `data` and send it to the
    /// addresses in `options`.
    ///
    /// The subject comes from `spec` and is rendered like the bodies. A text
    /// body is derived from the html when the template has none. Without a
    /// `from` option the sender of the template's profile is used.
    pub async fn send_templated_email(
        &self,
        options: &EmailOptions,
        spec: &TemplateSpec,
        data: &Map<String, Value>,
    ) -> Result<DeliveryResult, MailError> {
        options.validate()?;
        let template = self.resolve(spec).await?;

        let parts = TemplateParts::from_stored(
            Some(spec.subject_line()),
            template.body_html.as_deref(),
            template.body_text.as_deref(),
        );
        let composed = self.renderer.compose(&parts, data)?;

        let email = options.apply_to(Email::new()).composed(composed);
        self.deliver(email, &template).await
    }

    async fn deliver(
        &self,
        mut email: Email,
        template: &EmailTemplate,
    ) -> Result<DeliveryResult, MailError> {
        if email.from.is_none() {
            email.from = self.profile_sender(template);
        }

        let provider = self.mailer.provider_name();
        let span = tracing::info_span!(
            "templated_email.send",
            provider = provider,
            template = %template.name,
            to = ?email.to.iter().map(|a| &a.email).collect::<Vec<_>>(),
            subject = %email.subject,
        );

        async move {
            tracing::debug!("Delivering templated email");

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = self.mailer.deliver(&email).await;

            #[cfg(feature = "metrics")]
            {
                let duration = start.elapsed().as_secs_f64();
                let status = if result.is_ok() { "success" } else { "error" };
                metrics::counter!("templated_email_sent_total", "provider" => provider, "status" => status)
                    .increment(1);
                metrics::histogram!("templated_email_delivery_duration_seconds", "provider" => provider)
                    .record(duration);
            }

            match &result {
                Ok(r) => tracing::info!(message_id = %r.message_id, "Email delivered"),
                Err(e) => tracing::error!(error = %e, "Email delivery failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Bulk Send
    // =========================================================================

    /// Send one message per item through the template's bulk provider.
    ///
    /// Every item is validated and rendered before the single provider call.
    /// The first invalid item aborts the whole send. Per-message failures
    /// reported by the provider are returned in the [`BatchResult`].
    pub async fn send_bulk_templated_email(
        &self,
        spec: &TemplateSpec,
        items: &[BulkItem],
    ) -> Result<BatchResult, MailError> {
        if items.is_empty() || spec.is_empty() {
            return Err(MailError::InvalidParameters(
                "a template and at least one item are required".into(),
            ));
        }

        let template = self.resolve(spec).await?;
        let profile = self.profiles.resolve(template.profile.as_deref())?;
        if !profile.provider.supports_bulk() {
            return Err(MailError::UnsupportedProvider(profile.provider.to_string()));
        }

        let request = self.build_batch(&template, spec.subject_line(), &profile, items)?;
        let mailer = self.connector.connect(&profile)?;
        self.submit(mailer, &request, &template.name).await
    }

    /// Assemble the batch for `items` without sending it.
    pub fn build_batch(
        &self,
        template: &EmailTemplate,
        subject: &str,
        profile: &ProviderProfile,
        items: &[BulkItem],
    ) -> Result<BatchRequest, MailError> {
        let from = profile.sender().map(|sender| BatchAddress::from(&sender)).ok_or_else(|| {
            MailError::Configuration(format!(
                "{} profile has no defaultFrom sender",
                profile.provider
            ))
        })?;
        let mode = RenderMode::for_template(template, subject);

        let mut messages = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            item.email_options.validate()?;

            let recipients = |role: &str| -> Vec<BatchAddress> {
                item.email_options
                    .addresses(role)
                    .into_iter()
                    .map(BatchAddress::new)
                    .collect()
            };
            let to = recipients(TO);
            if to.is_empty() {
                return Err(MailError::InvalidParameters(format!(
                    "item {} has no \"to\" address",
                    index
                )));
            }

            let context = item.context()?;
            let (subject, content) = match &mode {
                RenderMode::ProviderNative(id) => {
                    (subject.to_string(), BatchContent::template(*id, context))
                }
                RenderMode::Local(parts) => {
                    let composed = self.renderer.compose(parts, &context)?;
                    (
                        composed.subject.unwrap_or_default(),
                        BatchContent::parts(composed.text, composed.html),
                    )
                }
            };

            // The sender is always the profile's; an item's own `from` is not used.
            let mut message = BatchMessage::new(from.clone(), to, subject, content)
                .cc(recipients(CC))
                .bcc(recipients(BCC));
            if let Some(reply_to) = recipients(REPLY_TO).into_iter().next() {
                message = message.reply_to(reply_to);
            }
            messages.push(message);
        }

        Ok(BatchRequest { messages })
    }

    async fn submit(
        &self,
        mailer: Arc<dyn BulkMailer>,
        request: &BatchRequest,
        template: &str,
    ) -> Result<BatchResult, MailError> {
        let provider = mailer.provider_name();
        let count = request.len();
        let span = tracing::info_span!(
            "templated_email.send_bulk",
            provider = provider,
            template = template,
            count = count,
        );

        async move {
            tracing::debug!("Submitting batch");

            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = mailer.send_batch(request).await;

            #[cfg(feature = "metrics")]
            {
                let duration = start.elapsed().as_secs_f64();
                let status = if result.is_ok() { "success" } else { "error" };
                metrics::counter!("templated_email_sent_total", "provider" => provider, "status" => status)
                    .increment(count as u64);
                metrics::counter!("templated_email_batch_total", "provider" => provider, "status" => status)
                    .increment(1);
                metrics::histogram!("templated_email_delivery_duration_seconds", "provider" => provider, "batch" => "true")
                    .record(duration);
                metrics::histogram!("templated_email_batch_size", "provider" => provider)
                    .record(count as f64);
            }

            match &result {
                Ok(r) => tracing::info!(
                    succeeded = r.succeeded(),
                    failed = r.failed(),
                    "Batch delivered"
                ),
                Err(e) => tracing::error!(error = %e, "Batch delivery failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Compose Then Send
    // =========================================================================

    /// Render the html and text bodies of the template called
    /// `template_name`. Absent bodies render as empty strings.
    pub async fn compose(
        &self,
        template_name: &str,
        data: &Map<String, Value>,
    ) -> Result<ComposedBodies, MailError> {
        tracing::debug!(
            template = template_name,
            "compose is a legacy entry point, prefer send_templated_email"
        );
        self.compose_template(template_name, data)
            .await
            .map(|(_, bodies)| bodies)
    }

    async fn compose_template(
        &self,
        template_name: &str,
        data: &Map<String, Value>,
    ) -> Result<(EmailTemplate, ComposedBodies), MailError> {
        if template_name.is_empty() {
            return Err(MailError::MissingTemplateAttributes(vec!["name"]));
        }

        let template = self.find(TemplateLookup::Name(template_name.to_string())).await?;
        let render = |body: Option<&str>| -> Result<String, MailError> {
            let source = body.map(decode_entities).unwrap_or_default();
            self.renderer.render(&source, data)
        };

        let bodies = ComposedBodies {
            html: render(template.body_html.as_deref())?,
            text: render(template.body_text.as_deref())?,
        };
        Ok((template, bodies))
    }

    /// Compose `request.template_name` and send it with the given subject.
    ///
    /// The subject is used as given.
    pub async fn send(&self, request: SendRequest) -> Result<DeliveryResult, MailError> {
        tracing::debug!(
            template = %request.template_name,
            "send is a legacy entry point, prefer send_templated_email"
        );
        let options = request.email_options();
        options.validate()?;

        let (template, bodies) = self
            .compose_template(&request.template_name, &request.data)
            .await?;
        let email = options
            .apply_to(Email::new())
            .subject(request.subject)
            .html_body(bodies.html)
            .text_body(bodies.text);

        self.deliver(email, &template).await
    }
}
