//! Template management on top of a [`TemplateStore`].

use std::sync::Arc;

use crate::error::MailError;
use crate::store::TemplateStore;
use crate::template::{EmailTemplate, NewTemplate, TemplateLookup, TemplatePatch, TemplateQuery};

/// Create, edit, list and remove stored templates.
///
/// Lookups that match nothing are reported as
/// [`MailError::TemplateNotFound`].
#[derive(Clone)]
pub struct TemplateManager {
    store: Arc<dyn TemplateStore>,
}

impl TemplateManager {
    pub fn new(store: impl TemplateStore + 'static) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    pub fn from_shared(store: Arc<dyn TemplateStore>) -> Self {
        Self { store }
    }

    /// Store a new template. `name` and `subject` must be non-empty.
    pub async fn add(&self, template: NewTemplate) -> Result<EmailTemplate, MailError> {
        if template.name.trim().is_empty() {
            return Err(MailError::MissingField("name"));
        }
        if template.subject.trim().is_empty() {
            return Err(MailError::MissingField("subject"));
        }

        let created = self.store.create(template).await?;
        tracing::info!(template_id = %created.id, name = %created.name, "Email template created");
        Ok(created)
    }

    pub async fn edit(
        &self,
        lookup: &TemplateLookup,
        patch: TemplatePatch,
    ) -> Result<EmailTemplate, MailError> {
        if matches!(patch.name.as_deref(), Some(name) if name.trim().is_empty()) {
            return Err(MailError::MissingField("name"));
        }

        let updated = self
            .store
            .update(lookup, patch)
            .await?
            .ok_or_else(|| MailError::TemplateNotFound(lookup.to_string()))?;
        tracing::info!(template_id = %updated.id, name = %updated.name, "Email template updated");
        Ok(updated)
    }

    pub async fn fetch(&self, lookup: &TemplateLookup) -> Result<EmailTemplate, MailError> {
        self.store
            .find_one(lookup)
            .await?
            .ok_or_else(|| MailError::TemplateNotFound(lookup.to_string()))
    }

    pub async fn fetch_all(&self, query: &TemplateQuery) -> Result<Vec<EmailTemplate>, MailError> {
        self.store.find(query).await
    }

    pub async fn remove(&self, lookup: &TemplateLookup) -> Result<EmailTemplate, MailError> {
        let removed = self
            .store
            .delete(lookup)
            .await?
            .ok_or_else(|| MailError::TemplateNotFound(lookup.to_string()))?;
        tracing::info!(template_id = %removed.id, name = %removed.name, "Email template removed");
        Ok(removed)
    }

    pub async fn count(&self, query: &TemplateQuery) -> Result<usize, MailError> {
        self.store.count(query).await
    }

    /// Count templates whose name or subject contains `term`.
    pub async fn count_search(&self, term: &str) -> Result<usize, MailError> {
        self.store.count_search(term).await
    }
}
