//! Template storage trait and the in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;

use crate::error::MailError;
use crate::template::{EmailTemplate, NewTemplate, TemplateLookup, TemplatePatch, TemplateQuery};

/// Persistence for template records.
///
/// Only [`find_one`](TemplateStore::find_one) is used on the send path; the
/// remaining operations back [`TemplateManager`](crate::TemplateManager).
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch the template matching `lookup`.
    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError>;

    /// List templates matching `query`, in insertion order.
    async fn find(&self, query: &TemplateQuery) -> Result<Vec<EmailTemplate>, MailError>;

    /// Insert a new template. Names must be unique.
    async fn create(&self, template: NewTemplate) -> Result<EmailTemplate, MailError>;

    /// Apply `patch` to the matching template.
    async fn update(
        &self,
        lookup: &TemplateLookup,
        patch: TemplatePatch,
    ) -> Result<Option<EmailTemplate>, MailError>;

    /// Remove the matching template, returning it.
    async fn delete(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError>;

    /// Count templates matching `query` (ignores offset/limit).
    async fn count(&self, query: &TemplateQuery) -> Result<usize, MailError>;

    /// Count templates whose name or subject contains `term`.
    async fn count_search(&self, term: &str) -> Result<usize, MailError> {
        self.count(&TemplateQuery::search(term)).await
    }
}

/// Thread-safe in-memory template store.
#[derive(Debug, Default)]
pub struct MemoryTemplateStore {
    templates: RwLock<Vec<EmailTemplate>>,
}

impl MemoryTemplateStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store wrapped in an Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert an existing record as-is (e.g. loaded from a fixture).
    pub fn insert(&self, template: EmailTemplate) {
        self.templates.write().push(template);
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }

    fn name_taken(templates: &[EmailTemplate], name: &str, except_id: Option<&str>) -> bool {
        templates
            .iter()
            .any(|t| t.name == name && Some(t.id.as_str()) != except_id)
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError> {
        Ok(self
            .templates
            .read()
            .iter()
            .find(|t| lookup.matches(t))
            .cloned())
    }

    async fn find(&self, query: &TemplateQuery) -> Result<Vec<EmailTemplate>, MailError> {
        let templates = self.templates.read();
        let matching = templates
            .iter()
            .filter(|t| query.matches(t))
            .skip(query.offset)
            .cloned();
        Ok(match query.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn create(&self, template: NewTemplate) -> Result<EmailTemplate, MailError> {
        let mut templates = self.templates.write();
        if Self::name_taken(&templates, &template.name, None) {
            return Err(MailError::Storage(format!(
                "template name \"{}\" already exists",
                template.name
            )));
        }
        let template = template.into_template();
        templates.push(template.clone());
        Ok(template)
    }

    async fn update(
        &self,
        lookup: &TemplateLookup,
        patch: TemplatePatch,
    ) -> Result<Option<EmailTemplate>, MailError> {
        let mut templates = self.templates.write();
        let Some(index) = templates.iter().position(|t| lookup.matches(t)) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            if Self::name_taken(&templates, name, Some(&templates[index].id)) {
                return Err(MailError::Storage(format!(
                    "template name \"{}\" already exists",
                    name
                )));
            }
        }
        let template = &mut templates[index];
        patch.apply(template);
        Ok(Some(template.clone()))
    }

    async fn delete(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError> {
        let mut templates = self.templates.write();
        Ok(templates
            .iter()
            .position(|t| lookup.matches(t))
            .map(|index| templates.remove(index)))
    }

    async fn count(&self, query: &TemplateQuery) -> Result<usize, MailError> {
        Ok(self
            .templates
            .read()
            .iter()
            .filter(|t| query.matches(t))
            .count())
    }
}

// Allow Arc<MemoryTemplateStore> to be used where TemplateStore is expected
#[async_trait]
impl TemplateStore for Arc<MemoryTemplateStore> {
    async fn find_one(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError> {
        (**self).find_one(lookup).await
    }

    async fn find(&self, query: &TemplateQuery) -> Result<Vec<EmailTemplate>, MailError> {
        (**self).find(query).await
    }

    async fn create(&self, template: NewTemplate) -> Result<EmailTemplate, MailError> {
        (**self).create(template).await
    }

    async fn update(
        &self,
        lookup: &TemplateLookup,
        patch: TemplatePatch,
    ) -> Result<Option<EmailTemplate>, MailError> {
        (**self).update(lookup, patch).await
    }

    async fn delete(&self, lookup: &TemplateLookup) -> Result<Option<EmailTemplate>, MailError> {
        (**self).delete(lookup).await
    }

    async fn count(&self, query: &TemplateQuery) -> Result<usize, MailError> {
        (**self).count(query).await
    }
}
