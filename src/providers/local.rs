//! Local mailer for development and testing.
//!
//! Captures single emails and whole batches in memory so tests can assert on
//! what would have been sent. It also acts as its own [`BulkConnector`], so a
//! single instance can stand in for both providers of a
//! [`TemplatedMailer`](crate::TemplatedMailer).
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use stencil_mail::providers::LocalMailer;
//! use stencil_mail::testing::*;
//!
//! #[tokio::test]
//! async fn test_sends_welcome_email() {
//!     let mailer = LocalMailer::new();
//!     let service = TemplatedMailer::new(store, profiles, mailer.clone())
//!         .bulk_connector(mailer.clone());
//!
//!     // Code under test
//!     send_welcome_email(&service, "user@example.com").await;
//!
//!     assert_email_sent(&mailer);
//!     assert_email_to(&mailer, "user@example.com");
//! }
//! ```

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::batch::{BatchRequest, BatchResult, BatchMessageResult, RecipientResult};
use crate::config::ProviderProfile;
use crate::email::Email;
use crate::error::MailError;
use crate::mailer::{BulkConnector, BulkMailer, DeliveryResult, Mailer};

#[derive(Default)]
struct Captured {
    emails: Mutex<Vec<Email>>,
    batches: Mutex<Vec<BatchRequest>>,
    connections: Mutex<Vec<ProviderProfile>>,
    /// If set, every send returns this error (for testing error paths).
    fail_with: RwLock<Option<String>>,
    next_id: AtomicI64,
}

/// Local mailer that stores emails and batches in memory.
///
/// Clones share the same captured state.
#[derive(Clone, Default)]
pub struct LocalMailer {
    inner: Arc<Captured>,
}

impl LocalMailer {
    /// Create a new local mailer with nothing captured.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Failure Simulation (for testing)
    // =========================================================================

    /// Make every subsequent send fail with a provider error.
    ///
    /// ```rust,ignore
    /// let mailer = LocalMailer::new();
    /// mailer.set_failure("connection refused");
    /// assert!(mailer.deliver(&email).await.is_err());
    /// ```
    pub fn set_failure(&self, message: impl Into<String>) {
        *self.inner.fail_with.write() = Some(message.into());
    }

    /// Clear the failure state.
    pub fn clear_failure(&self) {
        *self.inner.fail_with.write() = None;
    }

    fn check_failure(&self) -> Result<(), MailError> {
        match self.inner.fail_with.read().as_ref() {
            Some(message) => Err(MailError::provider("local", message.clone())),
            None => Ok(()),
        }
    }

    fn next_id(&self) -> i64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // =========================================================================
    // Captured Mail Access (for testing assertions)
    // =========================================================================

    /// All captured single emails, oldest first.
    pub fn emails(&self) -> Vec<Email> {
        self.inner.emails.lock().clone()
    }

    /// The most recently sent single email.
    pub fn last_email(&self) -> Option<Email> {
        self.inner.emails.lock().last().cloned()
    }

    pub fn email_count(&self) -> usize {
        self.inner.emails.lock().len()
    }

    pub fn has_emails(&self) -> bool {
        self.email_count() > 0
    }

    /// All captured batches, oldest first.
    pub fn batches(&self) -> Vec<BatchRequest> {
        self.inner.batches.lock().clone()
    }

    /// The most recently submitted batch.
    pub fn last_batch(&self) -> Option<BatchRequest> {
        self.inner.batches.lock().last().cloned()
    }

    pub fn batch_count(&self) -> usize {
        self.inner.batches.lock().len()
    }

    /// Profiles this mailer was connected with, oldest first.
    pub fn connections(&self) -> Vec<ProviderProfile> {
        self.inner.connections.lock().clone()
    }

    /// Check if a single email was sent to a specific address.
    pub fn sent_to(&self, email: &str) -> bool {
        self.inner
            .emails
            .lock()
            .iter()
            .any(|e| e.to.iter().any(|addr| addr.email.eq_ignore_ascii_case(email)))
    }

    /// Find single emails matching a predicate.
    pub fn find_emails<F>(&self, predicate: F) -> Vec<Email>
    where
        F: Fn(&Email) -> bool,
    {
        self.inner
            .emails
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Remove and return everything captured.
    pub fn flush(&self) -> (Vec<Email>, Vec<BatchRequest>) {
        let emails = std::mem::take(&mut *self.inner.emails.lock());
        let batches = std::mem::take(&mut *self.inner.batches.lock());
        self.inner.connections.lock().clear();
        (emails, batches)
    }
}

#[async_trait]
impl Mailer for LocalMailer {
    async fn deliver(&self, email: &Email) -> Result<DeliveryResult, MailError> {
        self.check_failure()?;

        let message_id = self.next_id().to_string();
        self.inner.emails.lock().push(email.clone());
        Ok(DeliveryResult::new(message_id))
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

#[async_trait]
impl BulkMailer for LocalMailer {
    async fn send_batch(&self, request: &BatchRequest) -> Result<BatchResult, MailError> {
        self.check_failure()?;

        let messages = request
            .messages
            .iter()
            .map(|message| BatchMessageResult {
                status: "success".to_string(),
                to: message
                    .to
                    .iter()
                    .map(|to| RecipientResult {
                        email: to.email.clone(),
                        message_id: Some(self.next_id()),
                        message_uuid: Some(uuid::Uuid::new_v4().to_string()),
                    })
                    .collect(),
                errors: Vec::new(),
            })
            .collect();

        self.inner.batches.lock().push(request.clone());
        Ok(BatchResult { messages })
    }

    fn provider_name(&self) -> &'static str {
        "local"
    }
}

impl BulkConnector for LocalMailer {
    fn connect(&self, profile: &ProviderProfile) -> Result<Arc<dyn BulkMailer>, MailError> {
        self.inner.connections.lock().push(profile.clone());
        Ok(Arc::new(self.clone()))
    }
}
