//! Assertion helpers for tests that send through a [`LocalMailer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use stencil_mail::providers::LocalMailer;
//! use stencil_mail::testing::*;
//!
//! #[tokio::test]
//! async fn test_welcome_flow() {
//!     let mailer = LocalMailer::new();
//!
//!     // ... send a templated email ...
//!
//!     assert_email_sent(&mailer);
//!     assert_email_to(&mailer, "user@example.com");
//!     assert_email_subject_matches(&mailer, r"^Welcome, .+!$");
//!
//!     // ... send a bulk templated email ...
//!
//!     assert_batch_size(&mailer, 3);
//!     assert_batch_to(&mailer, "ann@example.com");
//!     assert_batch_template(&mailer, 42);
//! }
//! ```

use regex::Regex;

use crate::batch::{BatchContent, BatchMessage, BatchRequest};
use crate::email::Email;
use crate::providers::LocalMailer;

// ============================================================================
// Helper Functions
// ============================================================================

fn format_email_summary(emails: &[Email]) -> String {
    if emails.is_empty() {
        return "  (no emails sent)".to_string();
    }

    emails
        .iter()
        .enumerate()
        .map(|(i, e)| {
            let to = e
                .to
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let from = e
                .from
                .as_ref()
                .map(|a| a.email.as_str())
                .unwrap_or("<none>");
            format!(
                "  {}. To: [{}], From: {}, Subject: \"{}\"",
                i + 1,
                to,
                from,
                e.subject
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_batch_summary(batch: &BatchRequest) -> String {
    if batch.is_empty() {
        return "  (empty batch)".to_string();
    }

    batch
        .messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let to = m
                .to
                .iter()
                .map(|a| a.email.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let body = match &m.content {
                BatchContent::Template { template_id, .. } => format!("TemplateID: {}", template_id),
                BatchContent::Parts { .. } => "local parts".to_string(),
            };
            format!(
                "  {}. To: [{}], Subject: \"{}\", {}",
                i + 1,
                to,
                m.subject,
                body
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn last_email(mailer: &LocalMailer) -> Email {
    match mailer.last_email() {
        Some(email) => email,
        None => panic!("Expected at least one email to be sent, but none were sent"),
    }
}

fn last_batch(mailer: &LocalMailer) -> BatchRequest {
    match mailer.last_batch() {
        Some(batch) => batch,
        None => panic!("Expected at least one batch to be sent, but none were sent"),
    }
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("Invalid regex pattern '{}': {}", pattern, e),
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(500)
        .map(|(i, _)| i)
        .unwrap_or(body.len());
    &body[..end]
}

// ============================================================================
// Single Email Assertions
// ============================================================================

/// Assert that at least one single email was sent.
///
/// # Panics
///
/// Panics if no emails were sent.
pub fn assert_email_sent(mailer: &LocalMailer) {
    assert!(
        mailer.has_emails(),
        "Expected at least one email to be sent, but none were sent"
    );
}

/// Assert that no single email was sent.
pub fn assert_no_emails_sent(mailer: &LocalMailer) {
    let emails = mailer.emails();
    assert!(
        emails.is_empty(),
        "Expected no emails to be sent, but {} were sent.\n\nEmails sent:\n{}",
        emails.len(),
        format_email_summary(&emails)
    );
}

/// Assert that exactly N single emails were sent.
pub fn assert_email_count(mailer: &LocalMailer, expected: usize) {
    let actual = mailer.email_count();
    assert!(
        actual == expected,
        "Expected {} email(s) to be sent, but {} were sent.\n\nEmails sent:\n{}",
        expected,
        actual,
        format_email_summary(&mailer.emails())
    );
}

/// Assert that an email was sent to a specific address.
pub fn assert_email_to(mailer: &LocalMailer, email: &str) {
    assert!(
        mailer.sent_to(email),
        "Expected an email to be sent to '{}'.\n\nEmails sent:\n{}",
        email,
        format_email_summary(&mailer.emails())
    );
}

/// Assert that no email was sent to a specific address.
pub fn assert_no_emails_to(mailer: &LocalMailer, email: &str) {
    let emails = mailer.emails();
    let found = emails
        .iter()
        .find(|e| e.to.iter().any(|a| a.email.eq_ignore_ascii_case(email)));

    if let Some(found_email) = found {
        panic!(
            "Expected no email to be sent to '{}', but found one.\n\nMatching email:\n  Subject: \"{}\"\n\nAll emails:\n{}",
            email,
            found_email.subject,
            format_email_summary(&emails)
        );
    }
}

/// Assert that an email with the exact subject was sent.
pub fn assert_email_subject(mailer: &LocalMailer, subject: &str) {
    let emails = mailer.emails();
    assert!(
        emails.iter().any(|e| e.subject == subject),
        "Expected an email with subject '{}'.\n\nEmails sent:\n{}",
        subject,
        format_email_summary(&emails)
    );
}

/// Assert that an email matching a predicate was sent.
pub fn assert_email_matches<F>(mailer: &LocalMailer, predicate: F)
where
    F: Fn(&Email) -> bool,
{
    let matches = mailer.find_emails(predicate);
    assert!(
        !matches.is_empty(),
        "Expected an email matching the predicate, but none was found.\n\nEmails sent:\n{}",
        format_email_summary(&mailer.emails())
    );
}

/// Assert the last email was sent from a specific address.
///
/// # Panics
///
/// Panics if no email was sent or the sender doesn't match.
pub fn assert_email_from(mailer: &LocalMailer, from_email: &str) {
    let last = last_email(mailer);
    let actual_from = last
        .from
        .as_ref()
        .map(|a| a.email.as_str())
        .unwrap_or("<none>");

    assert!(
        actual_from.eq_ignore_ascii_case(from_email),
        "Expected last email from '{}', but was from '{}'.\n\nEmails sent:\n{}",
        from_email,
        actual_from,
        format_email_summary(&mailer.emails())
    );
}

/// Assert the last email's HTML body contains `text`.
pub fn assert_email_html_contains(mailer: &LocalMailer, text: &str) {
    let last = last_email(mailer);
    let html = last.html_body.as_deref().unwrap_or("");

    assert!(
        html.contains(text),
        "Expected HTML body to contain '{}', but it didn't.\n\nLast email:\n{}\n\nHTML body (first 500 chars):\n{}",
        text,
        format_email_summary(std::slice::from_ref(&last)),
        preview(html)
    );
}

/// Assert the last email's text body contains `text`.
pub fn assert_email_text_contains(mailer: &LocalMailer, text: &str) {
    let last = last_email(mailer);
    let body = last.text_body.as_deref().unwrap_or("");

    assert!(
        body.contains(text),
        "Expected text body to contain '{}', but it didn't.\n\nLast email:\n{}\n\nText body (first 500 chars):\n{}",
        text,
        format_email_summary(std::slice::from_ref(&last)),
        preview(body)
    );
}

/// Assert the last email's subject matches a regex pattern.
pub fn assert_email_subject_matches(mailer: &LocalMailer, pattern: &str) {
    let last = last_email(mailer);
    assert!(
        compile(pattern).is_match(&last.subject),
        "Expected subject to match pattern '{}', but was '{}'.",
        pattern,
        last.subject
    );
}

/// Assert the last email's text body matches a regex pattern.
pub fn assert_email_text_matches(mailer: &LocalMailer, pattern: &str) {
    let last = last_email(mailer);
    let text = last.text_body.as_deref().unwrap_or("");

    assert!(
        compile(pattern).is_match(text),
        "Expected text body to match pattern '{}', but it didn't.\n\nText body (first 500 chars):\n{}",
        pattern,
        preview(text)
    );
}

/// Get the last email sent, or panic if none.
pub fn get_last_email(mailer: &LocalMailer) -> Email {
    last_email(mailer)
}

// ============================================================================
// Batch Assertions
// ============================================================================

/// Assert that at least one batch was submitted.
pub fn assert_batch_sent(mailer: &LocalMailer) {
    assert!(
        mailer.batch_count() > 0,
        "Expected at least one batch to be sent, but none were sent"
    );
}

/// Assert that no batch was submitted.
pub fn assert_no_batches_sent(mailer: &LocalMailer) {
    let count = mailer.batch_count();
    assert!(
        count == 0,
        "Expected no batches to be sent, but {} were sent",
        count
    );
}

/// Assert the last batch holds exactly N messages.
pub fn assert_batch_size(mailer: &LocalMailer, expected: usize) {
    let batch = last_batch(mailer);
    assert!(
        batch.len() == expected,
        "Expected a batch of {} message(s), but it had {}.\n\nMessages:\n{}",
        expected,
        batch.len(),
        format_batch_summary(&batch)
    );
}

/// Assert some message of the last batch is addressed to `email`.
pub fn assert_batch_to(mailer: &LocalMailer, email: &str) {
    let batch = last_batch(mailer);
    let found = batch
        .messages
        .iter()
        .any(|m| m.to.iter().any(|a| a.email.eq_ignore_ascii_case(email)));

    assert!(
        found,
        "Expected a batch message to '{}'.\n\nMessages:\n{}",
        email,
        format_batch_summary(&batch)
    );
}

/// Assert every message of the last batch references provider template `id`.
pub fn assert_batch_template(mailer: &LocalMailer, id: i64) {
    let batch = last_batch(mailer);
    let all = !batch.is_empty()
        && batch
            .messages
            .iter()
            .all(|m| m.content.template_id() == Some(id));

    assert!(
        all,
        "Expected every batch message to use TemplateID {}.\n\nMessages:\n{}",
        id,
        format_batch_summary(&batch)
    );
}

/// Assert a message of the last batch matches a predicate.
pub fn assert_batch_message_matches<F>(mailer: &LocalMailer, predicate: F)
where
    F: Fn(&BatchMessage) -> bool,
{
    let batch = last_batch(mailer);
    assert!(
        batch.messages.iter().any(predicate),
        "Expected a batch message matching the predicate, but none was found.\n\nMessages:\n{}",
        format_batch_summary(&batch)
    );
}

/// Get the last batch sent, or panic if none.
pub fn get_last_batch(mailer: &LocalMailer) -> BatchRequest {
    last_batch(mailer)
}
