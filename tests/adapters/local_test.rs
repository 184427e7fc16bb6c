//! Local adapter tests.

use stencil_mail::providers::LocalMailer;
use stencil_mail::{
    BatchAddress, BatchContent, BatchMessage, BatchRequest, BulkConnector, BulkMailer, Email,
    Mailer, ProviderProfile,
};

fn batch_to(recipients: &[&str]) -> BatchRequest {
    BatchRequest {
        messages: recipients
            .iter()
            .map(|to| BatchMessage::new(
                BatchAddress::new("tony.stark@example.com"),
                vec![BatchAddress::new(*to)],
                "Hello, Avengers!",
                BatchContent::parts(Some("Hello!".into()), None),
            ))
            .collect(),
    }
}

#[tokio::test]
async fn deliver_returns_ok_and_captures() {
    let mailer = LocalMailer::new();

    let email = Email::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .text_body("Hello!");

    let result = mailer.deliver(&email).await.unwrap();
    assert!(!result.message_id.is_empty());
    assert_eq!(mailer.email_count(), 1);
    assert_eq!(mailer.emails()[0].subject, "Hello, Avengers!");
}

#[tokio::test]
async fn clones_share_captured_mail() {
    let mailer = LocalMailer::new();
    let clone = mailer.clone();

    clone
        .deliver(&Email::new().to("steve.rogers@example.com"))
        .await
        .unwrap();
    assert!(mailer.sent_to("steve.rogers@example.com"));
}

#[tokio::test]
async fn send_batch_reports_success_per_message() {
    let mailer = LocalMailer::new();
    let result = mailer
        .send_batch(&batch_to(&["steve.rogers@example.com", "natasha.romanoff@example.com"]))
        .await
        .unwrap();

    assert_eq!(result.messages.len(), 2);
    assert!(result.messages.iter().all(|m| m.is_success()));
    assert_eq!(result.message_ids().len(), 2);
    assert_eq!(mailer.batches()[0].len(), 2);
}

#[tokio::test]
async fn connector_hands_out_capturing_mailer() {
    let mailer = LocalMailer::new();
    let profile = ProviderProfile::mailjet("pk", "sk").default_from("tony.stark@example.com", None);

    let bulk = mailer.connect(&profile).unwrap();
    bulk.send_batch(&batch_to(&["steve.rogers@example.com"])).await.unwrap();

    assert_eq!(bulk.provider_name(), "local");
    assert_eq!(mailer.connections(), vec![profile]);
    assert_eq!(mailer.batch_count(), 1);
}

#[tokio::test]
async fn failure_simulation_applies_to_batches() {
    let mailer = LocalMailer::new();
    mailer.set_failure("smtp down");

    let err = mailer
        .send_batch(&batch_to(&["steve.rogers@example.com"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("smtp down"));
    assert_eq!(mailer.batch_count(), 0);
}
