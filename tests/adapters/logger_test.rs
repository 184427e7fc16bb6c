//! Logger adapter tests.

use stencil_mail::providers::LoggerMailer;
use stencil_mail::{
    BatchAddress, BatchContent, BatchMessage, BatchRequest, BulkMailer, Email, Mailer,
};

#[tokio::test]
async fn deliver_returns_ok() {
    let mailer = LoggerMailer::new();

    let email = Email::new()
        .from("tony.stark@example.com")
        .to("steve.rogers@example.com")
        .subject("Hello, Avengers!")
        .text_body("Hello!");

    let delivery = mailer.deliver(&email).await.unwrap();
    assert!(!delivery.message_id.is_empty());
}

#[tokio::test]
async fn deliver_with_all_fields_and_full_logging() {
    let mailer = LoggerMailer::full();

    let email = Email::new()
        .from(("Tony Stark", "tony.stark@example.com"))
        .to("steve.rogers@example.com")
        .cc("thor.odinson@example.com")
        .bcc("loki.odinson@example.com")
        .reply_to("bruce.banner@example.com")
        .subject("Hello, Avengers!")
        .html_body("<h1>Hello!</h1>")
        .text_body("Hello!");

    assert!(mailer.deliver(&email).await.is_ok());
}

#[tokio::test]
async fn send_batch_returns_one_result_per_message() {
    let mailer = LoggerMailer::full();
    let request = BatchRequest {
        messages: vec![
            BatchMessage::new(
                BatchAddress::new("tony.stark@example.com"),
                vec![BatchAddress::new("steve.rogers@example.com")],
                "Hello",
                BatchContent::template(1, serde_json::json!({ "name": "Steve" })),
            ),
            BatchMessage::new(
                BatchAddress::new("tony.stark@example.com"),
                vec![BatchAddress::new("natasha.romanoff@example.com")],
                "Hello",
                BatchContent::parts(Some("Hello!".into()), None),
            ),
        ],
    };

    let result = mailer.send_batch(&request).await.unwrap();
    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.failed(), 0);
}
