//! Mailjet adapter tests.

use base64::Engine;
use serde_json::json;
use stencil_mail::providers::{MailjetConnector, MailjetMailer};
use stencil_mail::{
    BatchAddress, BatchContent, BatchMessage, BatchRequest, BulkConnector, BulkMailer, Email,
    MailError, Mailer, ProviderProfile,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helper Functions
// ============================================================================

fn valid_email() -> Email {
    Email::new()
        .from("sender@example.com")
        .to("receiver@example.com")
        .subject("Hello, world!")
}

fn success_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "Messages": [
            {
                "Status": "success",
                "CustomID": "",
                "To": [
                    {
                        "Email": "receiver@example.com",
                        "MessageUUID": "12345-12345-12345",
                        "MessageID": 123456789,
                        "MessageHref": "https://api.mailjet.com/v3/REST/message/123456789"
                    }
                ],
                "Cc": [],
                "Bcc": []
            }
        ]
    }))
}

fn two_message_batch() -> BatchRequest {
    BatchRequest {
        messages: vec![
            BatchMessage::new(
                BatchAddress {
                    email: "noreply@example.com".into(),
                    name: "Example".into(),
                },
                vec![BatchAddress::new("ann@example.com")],
                "Hi Ann",
                BatchContent::parts(Some("Hi Ann".into()), Some("<p>Hi Ann</p>".into())),
            ),
            BatchMessage::new(
                BatchAddress {
                    email: "noreply@example.com".into(),
                    name: "Example".into(),
                },
                vec![BatchAddress::new("bob@example.com")],
                "Hi {{name}}",
                BatchContent::template(42, json!({ "name": "Bob" })),
            ),
        ],
    }
}

// ============================================================================
// Single Delivery
// ============================================================================

#[tokio::test]
async fn successful_delivery_returns_message_id() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Content-Type", "application/json"))
        .and(body_json(json!({
            "Messages": [
                {
                    "From": {"Email": "sender@example.com", "Name": ""},
                    "To": [{"Email": "receiver@example.com", "Name": ""}],
                    "Subject": "Hello, world!",
                    "TextPart": "Hello",
                    "HTMLPart": "<h1>Hello</h1>"
                }
            ]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    let delivery = mailer
        .deliver(&valid_email().html_body("<h1>Hello</h1>").text_body("Hello"))
        .await
        .unwrap();
    assert_eq!(delivery.message_id, "123456789");
}

#[tokio::test]
async fn sends_basic_auth_header() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    let expected_auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("public_key:private_key")
    );

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", expected_auth.as_str()))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.deliver(&valid_email().text_body("Hello")).await.is_ok());
}

#[tokio::test]
async fn deliver_with_template_id_and_variables() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    let email = valid_email()
        .provider_option("template_id", 123)
        .provider_option("variables", json!({ "firstname": "Pan" }))
        .provider_option("custom_id", "welcome-1");

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "Messages": [
                {
                    "From": {"Email": "sender@example.com", "Name": ""},
                    "To": [{"Email": "receiver@example.com", "Name": ""}],
                    "Subject": "Hello, world!",
                    "TemplateID": 123,
                    "TemplateLanguage": true,
                    "Variables": {"firstname": "Pan"},
                    "CustomID": "welcome-1"
                }
            ]
        })))
        .respond_with(success_response())
        .expect(1)
        .mount(&server)
        .await;

    assert!(mailer.deliver(&email).await.is_ok());
}

#[tokio::test]
async fn unauthorized_delivery_fails_with_status() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "wrong").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ErrorIdentifier": "06df1144-c6f3-4ca7-8885-7ec5d4344113",
            "ErrorMessage": "API key authentication/authorization failure",
            "StatusCode": 401
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer.deliver(&valid_email().text_body("Hello")).await.unwrap_err();
    match err {
        MailError::ProviderSendFailure {
            provider,
            message,
            status,
        } => {
            assert_eq!(provider, "mailjet");
            assert_eq!(status, Some(401));
            assert!(message.contains("authentication"));
        }
        other => panic!("expected provider failure, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_from_fails_before_request() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let err = mailer
        .deliver(&Email::new().to("receiver@example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, MailError::MissingField("from")));
}

// ============================================================================
// Batch Delivery
// ============================================================================

#[tokio::test]
async fn send_batch_posts_every_message_in_one_request() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(json!({
            "Messages": [
                {
                    "From": {"Email": "noreply@example.com", "Name": "Example"},
                    "To": [{"Email": "ann@example.com", "Name": ""}],
                    "Subject": "Hi Ann",
                    "TextPart": "Hi Ann",
                    "HTMLPart": "<p>Hi Ann</p>"
                },
                {
                    "From": {"Email": "noreply@example.com", "Name": "Example"},
                    "To": [{"Email": "bob@example.com", "Name": ""}],
                    "Subject": "Hi {{name}}",
                    "TemplateID": 42,
                    "TemplateLanguage": true,
                    "Variables": {"data": {"name": "Bob"}}
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Messages": [
                {"Status": "success", "To": [{"Email": "ann@example.com", "MessageID": 1}]},
                {"Status": "success", "To": [{"Email": "bob@example.com", "MessageID": 2}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.send_batch(&two_message_batch()).await.unwrap();
    assert_eq!(result.succeeded(), 2);
    assert_eq!(result.message_ids(), vec!["1".to_string(), "2".to_string()]);
}

#[tokio::test]
async fn partial_batch_failure_is_reported_not_raised() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "Messages": [
                {"Status": "success", "To": [{"Email": "ann@example.com", "MessageID": 1}]},
                {
                    "Status": "error",
                    "Errors": [{
                        "ErrorCode": "send-0008",
                        "ErrorMessage": "\"42\" is an invalid template id",
                        "StatusCode": 400
                    }]
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = mailer.send_batch(&two_message_batch()).await.unwrap();
    assert_eq!(result.succeeded(), 1);
    assert_eq!(result.failed(), 1);
    assert_eq!(result.messages[1].errors[0].error_code.as_deref(), Some("send-0008"));
}

#[tokio::test]
async fn rejected_batch_fails_with_status() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "ErrorMessage": "API key authentication/authorization failure",
            "StatusCode": 401
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = mailer.send_batch(&two_message_batch()).await.unwrap_err();
    assert!(matches!(
        err,
        MailError::ProviderSendFailure { status: Some(401), .. }
    ));
}

#[tokio::test]
async fn empty_batch_makes_no_request() {
    let server = MockServer::start().await;
    let mailer = MailjetMailer::new("public_key", "private_key").base_url(server.uri());

    Mock::given(method("POST"))
        .respond_with(success_response())
        .expect(0)
        .mount(&server)
        .await;

    let result = mailer.send_batch(&BatchRequest::default()).await.unwrap();
    assert!(result.messages.is_empty());
}

#[tokio::test]
async fn connector_uses_profile_credentials_and_base_url() {
    let server = MockServer::start().await;
    let profile = ProviderProfile::mailjet("profile_key", "profile_secret").base_url(server.uri());

    let expected_auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode("profile_key:profile_secret")
    );

    Mock::given(method("POST"))
        .and(path("/send"))
        .and(header("Authorization", expected_auth.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Messages": [
                {"Status": "success", "To": [{"Email": "ann@example.com", "MessageID": 1}]},
                {"Status": "success", "To": [{"Email": "bob@example.com", "MessageID": 2}]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let bulk = MailjetConnector::new().connect(&profile).unwrap();
    assert_eq!(bulk.provider_name(), "mailjet");
    assert!(bulk.send_batch(&two_message_batch()).await.is_ok());
}
