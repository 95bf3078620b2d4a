use gecko_newsletter::domain::subscriber_email::SubscriberEmail;
use gecko_newsletter::domain::subscriber_status::SubscriberStatus;
use gecko_newsletter::storage::SubscriberStore;
use wiremock::matchers::any;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

#[tokio::test]
async fn subscribe_returns_200_and_stores_the_profile() {
    let test_app = TestApp::spawn_app().await;
    let body = serde_json::json!({
        "email": "  Ann@Example.com ",
        "name": "Ann",
        "zip": "90210",
        "interests": ["ai", "markets"]
    });

    let response = test_app.post_subscription(body).await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "Subscription successful");
    assert_eq!(json["email"], "ann@example.com");
    assert_eq!(json["status"], "subscribed");

    let email = SubscriberEmail::parse("ann@example.com".into()).unwrap();
    let subscriber = test_app.store.get(&email).await.unwrap().unwrap();
    assert_eq!(subscriber.profile.zip.as_deref(), Some("90210"));
    assert_eq!(
        subscriber.profile.interests,
        Some(vec!["ai".to_string(), "markets".to_string()])
    );
}

#[tokio::test]
async fn subscription_links_work_through_the_query_string() {
    let test_app = TestApp::spawn_app().await;
    test_app.add_subscriber("ann@x.com", SubscriberStatus::New).await;

    let response = test_app
        .get_subscription("action=subscribe&email=ann%40x.com&interests=ai,%20chips")
        .await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Subscribed)
    );
}

#[tokio::test]
async fn resubscribing_keeps_previous_profile_fields() {
    let test_app = TestApp::spawn_app().await;

    test_app
        .post_subscription(serde_json::json!({"email": "ann@x.com", "name": "Ann"}))
        .await;
    test_app
        .post_subscription(serde_json::json!({"email": "ann@x.com", "zip": "10001"}))
        .await;

    let email = SubscriberEmail::parse("ann@x.com".into()).unwrap();
    let subscriber = test_app.store.get(&email).await.unwrap().unwrap();
    assert_eq!(
        subscriber.profile.name.as_ref().map(|name| name.as_ref()),
        Some("Ann")
    );
    assert_eq!(subscriber.profile.zip.as_deref(), Some("10001"));
}

#[tokio::test]
async fn unsubscribe_marks_the_subscriber_unsubscribed() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .add_subscriber("ann@x.com", SubscriberStatus::Subscribed)
        .await;

    let response = test_app
        .get_subscription("action=unsubscribe&email=ann%40x.com")
        .await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "Unsubscribe successful");
    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Unsubscribed)
    );
}

#[tokio::test]
async fn unsubscribing_an_unknown_email_is_reported_without_creating_it() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .get_subscription("action=unsubscribe&email=ghost%40x.com")
        .await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "Email not found in subscriber list");
    assert_eq!(test_app.subscriber_status("ghost@x.com").await, None);
}

#[tokio::test]
async fn manana_is_recorded() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .get_subscription("action=ma%C3%B1ana&email=ann%40x.com")
        .await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Manana)
    );
}

#[tokio::test]
async fn subscriptions_return_400_for_invalid_requests() {
    let test_app = TestApp::spawn_app().await;
    let test_cases = vec![
        (serde_json::json!({}), "missing email"),
        (serde_json::json!({"email": "not-an-email"}), "invalid email"),
        (
            serde_json::json!({"email": "ann@x.com", "action": "delete"}),
            "unknown action",
        ),
        (
            serde_json::json!({"email": "ann@x.com", "name": "<script>"}),
            "invalid name",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_subscription(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn the_first_issue_is_sent_on_request() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(2).await;
    test_app.accept_emails(1).await;

    let response = test_app
        .post_subscription(serde_json::json!({"email": "ann@x.com", "send_first_issue": true}))
        .await;

    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "Subscription successful and first newsletter sent");
    let html = &test_app.sent_html().await[0];
    assert!(html.contains("action=unsubscribe&email=ann%40x.com"));
}

#[tokio::test]
async fn a_failed_first_issue_does_not_fail_the_subscription() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&test_app.email_server)
        .await;

    let response = test_app
        .post_subscription(serde_json::json!({"email": "ann@x.com", "send_first_issue": "true"}))
        .await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(
        json["message"],
        "Subscription successful but first newsletter failed to send"
    );
    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Subscribed)
    );
}

#[tokio::test]
async fn inbound_mail_subscribes_the_sender() {
    let test_app = TestApp::spawn_app().await;
    let raw = "From: Ann <ann@x.com>\r\nTo: subscribe@scottgross.works\r\nSubject: hi\r\n\r\nSign me up\r\n";

    let response = test_app
        .post_raw_email("/subscriptions/inbound", raw.to_string())
        .await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Subscribed)
    );
}

#[tokio::test]
async fn inbound_mail_to_the_unsubscribe_mailbox_unsubscribes() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .add_subscriber("ann@x.com", SubscriberStatus::Subscribed)
        .await;
    let raw = "From: ann@x.com\r\nTo: unsubscribe@scottgross.works\r\n\r\nbye\r\n";

    test_app
        .post_raw_email("/subscriptions/inbound", raw.to_string())
        .await;

    assert_eq!(
        test_app.subscriber_status("ann@x.com").await,
        Some(SubscriberStatus::Unsubscribed)
    );
}
