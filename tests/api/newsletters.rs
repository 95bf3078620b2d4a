use gecko_newsletter::domain::story::StoryStatus;
use gecko_newsletter::domain::subscriber_email::SubscriberEmail;
use gecko_newsletter::domain::subscriber_status::SubscriberStatus;
use gecko_newsletter::storage::SubscriberStore;
use wiremock::matchers::any;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{get_links, TestApp, SECRET_KEY};

fn broadcast_query() -> String {
    format!("source=manual&secret_key={}", SECRET_KEY)
}

#[tokio::test]
async fn broadcasts_are_delivered_to_subscribed_users_only() {
    let test_app = TestApp::spawn_app().await;
    let stories = test_app.queue_stories(3).await;
    test_app
        .add_subscriber("ann@x.com", SubscriberStatus::Subscribed)
        .await;
    test_app.add_subscriber("bob@x.com", SubscriberStatus::New).await;
    test_app
        .add_subscriber("cat@x.com", SubscriberStatus::Unsubscribed)
        .await;
    test_app.accept_emails(1).await;

    let response = test_app.publish(&broadcast_query()).await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["stories_count"], 3);
    assert_eq!(json["recipients_count"], 1);
    for story in stories {
        let stored = test_app.store.story(&story.key).await.unwrap();
        assert_eq!(stored.status, StoryStatus::Published);
    }

    let html = &test_app.sent_html().await[0];
    let unsubscribe_link = get_links(html)
        .into_iter()
        .find(|link| link.contains("action=unsubscribe"))
        .expect("No unsubscribe link in the newsletter");
    assert!(unsubscribe_link.contains("email=ann%40x.com"));
}

#[tokio::test]
async fn broadcast_without_subscribers_publishes_and_returns_404() {
    let test_app = TestApp::spawn_app().await;
    let stories = test_app.queue_stories(3).await;
    test_app.accept_emails(0).await;

    let response = test_app.publish(&broadcast_query()).await;

    assert_eq!(404, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "No subscribed users found");
    for story in stories {
        let stored = test_app.store.story(&story.key).await.unwrap();
        assert_eq!(stored.status, StoryStatus::Published);
    }
}

#[tokio::test]
async fn broadcast_with_nothing_queued_is_a_no_op() {
    let test_app = TestApp::spawn_app().await;
    test_app
        .add_subscriber("ann@x.com", SubscriberStatus::Subscribed)
        .await;
    test_app.accept_emails(0).await;

    let response = test_app.publish(&broadcast_query()).await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "No new stories to publish");
}

#[tokio::test]
async fn broadcast_requires_the_manual_source_and_secret() {
    let test_app = TestApp::spawn_app().await;
    let stories = test_app.queue_stories(1).await;
    test_app.accept_emails(0).await;
    let test_cases = vec![
        ("", "no credentials"),
        ("source=manual", "missing secret"),
        ("source=manual&secret_key=wrong", "wrong secret"),
        ("secret_key=test-secret", "missing source"),
        ("source=scheduled&secret_key=test-secret", "claimed scheduled source"),
    ];

    for (query, description) in test_cases {
        let response = test_app.publish(query).await;

        assert_eq!(
            404,
            response.status().as_u16(),
            "The API did not fail with 404 when the request had {}",
            description
        );
    }
    let stored = test_app.store.story(&stories[0].key).await.unwrap();
    assert_eq!(stored.status, StoryStatus::Queued);
}

#[tokio::test]
async fn preview_sends_an_outreach_edition_without_publishing() {
    let test_app = TestApp::spawn_app().await;
    let stories = test_app.queue_stories(2).await;
    test_app.accept_emails(1).await;

    let response = test_app
        .publish("preview=true&email=lead%40x.com&name=Lee&zip=02139")
        .await;

    assert_eq!(200, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["mode"], "preview");
    let html = &test_app.sent_html().await[0];
    assert!(html.contains("mailto:subscribe@scottgross.works"));
    for story in stories {
        let stored = test_app.store.story(&story.key).await.unwrap();
        assert_eq!(stored.status, StoryStatus::Queued);
    }
    let lead = SubscriberEmail::parse("lead@x.com".into()).unwrap();
    let prospect = test_app.store.get(&lead).await.unwrap().unwrap();
    assert_eq!(prospect.status, None);
    assert_eq!(prospect.profile.zip.as_deref(), Some("02139"));
}

#[tokio::test]
async fn preview_prospects_do_not_receive_refresh_mail() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;
    test_app.accept_emails(1).await;

    test_app.publish("preview=true&email=lead%40x.com").await;
    let json: serde_json::Value = test_app.publish("refresh=true").await.json().await.unwrap();

    assert_eq!(json["recipients_count"], 0);
    assert_eq!(json["message"], "No subscribers to refresh");
    assert_eq!(test_app.subscriber_status("lead@x.com").await, None);
}

#[tokio::test]
async fn preview_without_stories_returns_404() {
    let test_app = TestApp::spawn_app().await;
    test_app.accept_emails(0).await;

    let response = test_app.publish("preview=true&email=lead%40x.com").await;

    assert_eq!(404, response.status().as_u16());
    let json: serde_json::Value = response.json().await.unwrap();
    assert_eq!(json["message"], "No stories available for newsletter");
    assert_eq!(test_app.subscriber_status("lead@x.com").await, None);
}

#[tokio::test]
async fn preview_without_an_email_returns_400() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;

    let response = test_app.publish("preview=true").await;

    assert_eq!(400, response.status().as_u16());
}

#[tokio::test]
async fn refresh_targets_new_subscribers_once() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;
    test_app.add_subscriber("ann@x.com", SubscriberStatus::New).await;
    test_app.add_subscriber("bob@x.com", SubscriberStatus::New).await;
    test_app
        .add_subscriber("cat@x.com", SubscriberStatus::Subscribed)
        .await;
    test_app.accept_emails(2).await;

    let first: serde_json::Value = test_app.publish("refresh=true").await.json().await.unwrap();
    let second: serde_json::Value = test_app.publish("refresh=true").await.json().await.unwrap();

    assert_eq!(first["sent_count"], 2);
    assert_eq!(second["recipients_count"], 0);
    for email in ["ann@x.com", "bob@x.com"] {
        assert_eq!(
            test_app.subscriber_status(email).await,
            Some(SubscriberStatus::Refreshed)
        );
    }
    assert_eq!(
        test_app.subscriber_status("cat@x.com").await,
        Some(SubscriberStatus::Subscribed)
    );
}

#[tokio::test]
async fn a_failing_recipient_does_not_stop_a_broadcast() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;
    for email in ["ann@x.com", "bob@x.com", "cat@x.com"] {
        test_app
            .add_subscriber(email, SubscriberStatus::Subscribed)
            .await;
    }
    Mock::given(any())
        .respond_with(ResponseTemplate::new(400))
        .up_to_n_times(1)
        .mount(&test_app.email_server)
        .await;
    test_app.accept_emails(2).await;

    let json: serde_json::Value = test_app
        .publish(&broadcast_query())
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(json["recipients_count"], 3);
    assert_eq!(json["sent_count"], 2);
}

#[tokio::test]
async fn the_web_edition_is_html() {
    let test_app = TestApp::spawn_app().await;
    test_app.queue_stories(1).await;

    let response = test_app.get_web_edition().await;

    assert_eq!(200, response.status().as_u16());
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(response.text().await.unwrap().contains("Headline number 0"));
}

#[tokio::test]
async fn the_web_edition_returns_404_without_stories() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.get_web_edition().await;

    assert_eq!(404, response.status().as_u16());
}
