use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

#[tokio::test]
async fn a_story_link_is_posted() {
    let test_app = TestApp::spawn_app().await;
    Mock::given(path("/posts"))
        .and(method("POST"))
        .and(body_partial_json(serde_json::json!({
            "function": "post_text",
            "x_post": "https://x.co/a Worth a read."
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.social_server)
        .await;

    let response = test_app
        .post_social(serde_json::json!({"url": "https://x.co/a", "take": "Worth a read."}))
        .await;

    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn a_post_without_url_or_take_returns_400() {
    let test_app = TestApp::spawn_app().await;
    Mock::given(path("/posts"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.social_server)
        .await;

    for body in [
        serde_json::json!({"url": "https://x.co/a"}),
        serde_json::json!({"take": "Worth a read."}),
        serde_json::json!({"url": " ", "take": "Worth a read."}),
    ] {
        let response = test_app.post_social(body).await;

        assert_eq!(400, response.status().as_u16());
    }
}

#[tokio::test]
async fn a_rejected_post_returns_502() {
    let test_app = TestApp::spawn_app().await;
    Mock::given(path("/posts"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&test_app.social_server)
        .await;

    let response = test_app
        .post_social(serde_json::json!({"url": "https://x.co/a", "take": "Worth a read."}))
        .await;

    assert_eq!(502, response.status().as_u16());
}
