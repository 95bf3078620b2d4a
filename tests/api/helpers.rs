use chrono::{Duration, Utc};
use reqwest::Response;
use secrecy::Secret;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gecko_newsletter::{
    config::{get_configuration, StorageBackend},
    domain::story::{NewStory, Story},
    domain::subscriber::SubscriberProfile,
    domain::subscriber_email::SubscriberEmail,
    domain::subscriber_status::SubscriberStatus,
    startup::{Application, Stores},
    storage::{InMemoryStore, StoryStore, SubscriberStore},
};

pub const SECRET_KEY: &str = "test-secret";

pub struct TestApp {
    pub address: String,
    pub store: InMemoryStore,
    pub email_server: MockServer,
    pub social_server: MockServer,
}

impl TestApp {
    pub async fn spawn_app() -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;
        let social_server = MockServer::start().await;
        let store = InMemoryStore::new();

        // Port 0 asks the OS for any free port, so tests can run in parallel
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        config.set_social_base_url(social_server.uri());
        config.set_storage_backend(StorageBackend::Memory);
        config.publisher.secret_key = Secret::new(SECRET_KEY.to_string());
        config.publisher.sleep_milliseconds = 0;

        let application =
            Application::build_with_stores(config, Stores::in_memory(store.clone()))
                .await
                .expect("Failed to build application.");

        let address = format!("http://127.0.0.1:{}", application.get_port());

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            store,
            email_server,
            social_server,
        }
    }

    pub async fn get_subscription(&self, query: &str) -> Response {
        reqwest::Client::new()
            .get(format!("{}/subscriptions?{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_subscription(&self, body: serde_json::Value) -> Response {
        reqwest::Client::new()
            .post(format!("{}/subscriptions", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_raw_email(&self, route: &str, raw_email: String) -> Response {
        reqwest::Client::new()
            .post(format!("{}{}", self.address, route))
            .header("Content-Type", "message/rfc822")
            .body(raw_email)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn publish(&self, query: &str) -> Response {
        reqwest::Client::new()
            .get(format!("{}/newsletters/publish?{}", self.address, query))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_web_edition(&self) -> Response {
        reqwest::Client::new()
            .get(format!("{}/newsletters/web", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_social(&self, body: serde_json::Value) -> Response {
        reqwest::Client::new()
            .post(format!("{}/social/posts", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Queues `count` complete stories, oldest first.
    pub async fn queue_stories(&self, count: i64) -> Vec<Story> {
        let start = Utc::now() - Duration::hours(1);
        let mut stories = Vec::new();

        for i in 0..count {
            let story = Story::queued(
                NewStory {
                    title: format!("Headline number {}", i),
                    url: format!("https://www.example.com/stories/{}", i),
                    category: "Markets".into(),
                    summary: "Something happened.".into(),
                    take: "It matters.".into(),
                    tags: vec!["markets".into()],
                },
                start + Duration::seconds(i),
            );
            StoryStore::insert(&self.store, &story)
                .await
                .expect("Failed to queue a story.");
            stories.push(story);
        }

        stories
    }

    pub async fn add_subscriber(&self, email: &str, status: SubscriberStatus) {
        let email = SubscriberEmail::parse(email.to_string()).unwrap();
        self.store
            .upsert(&email, &SubscriberProfile::default())
            .await
            .unwrap();
        if status != SubscriberStatus::New {
            self.store.set_status(&email, status).await.unwrap();
        }
    }

    pub async fn subscriber_status(&self, email: &str) -> Option<SubscriberStatus> {
        let email = SubscriberEmail::parse(email.to_string()).unwrap();
        self.store
            .get(&email)
            .await
            .unwrap()
            .and_then(|subscriber| subscriber.status)
    }

    pub async fn accept_emails(&self, expected: u64) {
        Mock::given(path("/mail/send"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(expected)
            .mount(&self.email_server)
            .await;
    }

    /// HTML bodies of every email the provider received.
    pub async fn sent_html(&self) -> Vec<String> {
        self.email_server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|request| {
                let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
                body["content"][0]["value"].as_str().unwrap().to_owned()
            })
            .collect()
    }
}

pub fn get_links(html: &str) -> Vec<String> {
    linkify::LinkFinder::new()
        .links(html)
        .filter(|link| *link.kind() == linkify::LinkKind::Url)
        .map(|link| link.as_str().to_owned())
        .collect()
}
