use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;
use unicode_segmentation::UnicodeSegmentation;

use crate::domain::story::{Story, StoryKind};

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);
const ELLIPSIS: &str = "...";
const MIN_TAKE_LENGTH: usize = 10;

/// Publishes short text posts to a social platform.
#[async_trait]
pub trait Poster: Send + Sync + 'static {
    async fn post_text(&self, text: &str) -> Result<(), PosterError>;
}

#[derive(thiserror::Error, Debug)]
pub enum PosterError {
    #[error("The social platform rejected the post: {0}")]
    Rejected(String),
    #[error("Failed to reach the social platform.")]
    Transport(#[from] reqwest::Error),
}

pub struct HttpPoster {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
struct PostBody<'a> {
    function: &'a str,
    x_post: &'a str,
}

impl HttpPoster {
    pub fn new(
        base_url: String,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<HttpPoster, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(HttpPoster {
            http_client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl Poster for HttpPoster {
    #[tracing::instrument(name = "Posting to social", skip(self, text))]
    async fn post_text(&self, text: &str) -> Result<(), PosterError> {
        let response = self
            .http_client
            .post(format!("{}/posts", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&PostBody {
                function: "post_text",
                x_post: text,
            })
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            let reason = response.text().await.unwrap_or_default();
            return Err(PosterError::Rejected(format!("{} {}", status, reason)));
        }
        response.error_for_status()?;

        Ok(())
    }
}

/// Builds `"<url> <take>"`, shortening the take to fit `max_len` graphemes.
/// Falls back to the bare URL when too little of the take would survive.
pub fn compose_post(url: &str, take: &str, max_len: usize) -> String {
    let text = format!("{} {}", url, take);
    if text.graphemes(true).count() <= max_len {
        return text;
    }

    let url_len = url.graphemes(true).count();
    let available = max_len.saturating_sub(url_len + 1 + ELLIPSIS.len());
    if available > MIN_TAKE_LENGTH {
        let shortened: String = take.graphemes(true).take(available).collect();
        format!("{} {}{}", url, shortened.trim_end(), ELLIPSIS)
    } else {
        url.to_string()
    }
}

/// Shares freshly ingested stories. Failures are logged and swallowed.
pub struct CrossPoster {
    poster: Box<dyn Poster>,
    max_post_length: usize,
}

impl CrossPoster {
    pub fn new(poster: Box<dyn Poster>, max_post_length: usize) -> Self {
        Self {
            poster,
            max_post_length,
        }
    }

    pub fn max_post_length(&self) -> usize {
        self.max_post_length
    }

    /// Posts `story` when it is a full story. Returns whether a post went out.
    #[tracing::instrument(name = "Cross-posting a story", skip(self, story), fields(story_key = %story.key))]
    pub async fn share(&self, story: &Story) -> bool {
        if story.kind != StoryKind::Story {
            tracing::info!("Skipping cross-post for a lead");
            return false;
        }

        let text = compose_post(&story.url, &story.take, self.max_post_length);
        self.post(&text).await
    }

    pub async fn post(&self, text: &str) -> bool {
        match self.poster.post_text(text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error.cause_chain = ?e, error.message = %e, "Failed to cross-post");
                false
            }
        }
    }
}
