use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use chrono::Utc;

use crate::domain::story::Story;
use crate::ingest::{parse_story_email, IngestError};
use crate::routes::{error_chain_fmt, message_response};
use crate::social::CrossPoster;
use crate::storage::{StorageError, StoryStore};

#[derive(thiserror::Error)]
pub enum StoryIngestError {
    #[error("Validation Error: {0}")]
    Validation(String),
    #[error("JSON Error: {0}")]
    Parse(String),
    #[error("Failed to store the story.")]
    Storage(#[from] StorageError),
}

impl From<IngestError> for StoryIngestError {
    fn from(error: IngestError) -> Self {
        match error {
            IngestError::Validation(message) => StoryIngestError::Validation(message),
            IngestError::Parse(message) => StoryIngestError::Parse(message),
        }
    }
}

impl std::fmt::Debug for StoryIngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for StoryIngestError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoryIngestError::Validation(_) | StoryIngestError::Parse(_) => {
                StatusCode::BAD_REQUEST
            }
            StoryIngestError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        message_response(self.status_code(), self)
    }
}

#[derive(serde::Serialize, Debug)]
pub struct StoryIngestResponse {
    pub message: String,
    pub key: String,
    pub kind: String,
    pub cross_posted: bool,
}

/// Stores a story mailed to the story inbox, then shares it.
#[tracing::instrument(name = "Ingesting a story", skip(raw_email, stories, cross_poster))]
pub async fn handle_inbound_story(
    raw_email: web::Bytes,
    stories: web::Data<dyn StoryStore>,
    cross_poster: web::Data<CrossPoster>,
) -> Result<HttpResponse, StoryIngestError> {
    let new_story = parse_story_email(&raw_email)?;
    let story = Story::queued(new_story, Utc::now());

    stories.insert(&story).await?;
    tracing::info!("Stored story {} in the {} queue", story.key, story.kind.as_ref());

    let cross_posted = cross_poster.share(&story).await;

    Ok(HttpResponse::Ok().json(StoryIngestResponse {
        message: format!(
            "Story added to '{}' queue: {}",
            story.kind.as_ref(),
            story.title
        ),
        key: story.key,
        kind: story.kind.as_ref().to_string(),
        cross_posted,
    }))
}
