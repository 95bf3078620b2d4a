//! Persistence for subscribers and stories.
//!
//! Both record kinds share one keyed table: `(pk, sk)` identifies a record and
//! `status` backs the secondary index used for lifecycle queries. Backends
//! implement [`SubscriberStore`] and [`StoryStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::story::Story;
use crate::domain::subscriber::{Subscriber, SubscriberProfile};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;

#[derive(thiserror::Error)]
pub enum StorageError {
    #[error("The storage backend is unavailable.")]
    Unavailable(#[from] sqlx::Error),
    #[error("No record found for {0}.")]
    NotFound(String),
    #[error("A stored record is malformed: {0}")]
    Corrupt(String),
    #[error("Only {updated} of {expected} stories were still queued.")]
    Conflict { expected: usize, updated: usize },
}

impl std::fmt::Debug for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let StorageError::Unavailable(source) = self {
            write!(f, "\nCaused by:\n\t{}", source)?;
        }
        Ok(())
    }
}

#[async_trait]
pub trait SubscriberStore: Send + Sync + 'static {
    async fn get(&self, email: &SubscriberEmail) -> Result<Option<Subscriber>, StorageError>;

    /// Merges `profile` into the stored record. A missing record is created
    /// with status `new`; `date_created` and `status` are never touched on an
    /// existing record.
    async fn upsert(
        &self,
        email: &SubscriberEmail,
        profile: &SubscriberProfile,
    ) -> Result<Subscriber, StorageError> {
        self.upsert_with_status(email, profile, Some(SubscriberStatus::New))
            .await
    }

    /// Same merge as [`SubscriberStore::upsert`], but a missing record is
    /// created with `initial` as its status. `None` leaves it unset, which
    /// marks a preview-only prospect.
    async fn upsert_with_status(
        &self,
        email: &SubscriberEmail,
        profile: &SubscriberProfile,
        initial: Option<SubscriberStatus>,
    ) -> Result<Subscriber, StorageError>;

    /// Rewrites the status of an existing record and stamps `date_updated`.
    async fn set_status(
        &self,
        email: &SubscriberEmail,
        status: SubscriberStatus,
    ) -> Result<Subscriber, StorageError>;

    /// Every subscriber currently in `status`, across all pages.
    async fn list_by_status(
        &self,
        status: SubscriberStatus,
    ) -> Result<Vec<Subscriber>, StorageError>;
}

#[async_trait]
pub trait StoryStore: Send + Sync + 'static {
    async fn insert(&self, story: &Story) -> Result<(), StorageError>;

    /// Up to `limit` queued stories of kind `story`, oldest first.
    async fn queued(&self, limit: usize) -> Result<Vec<Story>, StorageError>;

    /// Moves every story in `keys` from `queued` to `published` with one
    /// shared `published_date`. Nothing changes unless all of them are still
    /// queued.
    async fn mark_published(
        &self,
        keys: &[String],
        published_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}
