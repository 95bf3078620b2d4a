use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::attribute::{merge, AttributeValue, Item};
use crate::domain::story::{Story, StoryKind, StoryStatus};
use crate::domain::subscriber::{Subscriber, SubscriberProfile, SUBSCRIBER_PARTITION};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::storage::{StorageError, StoryStore, SubscriberStore};

type Key = (String, String);

/// In-memory backend for local runs and tests.
///
/// Records are kept in a `BTreeMap` ordered by `(pk, sk)` behind a mutex and
/// go through the same attribute encoding as the database backend. Not
/// durable: everything is lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    items: Arc<Mutex<BTreeMap<Key, Item>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw access for assertions in tests.
    pub async fn item(&self, pk: &str, sk: &str) -> Option<Item> {
        let items = self.items.lock().await;
        items.get(&(pk.to_string(), sk.to_string())).cloned()
    }

    pub async fn story(&self, key: &str) -> Option<Story> {
        let items = self.items.lock().await;
        items
            .iter()
            .find(|((_, sk), _)| sk == key)
            .and_then(|(_, item)| Story::try_from(item.clone()).ok())
    }
}

fn subscriber_key(email: &SubscriberEmail) -> Key {
    (SUBSCRIBER_PARTITION.to_string(), email.as_ref().to_string())
}

fn decode_subscriber(item: &Item) -> Result<Subscriber, StorageError> {
    Subscriber::try_from(item.clone()).map_err(StorageError::Corrupt)
}

#[async_trait]
impl SubscriberStore for InMemoryStore {
    async fn get(&self, email: &SubscriberEmail) -> Result<Option<Subscriber>, StorageError> {
        let items = self.items.lock().await;
        items.get(&subscriber_key(email)).map(decode_subscriber).transpose()
    }

    async fn upsert_with_status(
        &self,
        email: &SubscriberEmail,
        profile: &SubscriberProfile,
        initial: Option<SubscriberStatus>,
    ) -> Result<Subscriber, StorageError> {
        let mut items = self.items.lock().await;
        let now = Utc::now();
        let mut attributes = profile.to_attributes();

        let item = match items.get_mut(&subscriber_key(email)) {
            Some(existing) => {
                attributes.insert("date_updated".into(), AttributeValue::timestamp(now));
                merge(&mut existing.attributes, attributes);
                existing.clone()
            }
            None => {
                attributes.insert("date_created".into(), AttributeValue::timestamp(now));
                let item = Item {
                    pk: SUBSCRIBER_PARTITION.to_string(),
                    sk: email.as_ref().to_string(),
                    status: initial.map(|status| status.as_ref().to_string()),
                    attributes,
                };
                items.insert(subscriber_key(email), item.clone());
                item
            }
        };

        decode_subscriber(&item)
    }

    async fn set_status(
        &self,
        email: &SubscriberEmail,
        status: SubscriberStatus,
    ) -> Result<Subscriber, StorageError> {
        let mut items = self.items.lock().await;
        let existing = items
            .get_mut(&subscriber_key(email))
            .ok_or_else(|| StorageError::NotFound(email.to_string()))?;

        existing.status = Some(status.as_ref().to_string());
        existing
            .attributes
            .insert("date_updated".into(), AttributeValue::timestamp(Utc::now()));

        decode_subscriber(existing)
    }

    async fn list_by_status(
        &self,
        status: SubscriberStatus,
    ) -> Result<Vec<Subscriber>, StorageError> {
        let items = self.items.lock().await;
        items
            .values()
            .filter(|item| item.pk == SUBSCRIBER_PARTITION)
            .filter(|item| item.status.as_deref() == Some(status.as_ref()))
            .map(decode_subscriber)
            .collect()
    }
}

#[async_trait]
impl StoryStore for InMemoryStore {
    async fn insert(&self, story: &Story) -> Result<(), StorageError> {
        let item = story.to_item();
        let mut items = self.items.lock().await;
        items.insert((item.pk.clone(), item.sk.clone()), item);
        Ok(())
    }

    async fn queued(&self, limit: usize) -> Result<Vec<Story>, StorageError> {
        let items = self.items.lock().await;
        items
            .values()
            .filter(|item| item.pk == StoryKind::Story.as_ref())
            .filter(|item| item.status.as_deref() == Some(StoryStatus::Queued.as_ref()))
            .take(limit)
            .map(|item| Story::try_from(item.clone()).map_err(StorageError::Corrupt))
            .collect()
    }

    async fn mark_published(
        &self,
        keys: &[String],
        published_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut items = self.items.lock().await;
        let story_keys: Vec<Key> = keys
            .iter()
            .map(|sk| (StoryKind::Story.as_ref().to_string(), sk.clone()))
            .collect();

        let still_queued = story_keys
            .iter()
            .filter(|key| {
                items.get(*key).and_then(|item| item.status.as_deref())
                    == Some(StoryStatus::Queued.as_ref())
            })
            .count();
        if still_queued != keys.len() {
            return Err(StorageError::Conflict {
                expected: keys.len(),
                updated: still_queued,
            });
        }

        for key in story_keys {
            if let Some(item) = items.get_mut(&key) {
                item.status = Some(StoryStatus::Published.as_ref().to_string());
                item.attributes.insert(
                    "published_date".into(),
                    AttributeValue::timestamp(published_at),
                );
            }
        }

        Ok(())
    }
}
