use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::domain::attribute::{AttributeValue, Attributes, Item};
use crate::domain::story::{Story, StoryKind, StoryStatus};
use crate::domain::subscriber::{Subscriber, SubscriberProfile, SUBSCRIBER_PARTITION};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::storage::{StorageError, StoryStore, SubscriberStore};

/// PostgreSQL backend over the single `items` table.
#[derive(Clone)]
pub struct PostgresStore {
    db_pool: PgPool,
    page_size: usize,
}

impl PostgresStore {
    pub fn new(db_pool: PgPool, page_size: usize) -> Self {
        Self {
            db_pool,
            page_size: page_size.max(1),
        }
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, StorageError> {
    let Json(attributes): Json<Attributes> = row.try_get("attributes")?;

    Ok(Item {
        pk: row.try_get("pk")?,
        sk: row.try_get("sk")?,
        status: row.try_get("status")?,
        attributes,
    })
}

fn subscriber_from_row(row: &PgRow) -> Result<Subscriber, StorageError> {
    Subscriber::try_from(item_from_row(row)?).map_err(StorageError::Corrupt)
}

fn stamped(mut attributes: Attributes, field: &str, at: DateTime<Utc>) -> Attributes {
    attributes.insert(field.to_string(), AttributeValue::timestamp(at));
    attributes
}

#[async_trait]
impl SubscriberStore for PostgresStore {
    #[tracing::instrument(name = "Fetching a subscriber", skip(self), fields(email = %email))]
    async fn get(&self, email: &SubscriberEmail) -> Result<Option<Subscriber>, StorageError> {
        sqlx::query("SELECT pk, sk, status, attributes FROM items WHERE pk = $1 AND sk = $2")
            .bind(SUBSCRIBER_PARTITION)
            .bind(email.as_ref())
            .fetch_optional(&self.db_pool)
            .await?
            .as_ref()
            .map(subscriber_from_row)
            .transpose()
    }

    #[tracing::instrument(name = "Upserting a subscriber", skip(self, profile), fields(email = %email))]
    async fn upsert_with_status(
        &self,
        email: &SubscriberEmail,
        profile: &SubscriberProfile,
        initial: Option<SubscriberStatus>,
    ) -> Result<Subscriber, StorageError> {
        let now = Utc::now();
        let created = stamped(profile.to_attributes(), "date_created", now);
        let updated = stamped(profile.to_attributes(), "date_updated", now);

        // `||` overlays the update on the stored attributes; status is left alone.
        let row = sqlx::query(
            r#"
            INSERT INTO items (pk, sk, status, attributes)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (pk, sk) DO UPDATE
            SET attributes = items.attributes || $5
            RETURNING pk, sk, status, attributes
            "#,
        )
        .bind(SUBSCRIBER_PARTITION)
        .bind(email.as_ref())
        .bind(initial.as_ref().map(|status| status.as_ref()))
        .bind(Json(created))
        .bind(Json(updated))
        .fetch_one(&self.db_pool)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute query: {:?}", err);
            err
        })?;

        subscriber_from_row(&row)
    }

    #[tracing::instrument(name = "Changing a subscriber status", skip(self), fields(email = %email, status = %status.as_ref()))]
    async fn set_status(
        &self,
        email: &SubscriberEmail,
        status: SubscriberStatus,
    ) -> Result<Subscriber, StorageError> {
        let updated = stamped(Attributes::new(), "date_updated", Utc::now());

        let row = sqlx::query(
            r#"
            UPDATE items
            SET status = $3, attributes = attributes || $4
            WHERE pk = $1 AND sk = $2
            RETURNING pk, sk, status, attributes
            "#,
        )
        .bind(SUBSCRIBER_PARTITION)
        .bind(email.as_ref())
        .bind(status.as_ref())
        .bind(Json(updated))
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(email.to_string()))?;

        subscriber_from_row(&row)
    }

    #[tracing::instrument(name = "Listing subscribers by status", skip(self), fields(status = %status.as_ref()))]
    async fn list_by_status(
        &self,
        status: SubscriberStatus,
    ) -> Result<Vec<Subscriber>, StorageError> {
        let mut subscribers = Vec::new();
        let mut cursor = String::new();

        loop {
            let rows = sqlx::query(
                r#"
                SELECT pk, sk, status, attributes
                FROM items
                WHERE pk = $1 AND status = $2 AND sk > $3
                ORDER BY sk
                LIMIT $4
                "#,
            )
            .bind(SUBSCRIBER_PARTITION)
            .bind(status.as_ref())
            .bind(&cursor)
            .bind(self.page_size as i64)
            .fetch_all(&self.db_pool)
            .await?;

            let page_len = rows.len();
            for row in rows.iter() {
                let subscriber = subscriber_from_row(row)?;
                cursor = subscriber.email.as_ref().to_string();
                subscribers.push(subscriber);
            }

            if page_len < self.page_size {
                break;
            }
        }

        tracing::info!("Found {} subscribers with status {}", subscribers.len(), status.as_ref());

        Ok(subscribers)
    }
}

#[async_trait]
impl StoryStore for PostgresStore {
    #[tracing::instrument(name = "Inserting a story", skip(self, story), fields(key = %story.key, kind = %story.kind.as_ref()))]
    async fn insert(&self, story: &Story) -> Result<(), StorageError> {
        let item = story.to_item();

        sqlx::query("INSERT INTO items (pk, sk, status, attributes) VALUES ($1, $2, $3, $4)")
            .bind(&item.pk)
            .bind(&item.sk)
            .bind(&item.status)
            .bind(Json(&item.attributes))
            .execute(&self.db_pool)
            .await?;

        Ok(())
    }

    #[tracing::instrument(name = "Fetching queued stories", skip(self))]
    async fn queued(&self, limit: usize) -> Result<Vec<Story>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT pk, sk, status, attributes
            FROM items
            WHERE pk = $1 AND status = $2
            ORDER BY sk ASC
            LIMIT $3
            "#,
        )
        .bind(StoryKind::Story.as_ref())
        .bind(StoryStatus::Queued.as_ref())
        .bind(limit as i64)
        .fetch_all(&self.db_pool)
        .await?;

        rows.iter()
            .map(|row| Story::try_from(item_from_row(row)?).map_err(StorageError::Corrupt))
            .collect()
    }

    #[tracing::instrument(name = "Publishing stories", skip(self, keys), fields(count = keys.len()))]
    async fn mark_published(
        &self,
        keys: &[String],
        published_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let published = stamped(Attributes::new(), "published_date", published_at);
        let mut transaction = self.db_pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE items
            SET status = $1, attributes = attributes || $2
            WHERE pk = $3 AND sk = ANY($4) AND status = $5
            "#,
        )
        .bind(StoryStatus::Published.as_ref())
        .bind(Json(published))
        .bind(StoryKind::Story.as_ref())
        .bind(keys.to_vec())
        .bind(StoryStatus::Queued.as_ref())
        .execute(&mut transaction)
        .await?;

        let updated = result.rows_affected() as usize;
        if updated != keys.len() {
            transaction.rollback().await?;
            return Err(StorageError::Conflict {
                expected: keys.len(),
                updated,
            });
        }

        transaction.commit().await?;
        tracing::info!("Updated {} stories to published status", updated);

        Ok(())
    }
}
