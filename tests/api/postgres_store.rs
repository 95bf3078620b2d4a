//! Store behaviour against a real database. Run with
//! `cargo test -- --ignored` once Postgres from `config/base.yaml` is up.

use chrono::{Duration, Utc};
use claim::assert_err;
use sqlx::{Connection, Executor, PgConnection};
use uuid::Uuid;

use gecko_newsletter::{
    config::{get_configuration, DatabaseSettings},
    domain::story::{NewStory, Story, StoryStatus},
    domain::subscriber::SubscriberProfile,
    domain::subscriber_email::SubscriberEmail,
    domain::subscriber_name::SubscriberName,
    domain::subscriber_status::SubscriberStatus,
    startup::{get_connection_db_pool, migrate},
    storage::{PostgresStore, StorageError, StoryStore, SubscriberStore},
};

async fn configure_db(db_config: &mut DatabaseSettings) -> PostgresStore {
    let db_test_name = format!("db_{}", Uuid::new_v4().to_string().replace('-', "_"));
    let mut connection = PgConnection::connect_with(&db_config.get_db_options())
        .await
        .expect("Failed to connect to Postgres.");

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, db_test_name))
        .await
        .expect("Failed to create database.");

    connection
        .close()
        .await
        .expect("Failed to close connection.");

    db_config.name = db_test_name;
    let db_pool = get_connection_db_pool(db_config);
    migrate(&db_pool).await.expect("Failed to run migrations.");

    // A small page size exercises pagination
    PostgresStore::new(db_pool, 2)
}

async fn store() -> PostgresStore {
    let mut config = get_configuration().expect("Missing configuration file.");
    configure_db(&mut config.database).await
}

fn email(raw: &str) -> SubscriberEmail {
    SubscriberEmail::parse(raw.to_string()).unwrap()
}

fn story(minutes_ago: i64) -> Story {
    Story::queued(
        NewStory {
            title: format!("Story {}", minutes_ago),
            url: "https://example.com".into(),
            category: "Markets".into(),
            summary: "Summary".into(),
            take: "Take".into(),
            tags: vec!["markets".into()],
        },
        Utc::now() - Duration::minutes(minutes_ago),
    )
}

#[tokio::test]
#[ignore]
async fn upserts_merge_profiles_in_postgres() {
    let store = store().await;
    let ann = email("ann@x.com");
    let name = SubscriberProfile {
        name: Some(SubscriberName::parse("Ann".into()).unwrap()),
        ..SubscriberProfile::default()
    };
    let zip = SubscriberProfile {
        zip: Some("90210".into()),
        ..SubscriberProfile::default()
    };

    let first = store.upsert(&ann, &name).await.unwrap();
    let second = store.upsert(&ann, &zip).await.unwrap();

    assert_eq!(second.status, Some(SubscriberStatus::New));
    assert_eq!(second.date_created, first.date_created);
    assert_eq!(second.profile.name, name.name);
    assert_eq!(second.profile.zip, zip.zip);
}

#[tokio::test]
#[ignore]
async fn prospects_are_stored_without_a_status_in_postgres() {
    let store = store().await;
    let lee = email("lee@x.com");

    let created = store
        .upsert_with_status(&lee, &SubscriberProfile::default(), None)
        .await
        .unwrap();

    assert_eq!(created.status, None);
    assert!(store
        .list_by_status(SubscriberStatus::New)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[ignore]
async fn list_by_status_drains_every_page() {
    let store = store().await;
    for i in 0..5 {
        let address = email(&format!("user{}@x.com", i));
        store
            .upsert(&address, &SubscriberProfile::default())
            .await
            .unwrap();
        store
            .set_status(&address, SubscriberStatus::Subscribed)
            .await
            .unwrap();
    }

    let subscribed = store
        .list_by_status(SubscriberStatus::Subscribed)
        .await
        .unwrap();

    assert_eq!(subscribed.len(), 5);
}

#[tokio::test]
#[ignore]
async fn set_status_on_a_missing_subscriber_fails() {
    let store = store().await;

    let outcome = store
        .set_status(&email("ghost@x.com"), SubscriberStatus::Subscribed)
        .await;

    assert!(matches!(assert_err!(outcome), StorageError::NotFound(_)));
}

#[tokio::test]
#[ignore]
async fn mark_published_is_all_or_nothing_in_postgres() {
    let store = store().await;
    let (older, newer) = (story(10), story(5));
    store.insert(&older).await.unwrap();
    store.insert(&newer).await.unwrap();
    store
        .mark_published(&[older.key.clone()], Utc::now())
        .await
        .unwrap();

    let outcome = store
        .mark_published(&[older.key.clone(), newer.key.clone()], Utc::now())
        .await;

    assert!(matches!(assert_err!(outcome), StorageError::Conflict { .. }));
    let queued = store.queued(10).await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].key, newer.key);
    assert_eq!(queued[0].status, StoryStatus::Queued);
}
