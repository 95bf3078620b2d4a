use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Pool, Postgres};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings, StorageBackend};
use crate::dispatcher::Dispatcher;
use crate::email_client::EmailClient;
use crate::render::Renderer;
use crate::routes::{
    handle_inbound_story, handle_inbound_subscription, handle_social_post,
    handle_subscription_json, handle_subscription_query, health_check, publish_newsletter,
    web_newsletter,
};
use crate::social::{CrossPoster, HttpPoster};
use crate::storage::{InMemoryStore, PostgresStore, StoryStore, SubscriberStore};

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error("Sender email is not valid: {0}")]
    InvalidSender(String),
    #[error("Failed to build an HTTP client.")]
    HttpClient(#[from] reqwest::Error),
    #[error("Failed to start the server.")]
    Io(#[from] std::io::Error),
}

/// Both store handles point at the same backend.
#[derive(Clone)]
pub struct Stores {
    pub subscribers: Arc<dyn SubscriberStore>,
    pub stories: Arc<dyn StoryStore>,
}

impl Stores {
    pub fn from_settings(config: &Settings) -> Self {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let store = Arc::new(PostgresStore::new(
                    get_connection_db_pool(&config.database),
                    config.storage.page_size,
                ));
                Stores {
                    subscribers: store.clone(),
                    stories: store,
                }
            }
            StorageBackend::Memory => Self::in_memory(InMemoryStore::new()),
        }
    }

    pub fn in_memory(store: InMemoryStore) -> Self {
        let store = Arc::new(store);
        Stores {
            subscribers: store.clone(),
            stories: store,
        }
    }
}

pub struct Application {
    pub port: u16,
    pub server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, BuildError> {
        let stores = Stores::from_settings(&config);
        Self::build_with_stores(config, stores).await
    }

    pub async fn build_with_stores(config: Settings, stores: Stores) -> Result<Self, BuildError> {
        let dispatcher = build_dispatcher(&config, &stores)?;
        let poster = HttpPoster::new(
            config.social.base_url.clone(),
            config.social.api_key.clone(),
            Some(config.social.get_timeout()),
        )?;
        let cross_poster = CrossPoster::new(Box::new(poster), config.social.max_post_length);

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();
        let server = run(listener, stores, dispatcher, cross_poster)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn build_dispatcher(config: &Settings, stores: &Stores) -> Result<Dispatcher, BuildError> {
    let sender_email = config
        .get_email_client_sender()
        .map_err(BuildError::InvalidSender)?;
    let email_client = EmailClient::new(
        config.email_client.base_url.clone(),
        sender_email,
        config.email_client.api_key.clone(),
        Some(config.email_client.get_timeout()),
    )?;

    Ok(Dispatcher::new(
        stores.subscribers.clone(),
        stores.stories.clone(),
        Arc::new(email_client),
        Renderer::new(&config.newsletter),
        config.get_dispatcher_settings(),
    ))
}

pub fn run(
    listener: TcpListener,
    stores: Stores,
    dispatcher: Dispatcher,
    cross_poster: CrossPoster,
) -> Result<Server, std::io::Error> {
    let subscribers: web::Data<dyn SubscriberStore> = web::Data::from(stores.subscribers);
    let stories: web::Data<dyn StoryStore> = web::Data::from(stores.stories);
    let dispatcher = web::Data::new(dispatcher);
    let cross_poster = web::Data::new(cross_poster);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscriptions", web::get().to(handle_subscription_query))
            .route("/subscriptions", web::post().to(handle_subscription_json))
            .route(
                "/subscriptions/inbound",
                web::post().to(handle_inbound_subscription),
            )
            .route("/newsletters/publish", web::get().to(publish_newsletter))
            .route("/newsletters/web", web::get().to(web_newsletter))
            .route("/stories/inbound", web::post().to(handle_inbound_story))
            .route("/social/posts", web::post().to(handle_social_post))
            .app_data(subscribers.clone())
            .app_data(stories.clone())
            .app_data(dispatcher.clone())
            .app_data(cross_poster.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> Pool<Postgres> {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}

/// Applies the bundled migrations.
pub async fn migrate(db_pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(db_pool).await
}
