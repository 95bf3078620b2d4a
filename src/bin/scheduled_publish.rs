//! One-shot broadcast, meant to be run by a scheduler.

use gecko_newsletter::config::get_configuration;
use gecko_newsletter::domain::delivery_mode::PublishRequest;
use gecko_newsletter::startup::{build_dispatcher, Stores};
use gecko_newsletter::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let subscriber = get_subscriber("scheduled_publish".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber)?;

    let config = get_configuration()?;
    let stores = Stores::from_settings(&config);
    let dispatcher = build_dispatcher(&config, &stores)?;

    match dispatcher.dispatch(PublishRequest::scheduled()).await {
        Ok(outcome) => {
            tracing::info!(
                stories_count = outcome.stories_count,
                recipients_count = outcome.recipients_count,
                sent_count = outcome.sent_count,
                "{}",
                outcome.message
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "Scheduled broadcast failed");
            Err(e.to_string().into())
        }
    }
}
