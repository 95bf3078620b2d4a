//! Publish dispatcher.
//!
//! Turns a [`PublishRequest`] into a [`DeliveryMode`], selects the queued
//! stories, renders them once and fans the result out to the recipients of
//! that mode with fixed-rate pacing.

use chrono::Utc;
use secrecy::Secret;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::delivery_mode::{DeliveryMode, ModeError, PublishRequest};
use crate::domain::story::Story;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::email_client::{Mailer, MailerError};
use crate::render::{personalize, Renderer, Variant};
use crate::storage::{StorageError, StoryStore, SubscriberStore};

#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Successful sends between two pauses. Zero disables pacing.
    pub batch_size: usize,
    pub pause: Duration,
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub secret_key: Secret<String>,
    pub story_count: usize,
    pub rate_limit: RateLimit,
}

pub struct Dispatcher {
    subscribers: Arc<dyn SubscriberStore>,
    stories: Arc<dyn StoryStore>,
    mailer: Arc<dyn Mailer>,
    renderer: Renderer,
    settings: DispatcherSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DispatchOutcome {
    pub message: String,
    pub mode: &'static str,
    pub stories_count: usize,
    pub recipients_count: usize,
    pub sent_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub candidates: usize,
}

#[derive(thiserror::Error)]
pub enum DispatchError {
    #[error("Missing email parameter")]
    MissingRecipient,
    #[error("{0}")]
    InvalidRecipient(String),
    #[error("Not Found")]
    Unauthorized,
    #[error("No stories available for newsletter")]
    NoStoriesAvailable,
    #[error("No subscribed users found")]
    NoRecipients,
    #[error("None of the selected stories could be rendered.")]
    Render,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl std::fmt::Debug for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)?;
        if let DispatchError::Storage(source) = self {
            write!(f, "\nCaused by:\n\t{:?}", source)?;
        }
        Ok(())
    }
}

impl From<ModeError> for DispatchError {
    fn from(error: ModeError) -> Self {
        match error {
            ModeError::MissingRecipient => DispatchError::MissingRecipient,
            ModeError::InvalidRecipient(reason) => DispatchError::InvalidRecipient(reason),
            ModeError::Unauthorized => DispatchError::Unauthorized,
        }
    }
}

impl Dispatcher {
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        stories: Arc<dyn StoryStore>,
        mailer: Arc<dyn Mailer>,
        renderer: Renderer,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            subscribers,
            stories,
            mailer,
            renderer,
            settings,
        }
    }

    #[tracing::instrument(
        name = "Dispatching a newsletter",
        skip(self, request),
        fields(trigger = ?request.trigger, mode = tracing::field::Empty)
    )]
    pub async fn dispatch(&self, request: PublishRequest) -> Result<DispatchOutcome, DispatchError> {
        let mode = DeliveryMode::classify(&request, &self.settings.secret_key)?;
        tracing::Span::current().record("mode", mode.name());

        let stories = self.stories.queued(self.settings.story_count).await?;
        if stories.is_empty() {
            return match mode {
                DeliveryMode::Broadcast => Ok(DispatchOutcome {
                    message: "No new stories to publish".into(),
                    mode: mode.name(),
                    stories_count: 0,
                    recipients_count: 0,
                    sent_count: 0,
                }),
                _ => Err(DispatchError::NoStoriesAvailable),
            };
        }
        if !stories.iter().any(Story::is_renderable) {
            return Err(DispatchError::Render);
        }

        if mode.publishes_stories() {
            let keys: Vec<String> = stories.iter().map(|story| story.key.clone()).collect();
            self.stories.mark_published(&keys, Utc::now()).await?;
        }

        if let DeliveryMode::Preview(email) = &mode {
            // Prospects stay status-less until they subscribe
            if let Err(e) = self
                .subscribers
                .upsert_with_status(email, &request.profile, None)
                .await
            {
                tracing::error!(error.cause_chain = ?e, "Failed to record the preview recipient");
            }
        }

        let recipients = self.recipients(&mode).await?;
        if recipients.is_empty() {
            return match mode {
                DeliveryMode::RefreshBroadcast => Ok(DispatchOutcome {
                    message: "No subscribers to refresh".into(),
                    mode: mode.name(),
                    stories_count: stories.len(),
                    recipients_count: 0,
                    sent_count: 0,
                }),
                _ => Err(DispatchError::NoRecipients),
            };
        }

        let variant = match mode {
            DeliveryMode::Preview(_) => Variant::Outreach,
            _ => Variant::Email(Some(mode.call_to_action().recipient_status())),
        };
        let template = self
            .renderer
            .render(&stories, variant, Utc::now().date_naive());
        let subject = self.renderer.subject(&mode, &stories);

        let report = self.deliver(&recipients, &subject, &template).await;

        if mode == DeliveryMode::RefreshBroadcast {
            self.mark_refreshed(&recipients).await;
        }

        Ok(DispatchOutcome {
            message: summary(&mode, &report),
            mode: mode.name(),
            stories_count: stories.len(),
            recipients_count: report.candidates,
            sent_count: report.sent,
        })
    }

    /// Browser edition of the queued stories. Nothing is mutated.
    #[tracing::instrument(name = "Rendering the web edition", skip(self))]
    pub async fn web_edition(&self) -> Result<String, DispatchError> {
        let stories = self.stories.queued(self.settings.story_count).await?;
        if stories.is_empty() {
            return Err(DispatchError::NoStoriesAvailable);
        }

        Ok(self
            .renderer
            .render(&stories, Variant::Web, Utc::now().date_naive()))
    }

    async fn recipients(&self, mode: &DeliveryMode) -> Result<Vec<SubscriberEmail>, DispatchError> {
        let status = match mode {
            DeliveryMode::Preview(email)
            | DeliveryMode::SingleShot(email)
            | DeliveryMode::RefreshSingle(email) => return Ok(vec![email.clone()]),
            DeliveryMode::RefreshBroadcast => SubscriberStatus::New,
            DeliveryMode::Broadcast => SubscriberStatus::Subscribed,
        };

        let subscribers = self.subscribers.list_by_status(status).await?;
        Ok(subscribers
            .into_iter()
            .map(|subscriber| subscriber.email)
            .collect())
    }

    /// Sends the personalized template to every recipient in turn. A failed
    /// recipient is logged and skipped.
    #[tracing::instrument(
        name = "Delivering a newsletter",
        skip(self, recipients, subject, template),
        fields(candidates = recipients.len())
    )]
    pub async fn deliver(
        &self,
        recipients: &[SubscriberEmail],
        subject: &str,
        template: &str,
    ) -> DeliveryReport {
        let RateLimit { batch_size, pause } = self.settings.rate_limit;
        let mut sent = 0;

        for recipient in recipients {
            let html = personalize(template, recipient);
            if !self.send_with_retry(recipient, subject, &html).await {
                continue;
            }

            sent += 1;
            if batch_size > 0 && sent % batch_size == 0 {
                tracing::info!("Sent {} emails, pausing for {:?}", sent, pause);
                tokio::time::sleep(pause).await;
            }
        }

        DeliveryReport {
            sent,
            candidates: recipients.len(),
        }
    }

    async fn send_with_retry(&self, recipient: &SubscriberEmail, subject: &str, html: &str) -> bool {
        let error = match self.mailer.send_email(recipient, subject, html).await {
            Ok(()) => return true,
            Err(MailerError::Throttled) => {
                let backoff = self.settings.rate_limit.pause * 2;
                tracing::warn!("Throttled while sending to {}, retrying in {:?}", recipient, backoff);
                tokio::time::sleep(backoff).await;

                match self.mailer.send_email(recipient, subject, html).await {
                    Ok(()) => return true,
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        tracing::error!(
            error.cause_chain = ?error,
            error.message = %error,
            "Failed to send newsletter to {}",
            recipient
        );
        false
    }

    async fn mark_refreshed(&self, recipients: &[SubscriberEmail]) {
        for recipient in recipients {
            if let Err(e) = self
                .subscribers
                .set_status(recipient, SubscriberStatus::Refreshed)
                .await
            {
                tracing::error!(error.cause_chain = ?e, "Failed to mark {} as refreshed", recipient);
            }
        }
    }
}

fn summary(mode: &DeliveryMode, report: &DeliveryReport) -> String {
    match (mode, mode.recipient()) {
        (_, Some(email)) if report.sent == 0 => {
            format!("Failed to send newsletter to {}", email)
        }
        (DeliveryMode::Preview(_), Some(email)) => format!("Preview newsletter sent to {}", email),
        (DeliveryMode::RefreshSingle(_), Some(email)) => {
            format!("Refresh newsletter sent to {}", email)
        }
        (_, Some(email)) => format!("Newsletter sent to {}", email),
        (DeliveryMode::RefreshBroadcast, None) => format!(
            "Refresh newsletter sent to {} of {} subscribers",
            report.sent, report.candidates
        ),
        (_, None) => format!(
            "Newsletter sent to {} of {} subscribers",
            report.sent, report.candidates
        ),
    }
}
