use secrecy::{ExposeSecret, Secret};

use crate::domain::subscriber::SubscriberProfile;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;

/// Marker accepted, together with the shared secret, for manual broadcasts.
pub const MANUAL_SOURCE: &str = "manual";

/// Where a publish request came from. HTTP requests can never claim to be
/// scheduled; only the scheduler binary builds `Scheduled` requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Http,
    Scheduled,
}

#[derive(Debug)]
pub struct PublishRequest {
    pub email: Option<String>,
    pub preview: bool,
    pub refresh: bool,
    pub source: Option<String>,
    pub secret_key: Option<Secret<String>>,
    pub trigger: Trigger,
    pub profile: SubscriberProfile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryMode {
    Preview(SubscriberEmail),
    SingleShot(SubscriberEmail),
    RefreshSingle(SubscriberEmail),
    RefreshBroadcast,
    Broadcast,
}

/// Which link the rendered newsletter leads with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallToAction {
    Subscribe,
    Unsubscribe,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ModeError {
    #[error("Missing email parameter")]
    MissingRecipient,
    #[error("{0}")]
    InvalidRecipient(String),
    #[error("Not Found")]
    Unauthorized,
}

impl PublishRequest {
    pub fn http() -> Self {
        PublishRequest {
            email: None,
            preview: false,
            refresh: false,
            source: None,
            secret_key: None,
            trigger: Trigger::Http,
            profile: SubscriberProfile::default(),
        }
    }

    pub fn scheduled() -> Self {
        PublishRequest {
            trigger: Trigger::Scheduled,
            ..Self::http()
        }
    }

    pub fn single_shot(email: &SubscriberEmail) -> Self {
        PublishRequest {
            email: Some(email.as_ref().to_string()),
            ..Self::http()
        }
    }

    fn recipient(&self) -> Result<Option<SubscriberEmail>, ModeError> {
        match self.email.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(email) => SubscriberEmail::parse(email.to_string())
                .map(Some)
                .map_err(ModeError::InvalidRecipient),
        }
    }

    fn is_authorized_broadcast(&self, secret_key: &Secret<String>) -> bool {
        if self.trigger == Trigger::Scheduled {
            return true;
        }

        let expected = secret_key.expose_secret();
        let is_manual = self.source.as_deref() == Some(MANUAL_SOURCE);
        let secret_matches = self
            .secret_key
            .as_ref()
            .map(|provided| !expected.is_empty() && provided.expose_secret() == expected)
            .unwrap_or(false);

        is_manual && secret_matches
    }
}

impl DeliveryMode {
    /// Rules are evaluated in priority order and the first match wins.
    pub fn classify(
        request: &PublishRequest,
        secret_key: &Secret<String>,
    ) -> Result<DeliveryMode, ModeError> {
        let recipient = request.recipient()?;

        match (request.refresh, request.preview, recipient) {
            (true, _, Some(email)) => Ok(DeliveryMode::RefreshSingle(email)),
            (true, _, None) => Ok(DeliveryMode::RefreshBroadcast),
            (false, true, Some(email)) => Ok(DeliveryMode::Preview(email)),
            (false, true, None) => Err(ModeError::MissingRecipient),
            (false, false, Some(email)) => Ok(DeliveryMode::SingleShot(email)),
            (false, false, None) if request.is_authorized_broadcast(secret_key) => {
                Ok(DeliveryMode::Broadcast)
            }
            (false, false, None) => Err(ModeError::Unauthorized),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeliveryMode::Preview(_) => "preview",
            DeliveryMode::SingleShot(_) => "single_shot",
            DeliveryMode::RefreshSingle(_) | DeliveryMode::RefreshBroadcast => "refresh",
            DeliveryMode::Broadcast => "broadcast",
        }
    }

    pub fn recipient(&self) -> Option<&SubscriberEmail> {
        match self {
            DeliveryMode::Preview(email)
            | DeliveryMode::SingleShot(email)
            | DeliveryMode::RefreshSingle(email) => Some(email),
            DeliveryMode::RefreshBroadcast | DeliveryMode::Broadcast => None,
        }
    }

    pub fn call_to_action(&self) -> CallToAction {
        match self {
            DeliveryMode::Preview(_)
            | DeliveryMode::RefreshSingle(_)
            | DeliveryMode::RefreshBroadcast => CallToAction::Subscribe,
            DeliveryMode::SingleShot(_) | DeliveryMode::Broadcast => CallToAction::Unsubscribe,
        }
    }

    pub fn publishes_stories(&self) -> bool {
        matches!(self, DeliveryMode::Broadcast)
    }
}

impl CallToAction {
    /// The recipient status whose links carry this call to action.
    pub fn recipient_status(&self) -> SubscriberStatus {
        match self {
            CallToAction::Subscribe => SubscriberStatus::New,
            CallToAction::Unsubscribe => SubscriberStatus::Subscribed,
        }
    }
}
