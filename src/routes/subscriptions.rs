use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};

use crate::dispatcher::Dispatcher;
use crate::domain::delivery_mode::PublishRequest;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;
use crate::domain::subscription_request::{
    SubscriptionAction, SubscriptionParameters, SubscriptionRequest,
};
use crate::ingest::parse_subscription_email;
use crate::routes::{error_chain_fmt, message_response};
use crate::storage::{StorageError, SubscriberStore};

#[derive(thiserror::Error)]
pub enum SubscriptionError {
    #[error("{0}")]
    Validation(String),
    #[error("Failed to update the subscriber list.")]
    Storage(#[from] StorageError),
}

impl std::fmt::Debug for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self {
            SubscriptionError::Validation(_) => StatusCode::BAD_REQUEST,
            SubscriptionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        message_response(self.status_code(), self)
    }
}

#[derive(serde::Serialize, Debug)]
pub struct SubscriptionResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriberStatus>,
}

/// Links embedded in the newsletter land here.
#[tracing::instrument(
    name = "Handling a subscription link",
    skip(query, subscribers, dispatcher),
    fields(subscriber_email = ?query.email, action = ?query.action)
)]
pub async fn handle_subscription_query(
    query: web::Query<SubscriptionParameters>,
    subscribers: web::Data<dyn SubscriberStore>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, SubscriptionError> {
    let request =
        SubscriptionRequest::try_from(query.into_inner()).map_err(SubscriptionError::Validation)?;

    apply_subscription(request, subscribers.get_ref(), &dispatcher).await
}

#[tracing::instrument(
    name = "Handling a subscription form",
    skip(body, subscribers, dispatcher),
    fields(subscriber_email = ?body.email, action = ?body.action)
)]
pub async fn handle_subscription_json(
    body: web::Json<SubscriptionParameters>,
    subscribers: web::Data<dyn SubscriberStore>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, SubscriptionError> {
    let request =
        SubscriptionRequest::try_from(body.into_inner()).map_err(SubscriptionError::Validation)?;

    apply_subscription(request, subscribers.get_ref(), &dispatcher).await
}

/// Mail sent to the subscription mailboxes, delivered as a raw message.
#[tracing::instrument(
    name = "Handling an inbound subscription email",
    skip(raw_email, subscribers, dispatcher)
)]
pub async fn handle_inbound_subscription(
    raw_email: web::Bytes,
    subscribers: web::Data<dyn SubscriberStore>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, SubscriptionError> {
    let request = parse_subscription_email(&raw_email)
        .map_err(|e| SubscriptionError::Validation(e.to_string()))?;

    apply_subscription(request, subscribers.get_ref(), &dispatcher).await
}

#[tracing::instrument(
    name = "Applying a subscription change",
    skip(request, subscribers, dispatcher),
    fields(subscriber_email = %request.email, action = ?request.action)
)]
pub async fn apply_subscription(
    request: SubscriptionRequest,
    subscribers: &dyn SubscriberStore,
    dispatcher: &Dispatcher,
) -> Result<HttpResponse, SubscriptionError> {
    let SubscriptionRequest {
        email,
        action,
        profile,
        send_first_issue,
    } = request;

    let response = match action {
        SubscriptionAction::Subscribe => {
            subscribers.upsert(&email, &profile).await?;
            let subscriber = subscribers
                .set_status(&email, SubscriberStatus::Subscribed)
                .await?;

            let message = if !send_first_issue {
                "Subscription successful"
            } else if send_first_issue_to(&email, dispatcher).await {
                "Subscription successful and first newsletter sent"
            } else {
                "Subscription successful but first newsletter failed to send"
            };

            SubscriptionResponse {
                message: message.into(),
                email: Some(subscriber.email.as_ref().to_string()),
                status: subscriber.status,
            }
        }
        SubscriptionAction::Unsubscribe => match subscribers.get(&email).await? {
            None => SubscriptionResponse {
                message: "Email not found in subscriber list".into(),
                email: Some(email.as_ref().to_string()),
                status: None,
            },
            Some(_) => {
                let subscriber = subscribers
                    .set_status(&email, SubscriberStatus::Unsubscribed)
                    .await?;
                SubscriptionResponse {
                    message: "Unsubscribe successful".into(),
                    email: Some(subscriber.email.as_ref().to_string()),
                    status: subscriber.status,
                }
            }
        },
        SubscriptionAction::Manana => {
            subscribers.upsert(&email, &profile).await?;
            let subscriber = subscribers
                .set_status(&email, SubscriberStatus::Manana)
                .await?;
            SubscriptionResponse {
                message: "We'll check back mañana".into(),
                email: Some(subscriber.email.as_ref().to_string()),
                status: subscriber.status,
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

async fn send_first_issue_to(email: &SubscriberEmail, dispatcher: &Dispatcher) -> bool {
    match dispatcher.dispatch(PublishRequest::single_shot(email)).await {
        Ok(outcome) => outcome.sent_count > 0,
        Err(e) => {
            tracing::error!(error.cause_chain = ?e, "Failed to send the first newsletter");
            false
        }
    }
}
