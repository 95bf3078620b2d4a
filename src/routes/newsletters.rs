use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use secrecy::Secret;
use serde::Deserialize;

use crate::dispatcher::{DispatchError, Dispatcher};
use crate::domain::delivery_mode::{PublishRequest, Trigger};
use crate::domain::subscriber::{Interests, SubscriberProfile};
use crate::domain::subscription_request::Flag;
use crate::routes::{error_chain_fmt, message_response};

#[derive(Deserialize, Debug)]
pub struct PublishParameters {
    pub email: Option<String>,
    pub preview: Option<Flag>,
    pub refresh: Option<Flag>,
    pub source: Option<String>,
    pub secret_key: Option<Secret<String>>,
    pub name: Option<String>,
    #[serde(alias = "zip_code")]
    pub zip: Option<String>,
    pub interests: Option<Interests>,
}

#[derive(thiserror::Error)]
pub enum PublishNewsletterError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl std::fmt::Debug for PublishNewsletterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for PublishNewsletterError {
    fn status_code(&self) -> StatusCode {
        match self {
            PublishNewsletterError::Validation(_) => StatusCode::BAD_REQUEST,
            PublishNewsletterError::Dispatch(e) => match e {
                DispatchError::MissingRecipient | DispatchError::InvalidRecipient(_) => {
                    StatusCode::BAD_REQUEST
                }
                DispatchError::Unauthorized
                | DispatchError::NoStoriesAvailable
                | DispatchError::NoRecipients => StatusCode::NOT_FOUND,
                DispatchError::Render | DispatchError::Storage(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        message_response(self.status_code(), self)
    }
}

impl TryFrom<PublishParameters> for PublishRequest {
    type Error = String;

    fn try_from(parameters: PublishParameters) -> Result<Self, Self::Error> {
        let is_set = |flag: &Option<Flag>| flag.as_ref().map(Flag::is_set).unwrap_or(false);

        Ok(PublishRequest {
            preview: is_set(&parameters.preview),
            refresh: is_set(&parameters.refresh),
            email: parameters.email,
            source: parameters.source,
            secret_key: parameters.secret_key,
            trigger: Trigger::Http,
            profile: SubscriberProfile::parse(
                parameters.name,
                parameters.zip,
                parameters.interests,
            )?,
        })
    }
}

#[tracing::instrument(
    name = "Publishing a newsletter",
    skip(query, dispatcher),
    fields(
        email = ?query.email,
        source = ?query.source,
    )
)]
pub async fn publish_newsletter(
    query: web::Query<PublishParameters>,
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, PublishNewsletterError> {
    let request = PublishRequest::try_from(query.into_inner())
        .map_err(PublishNewsletterError::Validation)?;

    let outcome = dispatcher.dispatch(request).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

#[tracing::instrument(name = "Serving the web edition", skip(dispatcher))]
pub async fn web_newsletter(
    dispatcher: web::Data<Dispatcher>,
) -> Result<HttpResponse, PublishNewsletterError> {
    let html = dispatcher.web_edition().await?;

    Ok(HttpResponse::Ok()
        .content_type(ContentType::html())
        .body(html))
}
