//! Inbound email parsing.
//!
//! Stories arrive as an email whose plain-text body embeds a JSON object.
//! Subscription requests arrive as an email sent to the subscribe or
//! unsubscribe mailbox.

use mailparse::{addrparse, parse_mail, MailAddr, MailHeaderMap, ParsedMail};
use serde::Deserialize;

use crate::domain::story::NewStory;
use crate::domain::subscriber::SubscriberProfile;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription_request::{SubscriptionAction, SubscriptionRequest};

const DEFAULT_CATEGORY: &str = "Uncategorized";

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Parse(String),
}

/// Story fields as written by the sender. Every field is optional here and
/// checked when converted into a [`NewStory`].
#[derive(Deserialize, Debug, Default)]
pub struct StoryPayload {
    pub title: Option<String>,
    pub url: Option<String>,
    pub category: Option<String>,
    pub summary: Option<String>,
    pub take: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TryFrom<StoryPayload> for NewStory {
    type Error = IngestError;

    fn try_from(payload: StoryPayload) -> Result<Self, Self::Error> {
        let trimmed = |value: Option<String>| value.map(|v| v.trim().to_string()).unwrap_or_default();

        let story = NewStory {
            title: trimmed(payload.title),
            url: trimmed(payload.url),
            category: payload
                .category
                .map(|category| category.trim().to_string())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            summary: trimmed(payload.summary),
            take: trimmed(payload.take),
            tags: payload
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect(),
        };

        let required = [
            &story.title,
            &story.url,
            &story.category,
            &story.summary,
            &story.take,
        ];
        if required.iter().any(|field| field.is_empty()) {
            return Err(IngestError::Validation(
                "Missing required fields: title, url, category, summary, take".into(),
            ));
        }

        Ok(story)
    }
}

#[tracing::instrument(name = "Parsing a story email", skip(raw_email))]
pub fn parse_story_email(raw_email: &[u8]) -> Result<NewStory, IngestError> {
    let mail = parse_mail(raw_email).map_err(|e| IngestError::Parse(e.to_string()))?;
    let body = plain_text_body(&mail)
        .ok_or_else(|| IngestError::Parse("No text content found in email".into()))?;

    let json = extract_json_object(&body)?;
    let payload: StoryPayload =
        serde_json::from_str(&json).map_err(|e| IngestError::Parse(e.to_string()))?;

    NewStory::try_from(payload)
}

/// The text between the first `{` and the last `}`, joined onto one line.
pub fn extract_json_object(body: &str) -> Result<String, IngestError> {
    let bounds = body.find('{').zip(body.rfind('}'));
    match bounds {
        Some((start, end)) if end > start => Ok(body[start..=end]
            .replace("\r\n", "")
            .replace('\n', " ")
            .trim()
            .to_string()),
        _ => Err(IngestError::Parse("No valid JSON object found".into())),
    }
}

/// Reads a mail sent to the subscription mailbox. The sender is the
/// subscriber; a destination mentioning "unsubscribe" opts them out.
#[tracing::instrument(name = "Parsing a subscription email", skip(raw_email))]
pub fn parse_subscription_email(raw_email: &[u8]) -> Result<SubscriptionRequest, IngestError> {
    let mail = parse_mail(raw_email).map_err(|e| IngestError::Parse(e.to_string()))?;

    let from = mail
        .headers
        .get_first_value("From")
        .ok_or_else(|| IngestError::Validation("Missing From header".into()))?;
    let sender = first_address(&from)?;
    let email = SubscriberEmail::parse(sender).map_err(IngestError::Validation)?;

    let destination = mail.headers.get_first_value("To").unwrap_or_default();
    let action = if destination.to_lowercase().contains("unsubscribe") {
        SubscriptionAction::Unsubscribe
    } else {
        SubscriptionAction::Subscribe
    };

    Ok(SubscriptionRequest {
        email,
        action,
        profile: SubscriberProfile::default(),
        send_first_issue: false,
    })
}

fn first_address(header: &str) -> Result<String, IngestError> {
    let addresses = addrparse(header).map_err(|e| IngestError::Parse(e.to_string()))?;

    addresses
        .iter()
        .find_map(|address| match address {
            MailAddr::Single(info) => Some(info.addr.clone()),
            MailAddr::Group(group) => group.addrs.first().map(|info| info.addr.clone()),
        })
        .ok_or_else(|| IngestError::Validation("No sender address found".into()))
}

fn plain_text_body(mail: &ParsedMail) -> Option<String> {
    let mimetype = mail.ctype.mimetype.as_str();

    if mimetype.starts_with("multipart/") {
        return mail.subparts.iter().find_map(plain_text_body);
    }
    if mimetype != "text/plain" {
        return None;
    }

    match mail.get_body() {
        Ok(body) if !body.trim().is_empty() => Some(body.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode the email body");
            None
        }
    }
}
