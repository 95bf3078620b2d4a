use serde::Deserialize;

use crate::domain::subscriber::{Interests, SubscriberProfile};
use crate::domain::subscriber_email::SubscriberEmail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionAction {
    Subscribe,
    Unsubscribe,
    Manana,
}

/// Parameters accepted by the subscription endpoint, either from the query
/// string of an email link or from a JSON body.
#[derive(Deserialize, Debug, Default)]
pub struct SubscriptionParameters {
    pub email: Option<String>,
    pub action: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "zip_code")]
    pub zip: Option<String>,
    pub interests: Option<Interests>,
    pub send_first_issue: Option<Flag>,
}

/// Boolean switch that tolerates `"true"` strings as well as JSON booleans.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

#[derive(Debug)]
pub struct SubscriptionRequest {
    pub email: SubscriberEmail,
    pub action: SubscriptionAction,
    pub profile: SubscriberProfile,
    pub send_first_issue: bool,
}

impl Flag {
    pub fn is_set(&self) -> bool {
        match self {
            Flag::Bool(value) => *value,
            Flag::Text(value) => value.trim().eq_ignore_ascii_case("true"),
        }
    }
}

impl SubscriptionAction {
    pub fn parse(action: &str) -> Result<SubscriptionAction, String> {
        match action.trim().to_lowercase().as_str() {
            "subscribe" => Ok(SubscriptionAction::Subscribe),
            "unsubscribe" => Ok(SubscriptionAction::Unsubscribe),
            "manana" | "mañana" => Ok(SubscriptionAction::Manana),
            unknown => Err(format!(
                "Invalid action: {}. Must be one of: subscribe, unsubscribe, manana",
                unknown
            )),
        }
    }
}

impl TryFrom<SubscriptionParameters> for SubscriptionRequest {
    type Error = String;

    fn try_from(parameters: SubscriptionParameters) -> Result<Self, Self::Error> {
        let email = match parameters.email.filter(|email| !email.trim().is_empty()) {
            Some(email) => SubscriberEmail::parse(email)?,
            None => return Err("Email is required".to_string()),
        };
        let action = match parameters.action.as_deref() {
            Some(action) => SubscriptionAction::parse(action)?,
            None => SubscriptionAction::Subscribe,
        };
        let profile =
            SubscriberProfile::parse(parameters.name, parameters.zip, parameters.interests)?;
        let send_first_issue = parameters
            .send_first_issue
            .map(|flag| flag.is_set())
            .unwrap_or(false);

        Ok(SubscriptionRequest {
            email,
            action,
            profile,
            send_first_issue,
        })
    }
}
