/// Lifecycle of a subscriber record. A record without a status has only ever
/// received previews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    New,
    Subscribed,
    Unsubscribed,
    Manana,
    Refreshed,
}

impl SubscriberStatus {
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SubscriberStatus::Subscribed)
    }

    pub fn parse(status: &str) -> Result<SubscriberStatus, String> {
        match status {
            "new" => Ok(SubscriberStatus::New),
            "subscribed" => Ok(SubscriberStatus::Subscribed),
            "unsubscribed" => Ok(SubscriberStatus::Unsubscribed),
            "manana" => Ok(SubscriberStatus::Manana),
            "refreshed" => Ok(SubscriberStatus::Refreshed),
            _ => Err(format!("{} is not a valid subscriber status", status)),
        }
    }
}

impl AsRef<str> for SubscriberStatus {
    fn as_ref(&self) -> &str {
        match self {
            SubscriberStatus::New => "new",
            SubscriberStatus::Subscribed => "subscribed",
            SubscriberStatus::Unsubscribed => "unsubscribed",
            SubscriberStatus::Manana => "manana",
            SubscriberStatus::Refreshed => "refreshed",
        }
    }
}
