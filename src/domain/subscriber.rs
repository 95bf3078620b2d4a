use chrono::{DateTime, Utc};

use crate::domain::attribute::{AttributeValue, Attributes, Item};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscriber_status::SubscriberStatus;

/// Partition key shared by every subscriber record.
pub const SUBSCRIBER_PARTITION: &str = "user";

#[derive(Debug, Clone, serde::Serialize)]
pub struct Subscriber {
    pub email: SubscriberEmail,
    pub status: Option<SubscriberStatus>,
    pub profile: SubscriberProfile,
    pub date_created: DateTime<Utc>,
    pub date_updated: Option<DateTime<Utc>>,
}

/// Optional profile attributes. Used both as the stored profile and as a
/// partial update, where `None` means "leave the stored value alone".
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct SubscriberProfile {
    pub name: Option<SubscriberName>,
    pub zip: Option<String>,
    pub interests: Option<Vec<String>>,
}

/// Interests arrive either as a list (JSON bodies) or as a comma-separated
/// string (query strings).
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
pub enum Interests {
    List(Vec<String>),
    Csv(String),
}

impl Interests {
    pub fn into_tags(self) -> Vec<String> {
        let raw = match self {
            Interests::List(tags) => tags,
            Interests::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };

        raw.into_iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

impl SubscriberProfile {
    pub fn parse(
        name: Option<String>,
        zip: Option<String>,
        interests: Option<Interests>,
    ) -> Result<SubscriberProfile, String> {
        let name = match name.filter(|name| !name.trim().is_empty()) {
            Some(name) => Some(SubscriberName::parse(name)?),
            None => None,
        };
        let zip = zip
            .map(|zip| zip.trim().to_string())
            .filter(|zip| !zip.is_empty());
        let interests = interests
            .map(Interests::into_tags)
            .filter(|tags| !tags.is_empty());

        Ok(SubscriberProfile {
            name,
            zip,
            interests,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.zip.is_none() && self.interests.is_none()
    }

    /// Only the supplied fields are encoded, so merging the result never
    /// erases a stored attribute.
    pub fn to_attributes(&self) -> Attributes {
        let mut attributes = Attributes::new();

        if let Some(name) = &self.name {
            attributes.insert("name".into(), AttributeValue::S(name.as_ref().to_string()));
        }
        if let Some(zip) = &self.zip {
            attributes.insert("zip_code".into(), AttributeValue::S(zip.clone()));
        }
        if let Some(interests) = &self.interests {
            attributes.insert("interests".into(), AttributeValue::L(interests.clone()));
        }

        attributes
    }
}

impl TryFrom<Item> for Subscriber {
    type Error = String;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        if item.pk != SUBSCRIBER_PARTITION {
            return Err(format!("{} is not a subscriber partition", item.pk));
        }

        let email = SubscriberEmail::parse(item.sk.clone())?;
        let status = item
            .status
            .as_deref()
            .map(SubscriberStatus::parse)
            .transpose()?;
        let name = item
            .string("name")
            .map(|name| SubscriberName::parse(name.to_string()))
            .transpose()?;
        let date_created = item
            .timestamp("date_created")?
            .ok_or_else(|| format!("subscriber {} has no date_created", item.sk))?;

        Ok(Subscriber {
            email,
            status,
            profile: SubscriberProfile {
                name,
                zip: item.string("zip_code").map(str::to_string),
                interests: item.list("interests"),
            },
            date_created,
            date_updated: item.timestamp("date_updated")?,
        })
    }
}
