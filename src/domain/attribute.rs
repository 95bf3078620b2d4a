//! Tagged attribute values used at the storage boundary.
//!
//! Records are persisted as a partition key, a sort key, an optional status
//! (the secondary index) and a map of attributes. Each attribute is encoded
//! as `{"S": "..."}`, `{"L": ["..."]}` or `{"NULL": true}` so that partial
//! updates can be merged without knowing the full record shape.

use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "L")]
    L(Vec<String>),
    #[serde(rename = "NULL")]
    Null(bool),
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// One persisted record.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub pk: String,
    pub sk: String,
    pub status: Option<String>,
    pub attributes: Attributes,
}

impl AttributeValue {
    pub fn null() -> Self {
        AttributeValue::Null(true)
    }

    pub fn timestamp(value: DateTime<Utc>) -> Self {
        AttributeValue::S(format_timestamp(value))
    }
}

impl Item {
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(AttributeValue::S(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn required_string(&self, key: &str) -> Result<String, String> {
        self.string(key)
            .map(str::to_string)
            .ok_or_else(|| format!("{}#{} has no `{}` attribute", self.pk, self.sk, key))
    }

    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        match self.attributes.get(key) {
            Some(AttributeValue::L(values)) => Some(values.clone()),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: &str) -> Result<Option<DateTime<Utc>>, String> {
        self.string(key).map(parse_timestamp).transpose()
    }
}

/// Overlays `update` on top of `existing`; attributes missing from the update
/// keep their stored value.
pub fn merge(existing: &mut Attributes, update: Attributes) {
    existing.extend(update);
}

pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|err| format!("{} is not a valid timestamp: {}", value, err))
}
