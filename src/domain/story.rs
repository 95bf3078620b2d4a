use chrono::{DateTime, Utc};

use crate::domain::attribute::{format_timestamp, AttributeValue, Attributes, Item};

/// Coarse category, used as the storage partition. Only `Story` records are
/// picked up by the newsletter; `Lead` records wait for an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryKind {
    Story,
    Lead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoryStatus {
    Queued,
    Published,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Story {
    pub key: String,
    pub kind: StoryKind,
    pub title: String,
    pub url: String,
    pub category: String,
    pub summary: String,
    pub take: String,
    pub tags: Vec<String>,
    pub status: StoryStatus,
    pub date_created: DateTime<Utc>,
    pub published_date: Option<DateTime<Utc>>,
}

/// Validated content of an inbound story, before it gets a key.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStory {
    pub title: String,
    pub url: String,
    pub category: String,
    pub summary: String,
    pub take: String,
    pub tags: Vec<String>,
}

impl StoryKind {
    /// A record is a full story only when it carries both a summary and tags.
    pub fn classify(summary: &str, tags: &[String]) -> StoryKind {
        if !summary.trim().is_empty() && !tags.is_empty() {
            StoryKind::Story
        } else {
            StoryKind::Lead
        }
    }

    pub fn parse(kind: &str) -> Result<StoryKind, String> {
        match kind {
            "story" => Ok(StoryKind::Story),
            "lead" => Ok(StoryKind::Lead),
            _ => Err(format!("{} is not a valid story partition", kind)),
        }
    }
}

impl AsRef<str> for StoryKind {
    fn as_ref(&self) -> &str {
        match self {
            StoryKind::Story => "story",
            StoryKind::Lead => "lead",
        }
    }
}

impl StoryStatus {
    pub fn parse(status: &str) -> Result<StoryStatus, String> {
        match status {
            "queued" => Ok(StoryStatus::Queued),
            "published" => Ok(StoryStatus::Published),
            _ => Err(format!("{} is not a valid story status", status)),
        }
    }
}

impl AsRef<str> for StoryStatus {
    fn as_ref(&self) -> &str {
        match self {
            StoryStatus::Queued => "queued",
            StoryStatus::Published => "published",
        }
    }
}

impl Story {
    /// Builds a queued story keyed by its creation time.
    pub fn queued(new_story: NewStory, created_at: DateTime<Utc>) -> Story {
        Story {
            key: story_key(created_at),
            kind: StoryKind::classify(&new_story.summary, &new_story.tags),
            title: new_story.title,
            url: new_story.url,
            category: new_story.category,
            summary: new_story.summary,
            take: new_story.take,
            tags: new_story.tags,
            status: StoryStatus::Queued,
            date_created: created_at,
            published_date: None,
        }
    }

    pub fn is_renderable(&self) -> bool {
        [&self.title, &self.url, &self.category, &self.summary, &self.take]
            .iter()
            .all(|field| !field.trim().is_empty())
    }

    pub fn to_item(&self) -> Item {
        let mut attributes = Attributes::new();
        attributes.insert("title".into(), AttributeValue::S(self.title.clone()));
        attributes.insert("url".into(), AttributeValue::S(self.url.clone()));
        attributes.insert("category".into(), AttributeValue::S(self.category.clone()));
        attributes.insert("summary".into(), AttributeValue::S(self.summary.clone()));
        attributes.insert("take".into(), AttributeValue::S(self.take.clone()));
        attributes.insert("tags".into(), AttributeValue::L(self.tags.clone()));
        attributes.insert("date_created".into(), AttributeValue::timestamp(self.date_created));
        attributes.insert(
            "published_date".into(),
            self.published_date
                .map(AttributeValue::timestamp)
                .unwrap_or_else(AttributeValue::null),
        );

        Item {
            pk: self.kind.as_ref().to_string(),
            sk: self.key.clone(),
            status: Some(self.status.as_ref().to_string()),
            attributes,
        }
    }
}

impl TryFrom<Item> for Story {
    type Error = String;

    fn try_from(item: Item) -> Result<Self, Self::Error> {
        let kind = StoryKind::parse(&item.pk)?;
        let status = item
            .status
            .as_deref()
            .map(StoryStatus::parse)
            .transpose()?
            .ok_or_else(|| format!("story {} has no status", item.sk))?;
        let date_created = item
            .timestamp("date_created")?
            .ok_or_else(|| format!("story {} has no date_created", item.sk))?;

        Ok(Story {
            kind,
            title: item.required_string("title")?,
            url: item.required_string("url")?,
            category: item.required_string("category")?,
            summary: item.string("summary").unwrap_or_default().to_string(),
            take: item.string("take").unwrap_or_default().to_string(),
            tags: item.list("tags").unwrap_or_default(),
            status,
            date_created,
            published_date: item.timestamp("published_date")?,
            key: item.sk,
        })
    }
}

pub fn story_key(created_at: DateTime<Utc>) -> String {
    format!("ts#{}", format_timestamp(created_at))
}
