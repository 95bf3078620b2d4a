//! HTML rendering of the newsletter.
//!
//! A template is rendered once per send with [`RECIPIENT_PLACEHOLDER`] where
//! the recipient address belongs, then [`personalize`]d for each recipient.

use chrono::NaiveDate;
use html_escape::{encode_single_quoted_attribute, encode_text};
use url::form_urlencoded::byte_serialize;

use crate::config::NewsletterSettings;
use crate::domain::delivery_mode::DeliveryMode;
use crate::domain::story::Story;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_status::SubscriberStatus;

pub const RECIPIENT_PLACEHOLDER: &str = "__RECIPIENT__";

const TAGLINE: &str = "News • Markets • Ai";
const SNIPPET_WORDS: usize = 6;
const STOPWORDS: [&str; 7] = ["the", "a", "an", "this", "that", "these", "those"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Sent by email; links point at the subscription endpoint and depend on
    /// the recipient status.
    Email(Option<SubscriberStatus>),
    /// First-contact preview; the call to action is a `mailto:` link.
    Outreach,
    /// Browser edition; the call to action is the landing page.
    Web,
}

#[derive(Debug, Clone)]
pub struct Renderer {
    newsletter_name: String,
    subscription_endpoint: String,
    web_target: String,
    mailto_target: String,
}

impl Renderer {
    pub fn new(settings: &NewsletterSettings) -> Self {
        Self {
            newsletter_name: settings.name.clone(),
            subscription_endpoint: settings.subscription_endpoint.clone(),
            web_target: settings.web_target.clone(),
            mailto_target: settings.mailto_target.clone(),
        }
    }

    pub fn render(&self, stories: &[Story], variant: Variant, date: NaiveDate) -> String {
        let (links, footer) = match variant {
            Variant::Email(status) => (
                subscription_links(&self.subscription_endpoint, RECIPIENT_PLACEHOLDER, status),
                format!(
                    "<br><a href='{}' style='color:red;text-decoration:none;'>Unsubscribe</a>",
                    action_url(&self.subscription_endpoint, "unsubscribe", RECIPIENT_PLACEHOLDER)
                ),
            ),
            Variant::Outreach => {
                let mailto = self.mailto_subscribe();
                (
                    format!(
                        "<a href='{}' style='font-weight:600;text-decoration: none;'><font color='chartreuse'>Subscribe</font></a>",
                        mailto
                    ),
                    format!(
                        "<br><a href='{}' style='color:red;text-decoration:none;'>Subscribe</a>",
                        mailto
                    ),
                )
            }
            Variant::Web => {
                let web_link = format!(
                    "<a href='{}' style='font-weight:600;text-decoration: none;'><font color='chartreuse'>Subscribe</font></a>",
                    encode_single_quoted_attribute(&self.web_target)
                );
                (web_link.clone(), format!("<br>{}", web_link))
            }
        };

        let header = format!(
            "{}{}",
            ascii_header(&self.newsletter_name),
            date_line(date, &links)
        );
        let stories_html: String = stories.iter().filter_map(story_block).collect();
        let name = encode_text(&self.newsletter_name);

        format!(
            "<!DOCTYPE html><html><head><meta charset='UTF-8'><title>{name} Today</title>\
<style>body,html{{background-color:#000000;color:#FFFFFF;margin:0;padding:0;font-family:'Courier New',monospace;}}</style></head>\
<body bgcolor='#000000' text='#FFFFFF' link='#FFFFFF' vlink='#FFFFFF' alink='#FFFFFF'><BR><BR>\
<table width='100%' border='0' cellspacing='0' cellpadding='0' bgcolor='#000000'><tr><td align='center'>\
<table width='600' border='1' cellspacing='0' cellpadding='20' bordercolor='#FFFFFF' bgcolor='#000000' style='border:1px solid #FFFFFF;'><tr><td bgcolor='#000000'>\
<table width='100%' border='0' cellspacing='0' cellpadding='0' bgcolor='#000000' style='font-family:\"Courier New\",monospace;'>{header}</table>\
<hr color='#FFFFFF' size='1' style='border:none;border-top:1px solid #FFFFFF;margin:20px 0;'>{stories_html}\
<hr color='#FFFFFF' size='1' style='border:none;border-top:1px solid #FFFFFF;margin:20px 0;'>\
<div align='center' style='color:chartreuse;font-size:12px;text-align:center;margin-top:30px;'>&copy; {year} {upper} Newsletter. All rights reserved.{footer}</div>\
</td></tr></table></td></tr></table></body></html>",
            name = name,
            header = header,
            stories_html = stories_html,
            year = date.format("%Y"),
            upper = encode_text(&self.newsletter_name.to_uppercase()),
            footer = footer,
        )
    }

    pub fn subject(&self, mode: &DeliveryMode, stories: &[Story]) -> String {
        match mode {
            DeliveryMode::Preview(_) => format!("{} - Preview Newsletter", self.newsletter_name),
            _ => {
                let headline = stories
                    .iter()
                    .find(|story| story.is_renderable())
                    .map(|story| story.title.as_str())
                    .unwrap_or("");
                format!(
                    "{} - {}",
                    self.newsletter_name,
                    headline_snippet(headline, SNIPPET_WORDS)
                )
            }
        }
    }

    fn mailto_subscribe(&self) -> String {
        let subject = format!("Subscribe me to {}", self.newsletter_name);
        let body = format!(
            "I want news and insights at the intersection of business, technology, and culture. \
Sign me up for {} and let's get started!",
            self.newsletter_name
        );

        format!(
            "mailto:{}?subject={}&body={}",
            self.mailto_target,
            encode_component(&subject),
            encode_component(&body)
        )
    }
}

/// Swaps the placeholder for the percent-encoded recipient address.
pub fn personalize(template: &str, recipient: &SubscriberEmail) -> String {
    template.replace(RECIPIENT_PLACEHOLDER, &encode_component(recipient.as_ref()))
}

/// Links offered next to the date line, by recipient status.
pub fn subscription_links(
    endpoint: &str,
    recipient: &str,
    status: Option<SubscriberStatus>,
) -> String {
    let subscribe = format!(
        "<a href='{}' style='font-weight:600;text-decoration: none;'><font color='chartreuse'>Subscribe</font></a>",
        action_url(endpoint, "subscribe", recipient)
    );
    let unsubscribe = format!(
        "<a href='{}' style='text-decoration: none;'><font color='red'>Unsubscribe</font></a>",
        action_url(endpoint, "unsubscribe", recipient)
    );
    let manana = format!(
        "<a href='{}' style='text-decoration: none;'><font color='white'>Mañana</font></a>",
        action_url(endpoint, "manana", recipient)
    );

    match status {
        Some(SubscriberStatus::Subscribed) => unsubscribe,
        Some(SubscriberStatus::Manana) => format!("{} | {} | {}", subscribe, unsubscribe, manana),
        None
        | Some(SubscriberStatus::New)
        | Some(SubscriberStatus::Unsubscribed)
        | Some(SubscriberStatus::Refreshed) => format!("{} | {}", subscribe, manana),
    }
}

/// Anchor showing the URL without scheme or `www.`, shortened when long.
pub fn short_href(url: &str) -> String {
    let trimmed = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let trimmed = trimmed.strip_prefix("www.").unwrap_or(trimmed);

    let shown = if trimmed.chars().count() > 30 {
        format!("{}...", trimmed.chars().take(50).collect::<String>())
    } else {
        trimmed.to_string()
    };

    format!(
        "<a href='{}' style='color: #FFFFFF;text-decoration: none;'><font color='#FFFFFF'>{}</font></a>",
        encode_single_quoted_attribute(url),
        encode_text(&shown)
    )
}

/// First words of a headline, punctuation removed and a leading stopword
/// skipped.
pub fn headline_snippet(title: &str, num_words: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    let mut words = cleaned.split_whitespace().peekable();

    if words
        .peek()
        .map(|first| STOPWORDS.contains(&first.to_lowercase().as_str()))
        .unwrap_or(false)
    {
        words.next();
    }

    let snippet = words.take(num_words).collect::<Vec<_>>().join(" ");
    if snippet.is_empty() {
        "Newsletter".to_string()
    } else {
        snippet
    }
}

fn action_url(endpoint: &str, action: &str, recipient: &str) -> String {
    format!(
        "{}?action={}&email={}",
        encode_single_quoted_attribute(endpoint),
        action,
        recipient
    )
}

/// Percent-encoding suitable for query values and `mailto:` fields.
fn encode_component(value: &str) -> String {
    // form encoding writes spaces as '+', literal '+' is already %2B
    byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn ascii_header(newsletter_name: &str) -> String {
    let pad = "&nbsp;".repeat(6);
    let name = encode_text(&newsletter_name.to_uppercase()).to_string();

    format!(
        "<tr><td style='color: chartreuse;'>{pad}╔════════════════════════════════════════════╗</td></tr>\
<tr><td>{pad}<span style='color: chartreuse;'>{{{pad}</span><font color='red' style='font-weight:600;letter-spacing:0.1em;'>{name}</font>\
<span style='color: red;'>&nbsp;*</span><span style='color: chartreuse;'>{pad}.&nbsp;&nbsp;║</span></td></tr>\
<tr><td>{pad}<span style='color: chartreuse;'>{{{pad}</span><span style='color: #FFFFFF;'>{tagline}</span>\
<span style='color: #FFFFFF;'>{pad}^^^^^^^^^</span><span style='color: chartreuse;'>══╝</span></td></tr>\
<tr><td style='color: chartreuse;'>{pad}╚════════════════════════════════════════════╝</td></tr>",
        pad = pad,
        name = name,
        tagline = TAGLINE,
    )
}

fn date_line(date: NaiveDate, links: &str) -> String {
    format!(
        "<tr><td style='color: white; padding-top: 10px;'>\
<div style='display: flex; justify-content: space-between; align-items: center;'>\
<span><font style='color:gold; font-weight:600'>{}</font></span>\
<span style='text-align: right;'>{}</span></div></td></tr>",
        date.format("%B %d, %Y"),
        links
    )
}

fn story_block(story: &Story) -> Option<String> {
    if !story.is_renderable() {
        tracing::error!("Malformed story {}#{}", story.kind.as_ref(), story.key);
        return None;
    }

    Some(format!(
        "<table width='100%' border='0' cellspacing='0' cellpadding='10' bgcolor='#000000' style='color:#FFFFFF;margin-bottom: 25px;'><tr><td bgcolor='#000000'>\
<div style='color: red; font-style: italic; font-size: 14px; margin-bottom: 6px;'><i>{category}</i></div>\
<h2 style='color: #FFFFFF; margin: 0 0 4px 0;'>{title}</h2>\
<div style='line-height: 1.2; font-size: 13px; margin: 0 0 14px 0;'>{href}</div>\
<div style='line-height:1.4; margin-bottom: 8px;'><b style='color:chartreuse'>Story</b>:&nbsp;&nbsp;{summary}</div>\
<div style='line-height:1.4; margin-bottom: 2px;'><b style='color:chartreuse'>Gecko's Take</b>:&nbsp;&nbsp;{take}</div>\
</td></tr></table>",
        category = encode_text(&story.category),
        title = encode_text(&story.title),
        href = short_href(&story.url),
        summary = encode_text(&story.summary),
        take = encode_text(&story.take),
    ))
}
