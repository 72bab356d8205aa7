//! Feed parsing and text sanitization.
//!
//! Converts raw RSS/Atom bytes into feed metadata and entry records, then
//! scrubs entry text for display: HTML entities are decoded repeatedly until
//! the text stabilizes, markup tags are stripped, whitespace is collapsed,
//! and the result is truncated word-safely with a `[...]` marker.

use chrono::{DateTime, Utc};
use feed_rs::parser;

use crate::app::{FreshetError, Result};
use crate::config::Config;
use crate::domain::Item;

/// Feed-level metadata extracted alongside the entries.
#[derive(Debug, Clone)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub link: Option<String>,
}

/// One entry as reported by the remote source, before deduplication and
/// sanitization.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl RawEntry {
    /// The string an identity token is derived from: the first present of
    /// native id, link, title. `None` means the entry has no identity at
    /// all and gets a random token.
    pub fn identity_key(&self) -> Option<&str> {
        self.id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.link.as_deref().filter(|s| !s.is_empty()))
            .or_else(|| self.title.as_deref().filter(|s| !s.is_empty()))
    }

    /// Convert into a sanitized [`Item`] owned by the given feed.
    pub fn into_item(
        self,
        feed_uuid: &str,
        token: String,
        now: DateTime<Utc>,
        config: &Config,
    ) -> Item {
        Item {
            feed_id: feed_uuid.to_string(),
            id: token,
            timestamp: self.published.unwrap_or(now),
            received: now,
            title: scrub(self.title.as_deref().unwrap_or(""), config.title_max_len),
            description: scrub(self.summary.as_deref().unwrap_or(""), config.body_max_len),
            link: self.link.unwrap_or_default(),
            author: scrub(self.author.as_deref().unwrap_or(""), config.title_max_len),
            read: false,
        }
    }
}

#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, body: &[u8]) -> Result<(FeedMeta, Vec<RawEntry>)> {
        let feed = parser::parse(body).map_err(|e| FreshetError::FeedParse(e.to_string()))?;

        let meta = FeedMeta {
            title: feed.title.map(|t| scrub(&t.content, usize::MAX)),
            link: feed.links.first().map(|l| l.href.clone()),
        };

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| RawEntry {
                id: if entry.id.is_empty() {
                    None
                } else {
                    Some(entry.id)
                },
                title: entry.title.map(|t| t.content),
                link: entry.links.first().map(|l| l.href.clone()),
                author: entry.authors.first().map(|a| a.name.clone()),
                summary: entry
                    .summary
                    .map(|s| s.content)
                    .or_else(|| entry.content.and_then(|c| c.body)),
                published: entry
                    .published
                    .or(entry.updated)
                    .map(|dt| dt.with_timezone(&Utc)),
            })
            .collect();

        Ok((meta, entries))
    }
}

/// Sanitize a fragment of feed text for display.
pub fn scrub(text: &str, max_len: usize) -> String {
    // Entities may be encoded more than once; decode until stable.
    let mut text = text.to_string();
    loop {
        let decoded = html_escape::decode_html_entities(&text).to_string();
        if decoded == text {
            break;
        }
        text = decoded;
    }
    let text = remove_markup(&text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_words(&text, max_len)
}

/// Replace every `<...>` markup tag with a space.
fn remove_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => {
                in_tag = true;
                out.push(' ');
            }
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Truncate to at most `max_len` characters without splitting a word,
/// appending `[...]` when anything was cut.
fn truncate_words(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    let mut words: Vec<&str> = cut.trim_end().split(' ').collect();
    // The last word may have been split mid-way; drop it.
    words.pop();
    words.push("[...]");
    words.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <link>https://example.com/</link>
    <item>
      <title>Test Item 1</title>
      <link>https://example.com/item1</link>
      <guid>item-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is item 1</description>
    </item>
    <item>
      <title>Test Item 2</title>
      <link>https://example.com/item2</link>
      <guid>item-2</guid>
      <description>This is item 2</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <link href="https://example.com/"/>
  <entry>
    <title>Atom Entry 1</title>
    <link href="https://example.com/atom1"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>This is Atom entry 1</summary>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss() {
        let (meta, entries) = Normalizer::new().normalize(RSS_SAMPLE.as_bytes()).unwrap();
        assert_eq!(meta.title, Some("Test Feed".into()));
        assert_eq!(meta.link, Some("https://example.com/".into()));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].title.as_deref(), Some("Test Item 1"));
        assert_eq!(entries[0].link.as_deref(), Some("https://example.com/item1"));
        assert!(entries[0].published.is_some());
    }

    #[test]
    fn test_parse_atom() {
        let (meta, entries) = Normalizer::new().normalize(ATOM_SAMPLE.as_bytes()).unwrap();
        assert_eq!(meta.title, Some("Atom Test Feed".into()));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title.as_deref(), Some("Atom Entry 1"));
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(Normalizer::new().normalize(b"not a feed").is_err());
    }

    #[test]
    fn test_identity_key_precedence() {
        let mut entry = RawEntry {
            id: Some("guid".into()),
            title: Some("title".into()),
            link: Some("link".into()),
            author: None,
            summary: None,
            published: None,
        };
        assert_eq!(entry.identity_key(), Some("guid"));
        entry.id = None;
        assert_eq!(entry.identity_key(), Some("link"));
        entry.link = None;
        assert_eq!(entry.identity_key(), Some("title"));
        entry.title = None;
        assert_eq!(entry.identity_key(), None);
    }

    #[test]
    fn test_scrub_decodes_entities_until_stable() {
        assert_eq!(scrub("&amp;amp;", 100), "&");
        assert_eq!(scrub("&#65;&#66;", 100), "AB");
        assert_eq!(scrub("caf&eacute;", 100), "café");
    }

    #[test]
    fn test_scrub_strips_markup_and_collapses_whitespace() {
        assert_eq!(
            scrub("<p>Hello <b>world</b></p>\n\n  again", 100),
            "Hello world again"
        );
    }

    #[test]
    fn test_scrub_decodes_then_strips_encoded_markup() {
        assert_eq!(scrub("&lt;p&gt;text&lt;/p&gt;", 100), "text");
    }

    #[test]
    fn test_truncation_never_splits_words() {
        let out = scrub("alpha beta gamma delta", 12);
        assert_eq!(out, "alpha beta [...]");

        let out = scrub("short", 12);
        assert_eq!(out, "short");
    }
}
