use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::Result;
use crate::config::Config;
use crate::domain::Item;
use crate::fetcher::{FetchResult, Fetcher};
use crate::normalizer::Normalizer;

/// Bounded, insertion-ordered set of previously seen entry identity tokens.
///
/// The set's membership is always exactly the contents of the ordered list;
/// trimming evicts the oldest tokens first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdCache {
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl IdCache {
    pub fn contains(&self, token: &str) -> bool {
        self.set.contains(token)
    }

    pub fn insert(&mut self, token: String) {
        if self.set.insert(token.clone()) {
            self.order.push_back(token);
        }
    }

    /// Evict the oldest tokens until at most `cap` remain.
    pub fn trim(&mut self, cap: usize) {
        while self.order.len() > cap {
            if let Some(token) = self.order.pop_front() {
                self.set.remove(&token);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.set.clear();
    }
}

/// Basic-auth credentials for feeds behind authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One subscribed syndication endpoint with its own cadence and dedup cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    /// Stable identifier; survives edits to every other field.
    pub uuid: String,
    pub url: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    pub enabled: bool,
    /// `None` means never polled, which makes the feed immediately due.
    #[serde(default)]
    pub last_poll: Option<DateTime<Utc>>,
    /// Polling interval in seconds.
    pub interval: i64,
    /// Cache validators returned by the remote server, echoed back on the
    /// next request to avoid re-downloading unchanged content.
    #[serde(default)]
    pub etag: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    /// Display title and site link, filled from the feed's own metadata on
    /// the first successful fetch and never overwritten once set.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub item_count: u64,
    #[serde(default)]
    pub seen: IdCache,
}

impl Feed {
    pub fn new(url: String, interval: i64) -> Self {
        Self {
            uuid: Item::random_token(),
            url,
            credentials: None,
            enabled: true,
            last_poll: None,
            interval,
            etag: None,
            modified: None,
            title: String::new(),
            link: String::new(),
            clicks: 0,
            item_count: 0,
            seen: IdCache::default(),
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.url
        } else {
            &self.title
        }
    }

    /// A feed is due iff it is enabled and its interval has elapsed since
    /// the last poll attempt, successful or not.
    pub fn should_poll(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_poll {
            None => true,
            Some(last) => now - last >= Duration::seconds(self.interval),
        }
    }

    /// Fetch the feed incrementally and return its previously unseen entries.
    ///
    /// `last_poll` advances unconditionally, even when the fetch fails, so an
    /// erroring feed backs off until its next due time. Unchanged content
    /// (HTTP 304) yields no entries at negligible cost.
    pub async fn poll(
        &mut self,
        now: DateTime<Utc>,
        fetcher: &(dyn Fetcher + Send + Sync),
        normalizer: &Normalizer,
        config: &Config,
    ) -> Result<Vec<Item>> {
        self.last_poll = Some(now);

        let result = fetcher
            .fetch(
                &self.url,
                self.etag.as_deref(),
                self.modified.as_deref(),
                self.credentials.as_ref(),
            )
            .await?;

        let (body, etag, modified) = match result {
            FetchResult::NotModified {
                etag,
                last_modified,
            } => {
                // A 304 may re-report validators; keep the old ones when
                // it does not.
                if etag.is_some() {
                    self.etag = etag;
                }
                if last_modified.is_some() {
                    self.modified = last_modified;
                }
                return Ok(Vec::new());
            }
            FetchResult::Content {
                body,
                etag,
                last_modified,
            } => (body, etag, last_modified),
        };
        self.etag = etag;
        self.modified = modified;

        let (meta, entries) = normalizer.normalize(&body)?;
        if self.title.is_empty() {
            if let Some(title) = meta.title {
                self.title = title;
            }
        }
        if self.link.is_empty() {
            self.link = meta.link.unwrap_or_else(|| self.url.clone());
        }

        let mut items = Vec::new();
        for entry in entries {
            let token = match entry.identity_key() {
                Some(key) => Item::identity_token(&self.uuid, key),
                None => Item::random_token(),
            };
            if self.seen.contains(&token) {
                continue;
            }
            self.item_count += 1;
            self.seen.insert(token.clone());
            items.push(entry.into_item(&self.uuid, token, now, config));
        }
        self.seen.trim(config.feed_cache_size);

        Ok(items)
    }

    /// Forget every remembered entry identity and cache validator, so the
    /// next poll sees the feed as brand new.
    pub fn clear_cache(&mut self) {
        self.seen.clear();
        self.etag = None;
        self.modified = None;
    }

    pub fn favicon_url(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.link).ok()?;
        let host = parsed.host_str()?;
        Some(format!("{}://{}/favicon.ico", parsed.scheme(), host))
    }

    pub fn favicon_path(&self, icon_dir: &Path) -> Option<PathBuf> {
        let parsed = url::Url::parse(&self.link).ok()?;
        let host = parsed.host_str()?;
        Some(icon_dir.join(format!("{}.ico", host)))
    }

    pub fn has_favicon(&self, icon_dir: &Path) -> bool {
        self.favicon_path(icon_dir)
            .map(|path| path.exists())
            .unwrap_or(false)
    }

    /// Best-effort favicon download; failures are ignored since icons are
    /// purely decorative.
    pub async fn download_favicon(
        &self,
        fetcher: &(dyn Fetcher + Send + Sync),
        icon_dir: &Path,
    ) {
        let (Some(url), Some(path)) = (self.favicon_url(), self.favicon_path(icon_dir)) else {
            return;
        };
        if std::fs::create_dir_all(icon_dir).is_err() {
            return;
        }
        match fetcher.download(&url).await {
            Ok(bytes) => {
                if let Err(err) = std::fs::write(&path, bytes) {
                    debug!(feed = %self.url, error = %err, "failed to cache favicon");
                }
            }
            Err(err) => {
                debug!(feed = %self.url, error = %err, "failed to download favicon");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Always answers 304, optionally re-reporting validators.
    struct NotModifiedFetcher {
        etag: Option<String>,
        last_modified: Option<String>,
    }

    #[async_trait]
    impl Fetcher for NotModifiedFetcher {
        async fn fetch(
            &self,
            _url: &str,
            _etag: Option<&str>,
            _last_modified: Option<&str>,
            _credentials: Option<&Credentials>,
        ) -> Result<FetchResult> {
            Ok(FetchResult::NotModified {
                etag: self.etag.clone(),
                last_modified: self.last_modified.clone(),
            })
        }

        async fn download(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_not_modified_refreshes_reported_validators() {
        let mut feed = Feed::new("https://example.com/feed.xml".into(), 900);
        feed.etag = Some("\"v1\"".into());
        feed.modified = Some("Mon, 01 Jan 2024 00:00:00 GMT".into());

        let fetcher = NotModifiedFetcher {
            etag: Some("\"v2\"".into()),
            last_modified: Some("Tue, 02 Jan 2024 00:00:00 GMT".into()),
        };
        let items = feed
            .poll(Utc::now(), &fetcher, &Normalizer::new(), &Config::default())
            .await
            .unwrap();

        assert!(items.is_empty());
        assert!(feed.last_poll.is_some());
        assert_eq!(feed.etag.as_deref(), Some("\"v2\""));
        assert_eq!(
            feed.modified.as_deref(),
            Some("Tue, 02 Jan 2024 00:00:00 GMT")
        );
    }

    #[tokio::test]
    async fn test_not_modified_without_validators_keeps_stored_ones() {
        let mut feed = Feed::new("https://example.com/feed.xml".into(), 900);
        feed.etag = Some("\"v1\"".into());

        let fetcher = NotModifiedFetcher {
            etag: None,
            last_modified: None,
        };
        let items = feed
            .poll(Utc::now(), &fetcher, &Normalizer::new(), &Config::default())
            .await
            .unwrap();

        assert!(items.is_empty());
        assert_eq!(feed.etag.as_deref(), Some("\"v1\""));
    }

    #[test]
    fn test_id_cache_membership_tracks_order() {
        let mut cache = IdCache::default();
        for i in 0..10 {
            cache.insert(format!("token-{}", i));
        }
        assert_eq!(cache.len(), 10);
        assert!(cache.contains("token-0"));

        cache.trim(6);
        assert_eq!(cache.len(), 6);
        // The 4 oldest tokens are evicted
        for i in 0..4 {
            assert!(!cache.contains(&format!("token-{}", i)));
        }
        for i in 4..10 {
            assert!(cache.contains(&format!("token-{}", i)));
        }
    }

    #[test]
    fn test_id_cache_duplicate_insert_is_noop() {
        let mut cache = IdCache::default();
        cache.insert("a".into());
        cache.insert("a".into());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_id_cache_survives_serialization() {
        let mut cache = IdCache::default();
        cache.insert("a".into());
        cache.insert("b".into());
        let json = serde_json::to_string(&cache).unwrap();
        let cache: IdCache = serde_json::from_str(&json).unwrap();
        assert!(cache.contains("a"));
        assert!(cache.contains("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_should_poll() {
        let now = Utc::now();
        let mut feed = Feed::new("https://example.com/feed.xml".into(), 900);

        // Never polled: due immediately
        assert!(feed.should_poll(now));

        feed.last_poll = Some(now - Duration::seconds(901));
        assert!(feed.should_poll(now));

        feed.last_poll = Some(now - Duration::seconds(899));
        assert!(!feed.should_poll(now));

        feed.last_poll = None;
        feed.enabled = false;
        assert!(!feed.should_poll(now));
    }

    #[test]
    fn test_favicon_url_from_site_link() {
        let mut feed = Feed::new("https://example.com/feed.xml".into(), 900);
        feed.link = "https://example.com/blog/index.html".into();
        assert_eq!(
            feed.favicon_url().unwrap(),
            "https://example.com/favicon.ico"
        );
    }

    #[test]
    fn test_old_snapshot_defaults() {
        let json = r#"{
            "uuid": "abc",
            "url": "https://example.com/feed.xml",
            "enabled": true,
            "interval": 900
        }"#;
        let feed: Feed = serde_json::from_str(json).unwrap();
        assert_eq!(feed.clicks, 0);
        assert_eq!(feed.item_count, 0);
        assert!(feed.last_poll.is_none());
        assert!(feed.etag.is_none());
        assert!(feed.seen.is_empty());
    }
}
