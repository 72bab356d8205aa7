//! The synchronization engine.
//!
//! [`FeedManager`] owns the feed list, the filter list and the accumulated
//! item history. One call to [`FeedManager::poll`] runs a cycle: due feeds
//! are snapshotted into jobs, fetched by a short-lived bounded pool of
//! workers, their new entries filtered and sorted, and the results merged
//! back. Workers never touch shared state; each one owns a clone of its
//! feed and reports an outcome over a channel, so a failing feed can never
//! stall or deadlock a cycle.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::app::{FreshetError, Result};
use crate::config::Config;
use crate::domain::{CompiledFilter, Credentials, Feed, Filter, Item};
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::store::Snapshot;

/// Fields of a feed the presentation layer may edit. `None` leaves the
/// current value untouched.
#[derive(Debug, Clone, Default)]
pub struct FeedEdit {
    pub enabled: Option<bool>,
    pub interval: Option<i64>,
    pub title: Option<String>,
    pub link: Option<String>,
    pub credentials: Option<Option<Credentials>>,
}

/// Editable filter fields; query text is re-validated before acceptance.
#[derive(Debug, Clone, Default)]
pub struct FilterEdit {
    pub enabled: Option<bool>,
    pub query: Option<String>,
    pub ignore_case: Option<bool>,
    pub whole_word: Option<bool>,
    pub feeds: Option<HashSet<String>>,
}

/// Per-filter counter deltas accumulated by one worker.
struct FilterTally {
    uuid: String,
    inputs: u64,
    outputs: u64,
}

/// Everything one worker reports back: its (possibly updated) feed clone,
/// the surviving new items sorted by timestamp, and filter tallies.
struct PollOutcome {
    feed: Feed,
    items: Vec<Item>,
    tallies: Vec<FilterTally>,
}

#[derive(Debug, Default)]
pub struct FeedManager {
    feeds: Vec<Feed>,
    filters: Vec<Filter>,
    items: Vec<Item>,
    polling: bool,
}

impl FeedManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut manager = Self {
            feeds: snapshot.feeds,
            filters: snapshot.filters,
            items: snapshot.items,
            polling: false,
        };
        // Items whose feed vanished (e.g. a snapshot from an older build
        // without orphan cleanup) are dropped on load.
        let known: HashSet<String> = manager.feeds.iter().map(|f| f.uuid.clone()).collect();
        manager.items.retain(|item| known.contains(&item.feed_id));
        manager
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            feeds: self.feeds.clone(),
            items: self.items.clone(),
            filters: self.filters.clone(),
        }
    }

    // ---- feeds ----

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn feed(&self, uuid: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.uuid == uuid)
    }

    pub fn feed_by_url(&self, url: &str) -> Option<&Feed> {
        self.feeds.iter().find(|f| f.url == url)
    }

    pub fn add_feed(&mut self, feed: Feed) {
        self.feeds.push(feed);
    }

    /// Remove a feed, its accumulated items, and its entry in every
    /// filter's scope.
    pub fn remove_feed(&mut self, uuid: &str) -> Result<Feed> {
        let index = self
            .feeds
            .iter()
            .position(|f| f.uuid == uuid)
            .ok_or_else(|| FreshetError::FeedNotFound(uuid.to_string()))?;
        let feed = self.feeds.remove(index);
        self.items.retain(|item| item.feed_id != uuid);
        for filter in &mut self.filters {
            filter.feeds.remove(uuid);
        }
        Ok(feed)
    }

    pub fn update_feed(&mut self, uuid: &str, edit: FeedEdit) -> Result<()> {
        let feed = self
            .feeds
            .iter_mut()
            .find(|f| f.uuid == uuid)
            .ok_or_else(|| FreshetError::FeedNotFound(uuid.to_string()))?;
        if let Some(enabled) = edit.enabled {
            feed.enabled = enabled;
        }
        if let Some(interval) = edit.interval {
            feed.interval = interval;
        }
        if let Some(title) = edit.title {
            feed.title = title;
        }
        if let Some(link) = edit.link {
            feed.link = link;
        }
        if let Some(credentials) = edit.credentials {
            feed.credentials = credentials;
        }
        Ok(())
    }

    /// Reset every feed's poll clock so the next cycle fetches everything.
    pub fn force_poll(&mut self) {
        for feed in &mut self.feeds {
            feed.last_poll = None;
        }
    }

    pub fn clear_feed_cache(&mut self) {
        for feed in &mut self.feeds {
            feed.clear_cache();
        }
    }

    // ---- filters ----

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn filter(&self, uuid: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.uuid == uuid)
    }

    pub fn add_filter(&mut self, filter: Filter) {
        self.filters.push(filter);
    }

    pub fn remove_filter(&mut self, uuid: &str) -> Result<Filter> {
        let index = self
            .filters
            .iter()
            .position(|f| f.uuid == uuid)
            .ok_or_else(|| FreshetError::FilterNotFound(uuid.to_string()))?;
        Ok(self.filters.remove(index))
    }

    pub fn update_filter(&mut self, uuid: &str, edit: FilterEdit) -> Result<()> {
        let filter = self
            .filters
            .iter_mut()
            .find(|f| f.uuid == uuid)
            .ok_or_else(|| FreshetError::FilterNotFound(uuid.to_string()))?;
        if let Some(query) = edit.query {
            filter.set_query(query).map_err(FreshetError::Query)?;
        }
        if let Some(enabled) = edit.enabled {
            filter.enabled = enabled;
        }
        if let Some(ignore_case) = edit.ignore_case {
            filter.ignore_case = ignore_case;
        }
        if let Some(whole_word) = edit.whole_word {
            filter.whole_word = whole_word;
        }
        if let Some(feeds) = edit.feeds {
            filter.feeds = feeds;
        }
        Ok(())
    }

    // ---- items ----

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Append an item produced outside a poll cycle (the initial fetch of a
    /// newly added feed).
    pub fn push_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn mark_read(&mut self, item_id: &str, read: bool) -> Result<()> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| FreshetError::ItemNotFound(item_id.to_string()))?;
        item.read = read;
        Ok(())
    }

    /// Record a click-through on the owning feed.
    pub fn record_click(&mut self, feed_uuid: &str) -> Result<()> {
        let feed = self
            .feeds
            .iter_mut()
            .find(|f| f.uuid == feed_uuid)
            .ok_or_else(|| FreshetError::FeedNotFound(feed_uuid.to_string()))?;
        feed.clicks += 1;
        Ok(())
    }

    /// Drop items older than `max_age_secs` (by receipt time) and items
    /// whose feed no longer exists.
    pub fn purge(&mut self, max_age_secs: i64, now: DateTime<Utc>) {
        let known: HashSet<&str> = self.feeds.iter().map(|f| f.uuid.as_str()).collect();
        let before = self.items.len();
        self.items.retain(|item| {
            known.contains(item.feed_id.as_str())
                && now - item.received <= Duration::seconds(max_age_secs)
        });
        let dropped = before - self.items.len();
        if dropped > 0 {
            debug!(dropped, "purged items");
        }
    }

    pub fn clear_item_history(&mut self) {
        self.items.clear();
    }

    // ---- polling ----

    /// True iff any feed is due at `now`.
    pub fn should_poll(&self, now: DateTime<Utc>) -> bool {
        self.feeds.iter().any(|feed| feed.should_poll(now))
    }

    /// Run one synchronization cycle.
    ///
    /// Returns one batch per feed that produced new items, in arrival order;
    /// entries within a batch are ascending by publish time, while ordering
    /// across batches is unspecified. New items are appended to the history
    /// as their batches arrive. A call made while a cycle is already in
    /// flight returns no batches.
    pub async fn poll(
        &mut self,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        normalizer: &Normalizer,
        config: &Config,
    ) -> Result<Vec<Vec<Item>>> {
        if self.polling {
            debug!("poll requested while a cycle is in flight; ignoring");
            return Ok(Vec::new());
        }
        self.polling = true;
        let result = self.run_cycle(fetcher, normalizer, config).await;
        self.polling = false;
        result
    }

    async fn run_cycle(
        &mut self,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        normalizer: &Normalizer,
        config: &Config,
    ) -> Result<Vec<Vec<Item>>> {
        // One time snapshot for the whole cycle: every feed is judged
        // against the same now, and last_poll updates match the cycle.
        let now = Utc::now();

        let due: Vec<Feed> = self
            .feeds
            .iter()
            .filter(|feed| feed.should_poll(now))
            .cloned()
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let jobs = due.len();
        let workers = jobs.min(config.max_workers.max(1));
        debug!(jobs, workers, "starting poll cycle");

        let filters = Arc::new(self.compile_filters());
        let semaphore = Arc::new(Semaphore::new(workers));
        let (tx, mut rx) = mpsc::channel::<PollOutcome>(jobs);
        let config = Arc::new(config.clone());
        let icon_dir = Config::icon_cache_dir().ok();

        for feed in due {
            tokio::spawn(poll_feed_job(
                feed,
                now,
                Arc::clone(&fetcher),
                normalizer.clone(),
                Arc::clone(&config),
                Arc::clone(&filters),
                icon_dir.clone(),
                Arc::clone(&semaphore),
                tx.clone(),
            ));
        }
        drop(tx);

        // Every job deposits exactly one outcome, so draining the channel
        // consumes the whole cycle without further accounting.
        let mut batches = Vec::new();
        while let Some(outcome) = rx.recv().await {
            self.merge_feed(outcome.feed);
            self.merge_tallies(outcome.tallies);
            if !outcome.items.is_empty() {
                self.items.extend(outcome.items.iter().cloned());
                batches.push(outcome.items);
            }
        }

        info!(
            batches = batches.len(),
            items = batches.iter().map(Vec::len).sum::<usize>(),
            "poll cycle complete"
        );
        Ok(batches)
    }

    /// Compile the enabled filters for worker-side evaluation. Stored query
    /// text was validated on save, so a compile failure here means snapshot
    /// tampering; such a filter is skipped with a warning.
    fn compile_filters(&self) -> Vec<CompiledFilter> {
        self.filters
            .iter()
            .filter(|f| f.enabled)
            .filter_map(|f| match f.compile() {
                Ok(compiled) => Some(compiled),
                Err(err) => {
                    warn!(query = %f.query, error = %err, "skipping unparsable filter");
                    None
                }
            })
            .collect()
    }

    fn merge_feed(&mut self, polled: Feed) {
        match self.feeds.iter_mut().find(|f| f.uuid == polled.uuid) {
            Some(feed) => *feed = polled,
            // Removed mid-cycle; its results are dropped with it.
            None => debug!(feed = %polled.url, "polled feed no longer exists"),
        }
    }

    fn merge_tallies(&mut self, tallies: Vec<FilterTally>) {
        for tally in tallies {
            if let Some(filter) = self.filters.iter_mut().find(|f| f.uuid == tally.uuid) {
                filter.inputs += tally.inputs;
                filter.outputs += tally.outputs;
            }
        }
    }
}

/// One worker job: poll the feed clone, filter and sort its new entries,
/// and deposit exactly one outcome, empty on failure. The semaphore bounds
/// how many jobs fetch concurrently.
#[allow(clippy::too_many_arguments)]
async fn poll_feed_job(
    mut feed: Feed,
    now: DateTime<Utc>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    normalizer: Normalizer,
    config: Arc<Config>,
    filters: Arc<Vec<CompiledFilter>>,
    icon_dir: Option<PathBuf>,
    semaphore: Arc<Semaphore>,
    tx: mpsc::Sender<PollOutcome>,
) {
    let _permit = semaphore.acquire_owned().await.ok();

    let new_items = match feed.poll(now, fetcher.as_ref(), &normalizer, &config).await {
        Ok(items) => items,
        Err(err) => {
            warn!(feed = %feed.url, error = %err, "failed to poll feed");
            Vec::new()
        }
    };

    if !new_items.is_empty() {
        if let Some(dir) = &icon_dir {
            if !feed.has_favicon(dir) {
                feed.download_favicon(fetcher.as_ref(), dir).await;
            }
        }
    }

    let (mut items, tallies) = apply_filters(&filters, &feed.uuid, new_items);
    items.sort_by_key(|item| item.timestamp);

    // The receiver only drops once all outcomes are in; a send failure
    // means the cycle is already gone, so there is nothing left to report.
    let _ = tx.send(PollOutcome { feed, items, tallies }).await;
}

/// Keep only items accepted by every applicable filter. Every applicable
/// filter's input counter ticks per item; its output counter ticks only on
/// acceptance. All filters are evaluated even after one rejects, so the
/// counters stay meaningful for diagnostics.
fn apply_filters(
    filters: &[CompiledFilter],
    feed_uuid: &str,
    items: Vec<Item>,
) -> (Vec<Item>, Vec<FilterTally>) {
    let mut tallies: Vec<FilterTally> = filters
        .iter()
        .map(|f| FilterTally {
            uuid: f.uuid.clone(),
            inputs: 0,
            outputs: 0,
        })
        .collect();

    let mut kept = Vec::new();
    for item in items {
        let mut accepted = true;
        for (filter, tally) in filters.iter().zip(tallies.iter_mut()) {
            if !filter.applies_to(feed_uuid) {
                continue;
            }
            tally.inputs += 1;
            if filter.accepts(&item) {
                tally.outputs += 1;
            } else {
                accepted = false;
            }
        }
        if accepted {
            kept.push(item);
        }
    }

    tallies.retain(|t| t.inputs > 0);
    (kept, tallies)
}
