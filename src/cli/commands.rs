use std::collections::HashSet;

use chrono::Utc;
use tracing::info;

use crate::app::{AppContext, FreshetError, Result};
use crate::cli::FilterAction;
use crate::domain::{Credentials, Feed, Filter, Item};
use crate::engine::{FeedEdit, FilterEdit};
use crate::interval;

pub async fn add_feed(
    ctx: &mut AppContext,
    url: &str,
    interval_secs: Option<i64>,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    if ctx.manager.feed_by_url(url).is_some() {
        println!("Feed already exists: {}", url);
        return Ok(());
    }

    let mut feed = Feed::new(url.to_string(), ctx.config.default_interval_secs);
    if let (Some(username), Some(password)) = (username, password) {
        feed.credentials = Some(Credentials { username, password });
    }

    // First fetch, both to validate the subscription and to infer a
    // sensible polling cadence from the entries already published.
    let now = Utc::now();
    let items = feed
        .poll(now, ctx.fetcher.as_ref(), &ctx.normalizer, &ctx.config)
        .await?;

    feed.interval = match interval_secs {
        Some(secs) => secs,
        None => {
            let timestamps: Vec<_> = items.iter().map(|item| item.timestamp).collect();
            interval::estimate(&timestamps, &ctx.config)
        }
    };

    println!("Added feed: {}", feed.display_title());
    println!(
        "Fetched {} items, polling every {}s",
        items.len(),
        feed.interval
    );

    ctx.manager.add_feed(feed);
    for item in items {
        ctx.manager.push_item(item);
    }
    ctx.save()?;

    Ok(())
}

pub fn remove_feed(ctx: &mut AppContext, url: &str) -> Result<()> {
    let feed = ctx
        .manager
        .feed_by_url(url)
        .ok_or_else(|| FreshetError::FeedNotFound(url.to_string()))?;
    let uuid = feed.uuid.clone();
    let removed = ctx.manager.remove_feed(&uuid)?;
    ctx.save()?;
    println!("Removed feed: {}", removed.display_title());
    Ok(())
}

pub fn set_feed_enabled(ctx: &mut AppContext, url: &str, enabled: bool) -> Result<()> {
    let uuid = ctx
        .manager
        .feed_by_url(url)
        .map(|feed| feed.uuid.clone())
        .ok_or_else(|| FreshetError::FeedNotFound(url.to_string()))?;
    ctx.manager.update_feed(
        &uuid,
        FeedEdit {
            enabled: Some(enabled),
            ..Default::default()
        },
    )?;
    ctx.save()?;
    println!(
        "{} feed: {}",
        if enabled { "Enabled" } else { "Disabled" },
        url
    );
    Ok(())
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    if ctx.manager.feeds().is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in ctx.manager.feeds() {
        let status = if feed.enabled { "" } else { " [disabled]" };
        println!(
            "{}  {}{}\n    {} (every {}s, {} items, {} clicks)",
            &feed.uuid[..8],
            feed.display_title(),
            status,
            feed.url,
            feed.interval,
            feed.item_count,
            feed.clicks,
        );
    }

    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    if ctx.manager.items().is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in ctx.manager.items() {
        let read_marker = if item.read { " " } else { "●" };
        let date = item.timestamp.format("%Y-%m-%d");
        println!(
            "{} {} {}  {}",
            read_marker,
            &item.id[..8],
            date,
            item.display_title()
        );
    }

    Ok(())
}

pub async fn update_feeds(ctx: &mut AppContext, force: bool) -> Result<()> {
    if ctx.manager.feeds().is_empty() {
        println!("No feeds to update");
        return Ok(());
    }

    if force {
        ctx.manager.force_poll();
    }

    let batches = ctx.poll().await?;
    print_batches(ctx, &batches);

    Ok(())
}

fn print_batches(ctx: &AppContext, batches: &[Vec<Item>]) {
    let total: usize = batches.iter().map(Vec::len).sum();
    for batch in batches {
        let feed_title = batch
            .first()
            .and_then(|item| ctx.manager.feed(&item.feed_id))
            .map(Feed::display_title)
            .unwrap_or("(unknown feed)");
        for item in batch {
            println!("  {} {}  {}", &item.id[..8], feed_title, item.display_title());
        }
    }
    println!("Update complete: {} new items", total);
}

pub fn filter_command(ctx: &mut AppContext, action: FilterAction) -> Result<()> {
    match action {
        FilterAction::Add {
            query,
            match_case,
            substring,
            feeds,
        } => {
            let mut filter = Filter::new(query).map_err(FreshetError::Query)?;
            filter.ignore_case = !match_case;
            filter.whole_word = !substring;
            let mut scope = HashSet::new();
            for url in feeds {
                let feed = ctx
                    .manager
                    .feed_by_url(&url)
                    .ok_or_else(|| FreshetError::FeedNotFound(url.clone()))?;
                scope.insert(feed.uuid.clone());
            }
            filter.feeds = scope;
            println!("Added filter {}: {}", &filter.uuid[..8], filter.query);
            ctx.manager.add_filter(filter);
            ctx.save()?;
        }
        FilterAction::Remove { filter } => {
            let uuid = find_filter(ctx, &filter)?;
            let removed = ctx.manager.remove_filter(&uuid)?;
            ctx.save()?;
            println!("Removed filter: {}", removed.query);
        }
        FilterAction::List => {
            if ctx.manager.filters().is_empty() {
                println!("No filters");
                return Ok(());
            }
            for filter in ctx.manager.filters() {
                let status = if filter.enabled { "" } else { " [disabled]" };
                println!(
                    "{}  {}{}  ({} in, {} out)",
                    &filter.uuid[..8],
                    filter.query,
                    status,
                    filter.inputs,
                    filter.outputs,
                );
            }
        }
        FilterAction::Enable { filter } => {
            let uuid = find_filter(ctx, &filter)?;
            ctx.manager.update_filter(
                &uuid,
                FilterEdit {
                    enabled: Some(true),
                    ..Default::default()
                },
            )?;
            ctx.save()?;
        }
        FilterAction::Disable { filter } => {
            let uuid = find_filter(ctx, &filter)?;
            ctx.manager.update_filter(
                &uuid,
                FilterEdit {
                    enabled: Some(false),
                    ..Default::default()
                },
            )?;
            ctx.save()?;
        }
    }
    Ok(())
}

pub fn read_item(ctx: &mut AppContext, item: &str) -> Result<()> {
    let id = find_item(ctx, item)?;
    ctx.manager.mark_read(&id, true)?;
    ctx.save()?;
    Ok(())
}

pub fn open_item(ctx: &mut AppContext, item: &str) -> Result<()> {
    let id = find_item(ctx, item)?;
    let (link, feed_id) = {
        let item = ctx
            .manager
            .item(&id)
            .ok_or_else(|| FreshetError::ItemNotFound(id.clone()))?;
        (item.link.clone(), item.feed_id.clone())
    };

    ctx.manager.mark_read(&id, true)?;
    ctx.manager.record_click(&feed_id)?;
    ctx.save()?;

    if link.is_empty() {
        println!("Item has no link");
    } else {
        open::that(&link)?;
    }
    Ok(())
}

pub fn purge(ctx: &mut AppContext, max_age: Option<i64>) -> Result<()> {
    let max_age = max_age.unwrap_or(ctx.config.item_max_age_secs);
    let before = ctx.manager.items().len();
    ctx.manager.purge(max_age, Utc::now());
    let dropped = before - ctx.manager.items().len();
    if dropped > 0 {
        ctx.save()?;
    }
    println!("Purged {} items", dropped);
    Ok(())
}

/// Foreground poll loop: check the schedule every few seconds and run a
/// cycle when anything is due, exactly as a tray application would.
pub async fn watch(ctx: &mut AppContext, tick_secs: u64) -> Result<()> {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(tick_secs.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    info!(tick_secs, "watching feeds");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
            _ = ticker.tick() => {
                if !ctx.manager.should_poll(Utc::now()) {
                    continue;
                }
                match ctx.poll().await {
                    Ok(batches) if !batches.is_empty() => print_batches(ctx, &batches),
                    Ok(_) => {}
                    Err(err) => tracing::warn!(error = %err, "poll cycle failed"),
                }
            }
        }
    }
}

/// Resolve a filter uuid from an unambiguous prefix.
fn find_filter(ctx: &AppContext, prefix: &str) -> Result<String> {
    let matches: Vec<&Filter> = ctx
        .manager
        .filters()
        .iter()
        .filter(|f| f.uuid.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [filter] => Ok(filter.uuid.clone()),
        [] => Err(FreshetError::FilterNotFound(prefix.to_string())),
        _ => Err(FreshetError::Other(format!(
            "filter id prefix is ambiguous: {}",
            prefix
        ))),
    }
}

/// Resolve an item id from an unambiguous prefix.
fn find_item(ctx: &AppContext, prefix: &str) -> Result<String> {
    let matches: Vec<&Item> = ctx
        .manager
        .items()
        .iter()
        .filter(|i| i.id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [item] => Ok(item.id.clone()),
        [] => Err(FreshetError::ItemNotFound(prefix.to_string())),
        _ => Err(FreshetError::Other(format!(
            "item id prefix is ambiguous: {}",
            prefix
        ))),
    }
}
