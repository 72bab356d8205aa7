pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "freshet")]
#[command(about = "A feed synchronization and filtering engine", long_about = None)]
pub struct Cli {
    /// Path of the snapshot file (default: platform data directory)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a feed
    Add {
        /// URL of the feed to add
        url: String,

        /// Polling interval in seconds (default: inferred from the feed)
        #[arg(short, long)]
        interval: Option<i64>,

        /// Basic-auth username
        #[arg(long, requires = "password")]
        username: Option<String>,

        /// Basic-auth password
        #[arg(long, requires = "username")]
        password: Option<String>,
    },
    /// Unsubscribe from a feed
    Remove {
        /// URL of the feed to remove
        url: String,
    },
    /// Resume polling a feed
    Enable {
        /// URL of the feed to enable
        url: String,
    },
    /// Stop polling a feed without unsubscribing
    Disable {
        /// URL of the feed to disable
        url: String,
    },
    /// List feeds or items
    List {
        /// Show items instead of feeds
        #[arg(long)]
        items: bool,
    },
    /// Poll feeds that are due
    Update {
        /// Poll every feed regardless of its schedule
        #[arg(short, long)]
        force: bool,
    },
    /// Manage keyword filters
    Filter {
        #[command(subcommand)]
        action: FilterAction,
    },
    /// Mark an item as read
    Read {
        /// Item id (or unambiguous prefix)
        item: String,
    },
    /// Open an item's link in the browser and mark it read
    Open {
        /// Item id (or unambiguous prefix)
        item: String,
    },
    /// Drop old items from the history
    Purge {
        /// Maximum item age in seconds (default: from config)
        #[arg(long)]
        max_age: Option<i64>,
    },
    /// Poll continuously in the foreground
    Watch {
        /// Seconds between schedule checks
        #[arg(long, default_value_t = 5)]
        tick: u64,
    },
}

#[derive(Subcommand)]
pub enum FilterAction {
    /// Add a filter; the query is validated before it is saved
    Add {
        /// Filter query, e.g. "+title:rust -sponsored"
        query: String,

        /// Match case exactly
        #[arg(long)]
        match_case: bool,

        /// Match on substrings instead of whole words
        #[arg(long)]
        substring: bool,

        /// Restrict the filter to these feed URLs (default: all feeds)
        #[arg(long = "feed")]
        feeds: Vec<String>,
    },
    /// Remove a filter
    Remove {
        /// Filter id (or unambiguous prefix)
        filter: String,
    },
    /// List filters with their hit counters
    List,
    /// Enable a filter
    Enable {
        /// Filter id (or unambiguous prefix)
        filter: String,
    },
    /// Disable a filter
    Disable {
        /// Filter id (or unambiguous prefix)
        filter: String,
    },
}
