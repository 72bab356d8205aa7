use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{FreshetError, Result};
use crate::config::Config;
use crate::domain::Item;
use crate::engine::FeedManager;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::normalizer::Normalizer;
use crate::store::SnapshotStore;

/// Wires together the engine and its collaborators: configuration, the
/// snapshot store, the HTTP fetcher and the normalizer.
pub struct AppContext {
    pub config: Config,
    pub store: SnapshotStore,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub normalizer: Normalizer,
    pub manager: FeedManager,
}

impl AppContext {
    /// Load config and state from their default locations.
    ///
    /// An unreadable snapshot (all three rotation files corrupt) is fatal
    /// here; the caller decides whether to abort or start over.
    pub fn new(data_path: Option<PathBuf>) -> Result<Self> {
        let config = Config::load().map_err(|e| FreshetError::Config(e.to_string()))?;
        Self::with_config(config, data_path)
    }

    pub fn with_config(config: Config, data_path: Option<PathBuf>) -> Result<Self> {
        let data_path = match data_path {
            Some(path) => path,
            None => {
                Config::default_data_path().map_err(|e| FreshetError::Config(e.to_string()))?
            }
        };

        let store = SnapshotStore::new(data_path);
        let manager = FeedManager::from_snapshot(store.load_or_default()?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new(&config)?);

        Ok(Self {
            config,
            store,
            fetcher,
            normalizer: Normalizer::new(),
            manager,
        })
    }

    /// Persist the manager's current state.
    pub fn save(&self) -> Result<()> {
        self.store.save(&self.manager.snapshot())?;
        Ok(())
    }

    /// Run one poll cycle and persist the outcome. Even an empty cycle
    /// advances poll clocks and cache validators, so the save is
    /// unconditional.
    pub async fn poll(&mut self) -> Result<Vec<Vec<Item>>> {
        let batches = self
            .manager
            .poll(
                Arc::clone(&self.fetcher),
                &self.normalizer,
                &self.config,
            )
            .await?;
        self.save()?;
        Ok(batches)
    }
}
