use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::Item;
use crate::query::{self, Expr, MatchOptions, QueryError};

/// A named boolean keyword query plus the set of feeds it applies to.
///
/// Query text is validated at construction and on every edit, so a filter
/// holding unparsable text can never enter the active set. The `inputs` and
/// `outputs` counters record how many items the filter has examined and
/// passed, for diagnostic display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub uuid: String,
    pub enabled: bool,
    pub query: String,
    pub ignore_case: bool,
    pub whole_word: bool,
    /// Feed uuids this filter is restricted to; empty means all feeds.
    #[serde(default)]
    pub feeds: HashSet<String>,
    #[serde(default)]
    pub inputs: u64,
    #[serde(default)]
    pub outputs: u64,
}

impl Filter {
    pub fn new(query: String) -> Result<Self, QueryError> {
        query::parse(&query)?;
        Ok(Self {
            uuid: Item::random_token(),
            enabled: true,
            query,
            ignore_case: true,
            whole_word: true,
            feeds: HashSet::new(),
            inputs: 0,
            outputs: 0,
        })
    }

    /// Replace the query text, re-validating it first.
    pub fn set_query(&mut self, query: String) -> Result<(), QueryError> {
        query::parse(&query)?;
        self.query = query;
        Ok(())
    }

    pub fn applies_to(&self, feed_uuid: &str) -> bool {
        self.feeds.is_empty() || self.feeds.contains(feed_uuid)
    }

    /// Compile into the immutable form evaluated by poll workers.
    pub fn compile(&self) -> Result<CompiledFilter, QueryError> {
        Ok(CompiledFilter {
            uuid: self.uuid.clone(),
            expr: query::parse(&self.query)?,
            opts: MatchOptions {
                ignore_case: self.ignore_case,
                whole_word: self.whole_word,
            },
            feeds: self.feeds.clone(),
        })
    }
}

/// A filter compiled for one synchronization cycle. Workers share these
/// read-only; counter updates travel back to the manager as tallies.
#[derive(Debug, Clone)]
pub struct CompiledFilter {
    pub uuid: String,
    pub expr: Expr,
    pub opts: MatchOptions,
    pub feeds: HashSet<String>,
}

impl CompiledFilter {
    pub fn applies_to(&self, feed_uuid: &str) -> bool {
        self.feeds.is_empty() || self.feeds.contains(feed_uuid)
    }

    pub fn accepts(&self, item: &Item) -> bool {
        self.expr.matches(item, self.opts)
    }
}
