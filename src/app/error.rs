use thiserror::Error;

use crate::query::QueryError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum FreshetError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Filter query error: {0}")]
    Query(#[from] QueryError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Filter not found: {0}")]
    FilterNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FreshetError>;
