pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Credentials;

pub use http_fetcher::HttpFetcher;

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched successfully
    Content {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Content not modified (HTTP 304). Servers may re-report validators
    /// on a 304; when present they replace the stored ones.
    NotModified {
        etag: Option<String>,
        last_modified: Option<String>,
    },
}

#[async_trait]
pub trait Fetcher {
    /// Conditionally fetch a feed, echoing cache validators from the
    /// previous response.
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        credentials: Option<&Credentials>,
    ) -> Result<FetchResult>;

    /// Plain byte download, used for site icons.
    async fn download(&self, url: &str) -> Result<Vec<u8>>;
}
