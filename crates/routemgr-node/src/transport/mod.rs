//! Outbound request transport.
//!
//! The broadcasters only need to POST a JSON body to a URL and learn whether
//! it was accepted. [`HttpTransport`] does this over HTTP; [`MemoryTransport`]
//! records requests in memory and can simulate unreachable hosts.

mod http;
mod memory;

use async_trait::async_trait;

pub use http::HttpTransport;
pub use memory::{MemoryTransport, RecordedRequest};

/// Errors raised while delivering a request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Delivers JSON requests to shards.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` to `url`. Any non-success outcome is an error.
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<(), TransportError>;
}
