use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Transport, TransportError};

/// A request captured by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub body: serde_json::Value,
    /// Whether the transport reported the request as delivered.
    pub delivered: bool,
}

/// In-memory [`Transport`] that records every request.
///
/// Requests to URLs starting with a host marked down with
/// [`set_down`](Self::set_down) fail with a 500 status. Useful for tests and
/// for running the route manager without live shards.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    requests: Mutex<Vec<RecordedRequest>>,
    down: Mutex<HashSet<String>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make requests to `host` fail (`down = true`) or succeed again.
    pub fn set_down(&self, host: &str, down: bool) {
        let mut hosts = self.down.lock().unwrap_or_else(|e| e.into_inner());
        if down {
            hosts.insert(host.to_string());
        } else {
            hosts.remove(host);
        }
    }

    /// All requests recorded so far, in delivery order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded requests whose URL starts with `prefix`.
    pub fn requests_to(&self, prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.starts_with(prefix))
            .collect()
    }

    /// Forget all recorded requests.
    pub fn clear(&self) {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    fn is_down(&self, url: &str) -> bool {
        self.down
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|host| url.starts_with(host.as_str()))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<(), TransportError> {
        let delivered = !self.is_down(url);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedRequest {
                url: url.to_string(),
                body: body.clone(),
                delivered,
            });
        if delivered {
            Ok(())
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                status: 500,
            })
        }
    }
}
