//! HTTP client seam and the single GET helper used against the upstream.

mod basic;

pub use basic::BasicClient;

use async_trait::async_trait;
use reqwest::{Request, Response};
use tracing::debug;

use crate::error::{Error, Result};
use crate::upstream::Resource;

/// Executes prepared requests. Wrappers and test doubles implement this.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// GETs `url` on behalf of `resource` and returns the raw body.
///
/// # Errors
///
/// [`Error::Fetch`] if the request cannot be built, sent or read back, and
/// [`Error::Status`] if the upstream answers with a non-success status.
pub async fn fetch_bytes<C: HttpClient + ?Sized>(
    client: &C,
    resource: &Resource,
    url: &str,
) -> Result<Vec<u8>> {
    let fetch_err = |message: String| Error::Fetch {
        resource: resource.clone(),
        message,
    };

    let parsed = url
        .parse()
        .map_err(|e| fetch_err(format!("invalid url '{url}': {e}")))?;
    let req = Request::new(reqwest::Method::GET, parsed);

    let resp = client
        .execute(req)
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Status {
            resource: resource.clone(),
            status: status.as_u16(),
        });
    }

    let bytes = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
    debug!(%resource, bytes = bytes.len(), "Upstream body received");
    Ok(bytes.to_vec())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Answers every request with a fixed status and body, recording URLs.
    pub(crate) struct CannedClient {
        pub status: u16,
        pub body: &'static str,
        pub seen: Mutex<Vec<String>>,
    }

    impl CannedClient {
        pub(crate) fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn urls(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, req: Request) -> reqwest::Result<Response> {
            self.seen.lock().unwrap().push(req.url().to_string());
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(Response::from(resp))
        }
    }
}
