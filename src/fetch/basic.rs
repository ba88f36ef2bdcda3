use std::time::Duration;

use super::HttpClient;
use async_trait::async_trait;

/// Plain reqwest client with connect and per-request timeouts.
pub struct BasicClient(reqwest::Client);

impl BasicClient {
    pub fn new(request_timeout: Duration, connect_timeout: Duration) -> reqwest::Result<Self> {
        Self::from_builder(reqwest::Client::builder(), request_timeout, connect_timeout)
    }

    pub(crate) fn from_builder(
        builder: reqwest::ClientBuilder,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> reqwest::Result<Self> {
        let inner = builder
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self(inner))
    }
}

#[async_trait]
impl HttpClient for BasicClient {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        self.0.execute(req).await
    }
}
