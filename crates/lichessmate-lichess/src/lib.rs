//! Lichess adapter.
//!
//! Implements the `lichessmate-core` API gateway over the public Lichess HTTP
//! API. Lichess asks clients that receive a 429 to wait a full minute before
//! the next request; the client does that wait itself and reports "no data".

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use tokio::time::sleep;
use tracing::warn;

use lichessmate_core::{api::ApiGateway, errors::Error, Result};

#[derive(Clone, Debug)]
pub struct LichessClient {
    base_url: String,
    rate_limit_backoff: Duration,
    http: reqwest::Client,
}

impl LichessClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        rate_limit_backoff: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            base_url,
            rate_limit_backoff,
            http,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl ApiGateway for LichessClient {
    async fn send(&self, path: &str) -> Result<Option<serde_json::Value>> {
        let url = self.endpoint(path);
        let resp = self
            .http
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("lichess request error: {e}")))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(
                "Response 429 - waiting {}s before using the API again",
                self.rate_limit_backoff.as_secs()
            );
            sleep(self.rate_limit_backoff).await;
            return Ok(None);
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Transport(format!(
                "lichess request failed: {status} {url} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Transport(format!("lichess json error: {e}")))?;
        Ok(Some(v))
    }
}
