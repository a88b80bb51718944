use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::parser;
use super::provider::{MatchFeed, MatchSource};
use crate::error::WatchError;
use crate::scoring::{MapScore, MatchState};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Match pages fetched straight from hltv.org over HTTP.
#[derive(Clone)]
pub struct HltvSource {
    http: Client,
    /// Base URL for overriding in tests
    base_url: Url,
    /// How long to wait for the match header to appear
    lookup_timeout: Duration,
    /// Delay between page refreshes while waiting
    retry_delay: Duration,
}

impl HltvSource {
    pub fn new(base_url: &str, http_timeout: Duration, lookup_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        let mut base_url = Url::parse(base_url).context("Invalid HLTV base URL")?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(HltvSource {
            http,
            base_url,
            lookup_timeout,
            retry_delay: Duration::from_secs(1),
        })
    }

    fn match_url(&self, match_id: &str) -> Result<Url, WatchError> {
        if match_id.is_empty() || !match_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(WatchError::NotFound(format!("invalid match id '{}'", match_id)));
        }
        self.base_url
            .join(&format!("matches/{}/_", match_id))
            .map_err(|e| WatchError::NotFound(format!("bad match URL: {}", e)))
    }
}

#[async_trait]
impl MatchSource for HltvSource {
    fn name(&self) -> &str {
        "HLTV"
    }

    async fn open(&self, match_id: &str) -> Result<Box<dyn MatchFeed>, WatchError> {
        let url = self.match_url(match_id)?;
        info!("Opening HLTV match page {}", url);
        Ok(Box::new(HltvFeed {
            http: self.http.clone(),
            url,
            lookup_timeout: self.lookup_timeout,
            retry_delay: self.retry_delay,
        }))
    }
}

/// One open HLTV match page.
pub struct HltvFeed {
    http: Client,
    url: Url,
    lookup_timeout: Duration,
    retry_delay: Duration,
}

impl HltvFeed {
    async fn fetch(&self) -> Result<String, WatchError> {
        debug!("Fetching {}", self.url);
        let resp = self.http.get(self.url.clone()).send().await?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                return Err(WatchError::NotFound(format!("{} returned 404", self.url)))
            }
            s if !s.is_success() => {
                return Err(WatchError::Transport(format!("HLTV error: {}", s)))
            }
            _ => {}
        }

        Ok(resp.text().await?)
    }

    /// Re-fetch the page until the match header shows up or the lookup
    /// timeout runs out.
    async fn wait_for_match(&self) -> Result<String, WatchError> {
        let deadline = tokio::time::Instant::now() + self.lookup_timeout;
        loop {
            match self.fetch().await {
                Ok(html) if parser::has_match_container(&html) => return Ok(html),
                Ok(_) => debug!("Match container not rendered yet at {}", self.url),
                Err(e @ WatchError::NotFound(_)) => return Err(e),
                Err(e) => debug!("Fetch failed while waiting for match: {}", e),
            }

            if tokio::time::Instant::now() + self.retry_delay > deadline {
                return Err(WatchError::NotFound(format!(
                    "match did not appear at {} within {:?}",
                    self.url, self.lookup_timeout
                )));
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }
}

#[async_trait]
impl MatchFeed for HltvFeed {
    async fn load_match(&mut self) -> Result<MatchState, WatchError> {
        let html = self.wait_for_match().await?;
        parser::parse_match(&html)
    }

    async fn map_scores(&mut self) -> Result<Vec<MapScore>, WatchError> {
        let html = self.fetch().await?;
        parser::parse_maps(&html)
    }

    async fn close(self: Box<Self>) {
        debug!("Closed HLTV match page {}", self.url);
    }
}
