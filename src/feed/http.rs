//! Paginated JSON feed client.
//!
//! The feed answers `GET <url>?start=..&end=..[&cursor=..]` with
//! `{"results": [RawReading...], "next_cursor": "..."}`; pages are followed
//! until the cursor runs out or the page limit is hit.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use super::{group_into_frames, FeedError, FrameSource, RawReading};
use crate::models::HourlyFrame;

// ---

#[derive(Debug, Clone)]
pub struct HttpFeed {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    max_pages: u32,
}

impl HttpFeed {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
        max_pages: u32,
    ) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("madrid-o3-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            token,
            max_pages,
        })
    }

    async fn fetch_rows(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<RawReading>, FeedError> {
        // ---
        let start = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut rows = Vec::new();
        let mut cursor: Option<String> = None;
        let mut page_count = 0;

        loop {
            if page_count >= self.max_pages {
                debug!(
                    "Hit page limit of {}, stopping pagination. Fetched {} rows so far.",
                    self.max_pages,
                    rows.len()
                );
                break;
            }
            page_count += 1;

            let mut req = self
                .client
                .get(&self.url)
                .query(&[("start", start.as_str()), ("end", end.as_str())]);
            if let Some(c) = cursor.as_deref() {
                req = req.query(&[("cursor", c)]);
            }
            if let Some(token) = self.token.as_deref() {
                req = req.bearer_auth(token);
            }

            debug!("Fetching feed page {} from {}", page_count, self.url);
            let resp = req.send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(FeedError::Http(status.as_u16()));
            }
            let body: serde_json::Value = resp.json().await?;

            let Some(results) = body.get("results").and_then(|r| r.as_array()) else {
                return Err(FeedError::Decode(
                    "response missing 'results' array".to_string(),
                ));
            };

            for (i, item) in results.iter().enumerate() {
                match serde_json::from_value::<RawReading>(item.clone()) {
                    Ok(row) => rows.push(row),
                    Err(e) => debug!("Skipping row {} on page {}: {}", i, page_count, e),
                }
            }

            cursor = body
                .get("next_cursor")
                .and_then(|c| c.as_str())
                .map(String::from);
            if cursor.is_none() {
                break;
            }
        }

        info!(
            "Fetched {} feed rows from {} pages",
            rows.len(),
            page_count
        );
        Ok(rows)
    }
}

#[async_trait]
impl FrameSource for HttpFeed {
    async fn fetch_hourly_frames(
        &self,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyFrame>, FeedError> {
        // ---
        let start = now - chrono::Duration::hours(i64::from(window_hours));
        let rows = self.fetch_rows(start, now).await?;
        let frames = group_into_frames(rows);

        match frames.last() {
            Some(last) => {
                info!(
                    hours = frames.len(),
                    latest_hour = %last.hour_utc,
                    stations = last.stations.len(),
                    "Parsed hourly frames from feed"
                );
                Ok(frames)
            }
            None => Err(FeedError::Empty),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
