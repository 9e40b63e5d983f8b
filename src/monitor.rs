//! Ingest orchestration.
//!
//! One ingest cycle is: fetch frames (feed, or synthetic fallback) → check
//! coverage → run the engine against the stored state → compare-and-set the
//! new state together with its frames and change-log entry → record an
//! episode snapshot while INFO_EXCEEDED. The whole cycle runs under a single
//! async mutex, so concurrent ingests never interleave.
//!
//! Polling faster than the feed publishes re-evaluates the same hour; the
//! engine holds the streaks for that hour, so a flip needs two distinct
//! hours.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::Config;
use crate::feed::{validate_data_coverage, FeedError, FrameSource, HttpFeed, MockFeed, Scenario};
use crate::models::{HourlyFrame, Status, StatusResponse};
use crate::status::{
    build_status_response, change_log_entry, evaluate, latest_complete_frame, FreezeReason,
    Outcome, StatusError, MIN_STATIONS,
};
use crate::store::{MemoryStore, StatusStore, StoreError};

// ---

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(
        "insufficient data coverage (need at least {min} stations, got {stations})",
        min = MIN_STATIONS
    )]
    InsufficientCoverage { stations: usize },

    #[error("demo scenarios are disabled")]
    DemoDisabled,

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Summary returned by an ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    // ---
    pub ingest_id: Uuid,
    pub status: Status,
    pub previous_status: Option<Status>,
    pub flipped: bool,
    pub frozen: Option<FreezeReason>,
    pub data_age_minutes: i64,
    pub stations_count: usize,
    pub used_mock: bool,
    pub message: String,
}

pub struct Monitor {
    store: Arc<dyn StatusStore>,
    feed: Option<Arc<dyn FrameSource>>,
    fallback: Arc<dyn FrameSource>,
    window_hours: u32,
    force_mock: bool,
    demo_enabled: bool,
    ingest_lock: Mutex<()>,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn StatusStore>,
        feed: Option<Arc<dyn FrameSource>>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            feed,
            fallback: Arc::new(MockFeed::new(Scenario::Baseline)),
            window_hours: config.feed_window_hours,
            force_mock: config.feed_force_mock,
            demo_enabled: config.demo_enabled,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Memory store plus the HTTP feed when `FEED_URL` is configured.
    pub fn from_config(config: &Config) -> Result<Self, FeedError> {
        // ---
        let store: Arc<dyn StatusStore> = Arc::new(MemoryStore::new(
            config.changelog_capacity,
            config.episode_capacity,
        ));
        let feed = match &config.feed_url {
            Some(url) => {
                let http: Arc<dyn FrameSource> = Arc::new(HttpFeed::new(
                    url.clone(),
                    config.feed_token.clone(),
                    config.feed_timeout,
                    config.feed_max_pages,
                )?);
                Some(http)
            }
            None => None,
        };
        Ok(Self::new(store, feed, config))
    }

    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    pub async fn ingest(&self, demo: Option<Scenario>) -> Result<IngestOutcome, MonitorError> {
        self.ingest_at(demo, Utc::now()).await
    }

    /// Runs one ingest cycle with an explicit clock.
    ///
    /// A demo scenario replaces the feed with synthetic frames and bypasses
    /// debounce; it is refused unless demos are enabled.
    pub async fn ingest_at(
        &self,
        demo: Option<Scenario>,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, MonitorError> {
        // ---
        if demo.is_some() && !self.demo_enabled {
            return Err(MonitorError::DemoDisabled);
        }

        let ingest_id = Uuid::new_v4();
        let span = info_span!("ingest", %ingest_id);
        async {
            let _guard = self.ingest_lock.lock().await;
            self.run_ingest(ingest_id, demo, now).await
        }
        .instrument(span)
        .await
    }

    async fn run_ingest(
        &self,
        ingest_id: Uuid,
        demo: Option<Scenario>,
        now: DateTime<Utc>,
    ) -> Result<IngestOutcome, MonitorError> {
        // ---
        self.store.initialize(now);

        let (frames, used_mock) = self.fetch_frames(demo, now).await;
        let stations_count = latest_complete_frame(&frames, now).map_or(0, |f| f.stations.len());

        if !validate_data_coverage(&frames, now) && self.store.frames().is_empty() {
            warn!(stations = stations_count, "Insufficient coverage on first ingest");
            return Err(MonitorError::InsufficientCoverage {
                stations: stations_count,
            });
        }

        let previous = self.store.state();
        let eval = evaluate(&frames, previous.as_ref(), demo.is_some(), now);
        if eval.outcome == Outcome::NoData {
            warn!("No usable frame, stored state left untouched");
            return Err(StatusError::NoData.into());
        }

        let response = build_status_response(&eval.state, &frames, now)?;
        let as_of = Some(response.as_of_utc);
        let change = change_log_entry(previous.as_ref(), &eval.state, as_of, now);
        let flipped = change.is_some();

        self.store
            .compare_and_set_state(previous.as_ref(), eval.state.clone(), frames, change)?;

        let state = &eval.state;
        match eval.outcome {
            Outcome::Frozen(reason) => info!(
                ?reason,
                status = %state.current_status,
                data_age_minutes = state.data_age_minutes,
                "State frozen"
            ),
            _ if flipped => warn!(
                from = ?previous.as_ref().map(|p| p.current_status),
                to = %state.current_status,
                trigger = ?state.trigger.as_ref().map(|t| t.name.as_str()),
                "Status flipped"
            ),
            _ => debug!(
                status = %state.current_status,
                consecutive_exceeded = state.consecutive_exceeded,
                consecutive_compliant = state.consecutive_compliant,
                "Status unchanged"
            ),
        }

        if state.current_status == Status::InfoExceeded
            && self.store.add_episode_snapshot(&response)
        {
            info!(as_of = %response.as_of_utc, "Episode snapshot recorded");
        }

        let frozen = match eval.outcome {
            Outcome::Frozen(reason) => Some(reason),
            _ => None,
        };

        Ok(IngestOutcome {
            ingest_id,
            status: state.current_status,
            previous_status: previous.map(|p| p.current_status),
            flipped,
            frozen,
            data_age_minutes: response.data_age_minutes,
            stations_count,
            used_mock,
            message: format!("Status computed: {}", state.current_status),
        })
    }

    async fn fetch_frames(
        &self,
        demo: Option<Scenario>,
        now: DateTime<Utc>,
    ) -> (Vec<HourlyFrame>, bool) {
        // ---
        if let Some(scenario) = demo {
            info!(?scenario, "Using demo scenario");
            let source = MockFeed::new(scenario);
            return (self.synthetic(&source, now).await, true);
        }

        let feed = match &self.feed {
            Some(feed) if !self.force_mock => feed,
            _ => {
                debug!("No live feed in use, generating synthetic frames");
                return (self.synthetic(self.fallback.as_ref(), now).await, true);
            }
        };

        match feed.fetch_hourly_frames(self.window_hours, now).await {
            Ok(frames) if !frames.is_empty() => (frames, false),
            Ok(_) => {
                warn!(feed = feed.name(), "Feed returned no frames, using synthetic data");
                (self.synthetic(self.fallback.as_ref(), now).await, true)
            }
            Err(e) => {
                warn!(feed = feed.name(), error = %e, "Feed unavailable, using synthetic data");
                (self.synthetic(self.fallback.as_ref(), now).await, true)
            }
        }
    }

    async fn synthetic(&self, source: &dyn FrameSource, now: DateTime<Utc>) -> Vec<HourlyFrame> {
        // ---
        match source.fetch_hourly_frames(self.window_hours, now).await {
            Ok(frames) => frames,
            Err(e) => {
                error!(source = source.name(), error = %e, "Synthetic source failed");
                Vec::new()
            }
        }
    }

    /// Public view of the stored state, without ingesting.
    pub fn stored_status(&self, now: DateTime<Utc>) -> Result<StatusResponse, MonitorError> {
        let (state, frames) = self.store.snapshot();
        let state = state.ok_or(StatusError::NoData)?;
        Ok(build_status_response(&state, &frames, now)?)
    }

    /// Public view of the stored state; runs one ingest first if nothing has
    /// been ingested yet.
    pub async fn current_status(&self) -> Result<StatusResponse, MonitorError> {
        // ---
        let now = Utc::now();
        if self.store.frames().is_empty() {
            info!("No stored frames, ingesting before answering");
            self.ingest_at(None, now).await?;
        }
        self.stored_status(now)
    }

    /// Ingests every `period` until the task is aborted.
    pub fn spawn_ingest_loop(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = self.ingest(None).await {
                    error!(error = %e, "Scheduled ingest failed");
                }
            }
        })
    }
}
