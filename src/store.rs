//! State store: current [`StatusState`], retained frames, change log and
//! episode snapshots.
//!
//! [`StatusStore`] is the seam; [`MemoryStore`] is the in-process
//! implementation. The state itself is only ever replaced through
//! [`StatusStore::compare_and_set_state`], which swaps the frames and
//! appends the change-log entry under the same write lock: a flip is
//! recorded exactly once even if two ingests race, and readers never see a
//! new state over old frames.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use thiserror::Error;

use crate::models::{
    ChangeLogEntry, EpisodeSnapshot, HourlyFrame, Status, StatusResponse, StatusState,
};
use crate::status::episode_id;

// ---

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The stored state changed between read and write.
    #[error("state was modified concurrently")]
    Conflict,
}

pub trait StatusStore: Send + Sync {
    /// Installs a default COMPLIANT state if none exists yet.
    fn initialize(&self, now: DateTime<Utc>);

    fn state(&self) -> Option<StatusState>;

    /// Replaces the state and the retained frames if the stored state still
    /// equals `expected`, and appends `change` to the change log in the same
    /// step. On conflict nothing is written.
    fn compare_and_set_state(
        &self,
        expected: Option<&StatusState>,
        next: StatusState,
        frames: Vec<HourlyFrame>,
        change: Option<ChangeLogEntry>,
    ) -> Result<(), StoreError>;

    fn frames(&self) -> Vec<HourlyFrame>;

    /// Replaces the retained window wholesale.
    fn set_frames(&self, frames: Vec<HourlyFrame>);

    /// State and frames read under one lock.
    fn snapshot(&self) -> (Option<StatusState>, Vec<HourlyFrame>);

    /// Most recent first.
    fn change_log(&self) -> Vec<ChangeLogEntry>;

    /// Records `snapshot` if it is INFO_EXCEEDED and its id is new.
    /// Returns whether anything was stored.
    fn add_episode_snapshot(&self, snapshot: &StatusResponse) -> bool;

    /// Most recent first.
    fn episode_snapshots(&self) -> Vec<EpisodeSnapshot>;

    fn find_episode_snapshot(&self, id: &str) -> Option<StatusResponse>;
}

#[derive(Debug, Default)]
struct Inner {
    state: Option<StatusState>,
    frames: Vec<HourlyFrame>,
    change_log: VecDeque<ChangeLogEntry>,
    episodes: VecDeque<EpisodeSnapshot>,
}

/// Process-memory store with bounded rings.
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    change_log_capacity: usize,
    episode_capacity: usize,
}

impl MemoryStore {
    pub fn new(change_log_capacity: usize, episode_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            change_log_capacity,
            episode_capacity,
        }
    }
}

impl StatusStore for MemoryStore {
    fn initialize(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.write();
        if inner.state.is_none() {
            inner.state = Some(StatusState::compliant(now, 0));
            tracing::debug!("Initialized default COMPLIANT state");
        }
    }

    fn state(&self) -> Option<StatusState> {
        self.inner.read().state.clone()
    }

    fn compare_and_set_state(
        &self,
        expected: Option<&StatusState>,
        next: StatusState,
        frames: Vec<HourlyFrame>,
        change: Option<ChangeLogEntry>,
    ) -> Result<(), StoreError> {
        // ---
        let mut inner = self.inner.write();
        if inner.state.as_ref() != expected {
            return Err(StoreError::Conflict);
        }

        if let Some(entry) = change {
            inner.change_log.push_front(entry);
            inner.change_log.truncate(self.change_log_capacity);
        }
        inner.state = Some(next);
        inner.frames = frames;
        Ok(())
    }

    fn frames(&self) -> Vec<HourlyFrame> {
        self.inner.read().frames.clone()
    }

    fn set_frames(&self, frames: Vec<HourlyFrame>) {
        self.inner.write().frames = frames;
    }

    fn snapshot(&self) -> (Option<StatusState>, Vec<HourlyFrame>) {
        let inner = self.inner.read();
        (inner.state.clone(), inner.frames.clone())
    }

    fn change_log(&self) -> Vec<ChangeLogEntry> {
        self.inner.read().change_log.iter().cloned().collect()
    }

    fn add_episode_snapshot(&self, snapshot: &StatusResponse) -> bool {
        // ---
        if snapshot.status != Status::InfoExceeded {
            return false;
        }

        let id = episode_id(snapshot.as_of_utc);
        let mut inner = self.inner.write();
        if inner.episodes.iter().any(|e| e.id == id) {
            return false;
        }

        tracing::debug!(episode_id = %id, "Recording episode snapshot");
        inner.episodes.push_front(EpisodeSnapshot {
            id,
            snapshot: snapshot.clone(),
        });
        inner.episodes.truncate(self.episode_capacity);
        true
    }

    fn episode_snapshots(&self) -> Vec<EpisodeSnapshot> {
        self.inner.read().episodes.iter().cloned().collect()
    }

    fn find_episode_snapshot(&self, id: &str) -> Option<StatusResponse> {
        self.inner
            .read()
            .episodes
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.snapshot.clone())
    }
}
