//! Ozone information-threshold monitor for the Madrid agglomeration (zone
//! `ES0014A`).
//!
//! Hourly O₃ frames come from a feed (or a synthetic generator), run through
//! a debounced status engine, and are published as a full status view, a
//! strict v1 JSON contract, a change log of status flips and a ring of
//! episode snapshots.
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): directory
//! modules expose their surface through a gateway `mod.rs`, and the types
//! routes need are re-exported here so they never reach into siblings.

pub mod config;
pub mod feed;
pub mod models;
pub mod monitor;
pub mod notice;
pub mod routes;
pub mod status;
pub mod store;
pub mod timefmt;

pub use config::Config;
pub use monitor::{IngestOutcome, Monitor, MonitorError};

// Re-exported for routes/*.rs, which only know their parent gateway.
pub use feed::Scenario;
pub use models::{ChangeLogEntry, EpisodeSnapshot, Status, StatusResponse};
pub use notice::{build_notice_content, NoticeContent};
pub use status::{to_contract, StatusError};
pub use store::{StatusStore, StoreError};
