//! Status computation gateway.
//!
//! Follows the Explicit Module Boundary Pattern (EMBP): siblings inside this
//! directory hold the engine, the response builder, the v1 contract and the
//! change-log/episode recording policy; this file owns the constants and the
//! re-exports the rest of the crate is allowed to see.

mod contract;
mod engine;
mod recording;
mod response;

pub use contract::{
    parse_contract, to_contract, ContractError, ContractStation, ContractTrigger, StatusContractV1,
};
pub use engine::{
    compute_status, evaluate, latest_complete_frame, Evaluation, FreezeReason, Outcome,
};
pub use recording::{change_log_entry, episode_id};
pub use response::{build_status_response, calculate_max_8h_mean, StatusError};

pub(crate) use engine::{data_age_minutes, floor_hour, highest_reading};

// ---

/// Information threshold for O₃, 1-hour mean, µg/m³. Inclusive.
pub const INFO_THRESHOLD_UGM3: f64 = 180.0;

/// Frames older than this (minutes since the top of the hour) freeze the state.
pub const STALE_DATA_THRESHOLD_MINUTES: i64 = 90;

/// Consecutive hourly checks required before the public status flips.
pub const DEBOUNCE_COUNT: u32 = 2;

/// Fewer stations than this in the latest complete hour is reduced coverage.
pub const MIN_STATIONS: usize = 2;

/// Rolling window for the 8-hour mean.
pub const ROLLING_WINDOW_HOURS: usize = 8;

/// Data age shown before any frame has ever been seen.
pub const UNKNOWN_DATA_AGE_MINUTES: i64 = 999;

/// Data age reported for demo runs that bypass debounce.
pub const DEMO_DATA_AGE_CAP_MINUTES: i64 = 30;

/// Air-quality zone code of the Madrid agglomeration.
pub const ZONE_CODE: &str = "ES0014A";

/// Version tag of the public JSON contract.
pub const CONTRACT_VERSION: &str = "1";

pub const NOTICE_PDF_URL: &str = "/madrid/latest.pdf";
