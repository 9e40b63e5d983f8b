//! Stable v1 JSON contract (`/madrid/status.json`).
//!
//! The key set is closed: [`parse_contract`] rejects both additions and
//! omissions at every level before decoding into the typed form, so anything
//! that gets past it is a guaranteed-valid [`StatusContractV1`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::CONTRACT_VERSION;
use crate::models::{Status, StatusResponse};

// ---

const CONTRACT_KEYS: [&str; 11] = [
    "version",
    "zone_code",
    "as_of_utc",
    "status",
    "why",
    "o3_max_1h_ugm3",
    "o3_max_8h_ugm3",
    "trigger_station",
    "data_age_minutes",
    "stations",
    "notice_pdf_url",
];
const TRIGGER_KEYS: [&str; 3] = ["id", "name", "ts_utc"];
const STATION_KEYS: [&str; 4] = ["id", "name", "value", "timestamp_utc"];

#[derive(Debug, Error, PartialEq)]
pub enum ContractError {
    #[error("{context} must be a JSON object")]
    NotAnObject { context: String },

    #[error("{context} contains unexpected keys: {}", keys.join(", "))]
    UnexpectedKeys { context: String, keys: Vec<String> },

    #[error("{context} is missing keys: {}", keys.join(", "))]
    MissingKeys { context: String, keys: Vec<String> },

    #[error("{field} {reason}")]
    InvalidField { field: String, reason: &'static str },

    #[error("contract decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatusContractV1 {
    // ---
    pub version: String,
    pub zone_code: String,
    pub as_of_utc: DateTime<Utc>,
    pub status: Status,
    pub why: Option<String>,
    pub o3_max_1h_ugm3: Option<f64>,
    pub o3_max_8h_ugm3: Option<f64>,
    pub trigger_station: Option<ContractTrigger>,
    pub data_age_minutes: i64,
    pub stations: Vec<ContractStation>,
    pub notice_pdf_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractTrigger {
    pub id: String,
    pub name: String,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractStation {
    pub id: String,
    pub name: String,
    pub value: f64,
    pub timestamp_utc: DateTime<Utc>,
}

/// Projects the full response onto the v1 contract.
pub fn to_contract(resp: &StatusResponse) -> StatusContractV1 {
    // ---
    StatusContractV1 {
        version: resp.version.clone(),
        zone_code: resp.zone_code.clone(),
        as_of_utc: resp.as_of_utc,
        status: resp.status,
        why: resp.why.clone(),
        o3_max_1h_ugm3: Some(resp.max_1h.value),
        o3_max_8h_ugm3: Some(resp.max_8h),
        trigger_station: resp.trigger_station.as_ref().map(|t| ContractTrigger {
            id: t.id.clone(),
            name: t.name.clone(),
            ts_utc: t.ts_utc,
        }),
        data_age_minutes: resp.data_age_minutes,
        stations: resp
            .stations
            .iter()
            .map(|s| ContractStation {
                id: s.id.clone(),
                name: s.name.clone(),
                value: s.value,
                timestamp_utc: s.timestamp_utc,
            })
            .collect(),
        notice_pdf_url: resp.notice_pdf_url.clone(),
    }
}

/// Validates an untyped JSON document against the v1 contract.
pub fn parse_contract(value: &Value) -> Result<StatusContractV1, ContractError> {
    // ---
    let root = as_object(value, "status json contract")?;
    ensure_keys_match(root, &CONTRACT_KEYS, "status json contract")?;

    if let Some(trigger) = root.get("trigger_station").filter(|t| !t.is_null()) {
        let obj = as_object(trigger, "trigger_station")?;
        ensure_keys_match(obj, &TRIGGER_KEYS, "trigger_station")?;
    }

    let stations = root
        .get("stations")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("stations", "must be an array"))?;
    for (i, station) in stations.iter().enumerate() {
        let context = format!("stations[{}]", i);
        let obj = as_object(station, &context)?;
        ensure_keys_match(obj, &STATION_KEYS, &context)?;
    }

    let contract: StatusContractV1 =
        serde_json::from_value(value.clone()).map_err(|e| ContractError::Decode(e.to_string()))?;

    if contract.version != CONTRACT_VERSION {
        return Err(invalid("version", "must be \"1\""));
    }
    if contract.zone_code.is_empty() {
        return Err(invalid("zone_code", "must be a non-empty string"));
    }
    if contract.notice_pdf_url.is_empty() {
        return Err(invalid("notice_pdf_url", "must be a non-empty string"));
    }
    if contract.stations.is_empty() {
        return Err(invalid("stations", "must not be empty"));
    }
    if let Some(t) = &contract.trigger_station {
        if t.id.is_empty() || t.name.is_empty() {
            return Err(invalid("trigger_station", "id and name must be non-empty"));
        }
    }
    for (i, s) in contract.stations.iter().enumerate() {
        if s.id.is_empty() || s.name.is_empty() {
            return Err(invalid(&format!("stations[{}]", i), "id and name must be non-empty"));
        }
    }

    Ok(contract)
}

fn as_object<'a>(value: &'a Value, context: &str) -> Result<&'a Map<String, Value>, ContractError> {
    value.as_object().ok_or_else(|| ContractError::NotAnObject {
        context: context.to_string(),
    })
}

fn ensure_keys_match(
    obj: &Map<String, Value>,
    expected: &[&str],
    context: &str,
) -> Result<(), ContractError> {
    // ---
    let extra: Vec<String> = obj
        .keys()
        .filter(|k| !expected.contains(&k.as_str()))
        .cloned()
        .collect();
    if !extra.is_empty() {
        return Err(ContractError::UnexpectedKeys {
            context: context.to_string(),
            keys: extra,
        });
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|k| !obj.contains_key(**k))
        .map(|k| k.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ContractError::MissingKeys {
            context: context.to_string(),
            keys: missing,
        });
    }

    Ok(())
}

fn invalid(field: &str, reason: &'static str) -> ContractError {
    ContractError::InvalidField {
        field: field.to_string(),
        reason,
    }
}
