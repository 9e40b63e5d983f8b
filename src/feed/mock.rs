//! Synthetic frames for demos, tests and feed outages.
//!
//! Four Madrid stations with values drawn from [120, 180), so the baseline
//! never reaches the information threshold on its own. Frames end at the
//! latest complete hour.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FeedError, FrameSource};
use crate::models::{HourlyFrame, StationReading};
use crate::status::floor_hour;

// ---

const STATIONS: [(&str, &str); 4] = [
    ("ES0014A_001", "Escuelas Aguirre"),
    ("ES0014A_002", "Villaverde"),
    ("ES0014A_003", "Casa de Campo"),
    ("ES0014A_004", "Barajas"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Baseline,
    /// First station at 182 then 185 over the last two hours.
    Exceeded,
    /// Every station at 160 then 150 over the last two hours.
    Recovery,
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baseline" => Ok(Scenario::Baseline),
            "exceeded" => Ok(Scenario::Exceeded),
            "recovery" => Ok(Scenario::Recovery),
            other => Err(format!("unknown demo scenario '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MockFeed {
    scenario: Scenario,
    seed: Option<u64>,
}

impl MockFeed {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            seed: None,
        }
    }

    /// Deterministic values, for tests.
    pub fn with_seed(scenario: Scenario, seed: u64) -> Self {
        Self {
            scenario,
            seed: Some(seed),
        }
    }

    pub fn generate(&self, hours: u32, now: DateTime<Utc>) -> Vec<HourlyFrame> {
        // ---
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let end = floor_hour(now) - Duration::hours(1);
        let hours = i64::from(hours);

        let mut frames: Vec<HourlyFrame> = (0..hours)
            .map(|i| {
                let hour_utc = end - Duration::hours(hours - 1 - i);
                let stations = STATIONS
                    .iter()
                    .map(|(id, name)| StationReading {
                        station_id: id.to_string(),
                        station_name: name.to_string(),
                        value: baseline_value(&mut rng),
                        timestamp_utc: hour_utc,
                    })
                    .collect();
                HourlyFrame { hour_utc, stations }
            })
            .collect();

        match self.scenario {
            Scenario::Baseline => {}
            Scenario::Exceeded => set_tail(&mut frames, |i, s| (i == 0).then_some(s), 182.0, 185.0),
            Scenario::Recovery => set_tail(&mut frames, |_, s| Some(s), 160.0, 150.0),
        }

        frames
    }
}

#[async_trait]
impl FrameSource for MockFeed {
    async fn fetch_hourly_frames(
        &self,
        window_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<HourlyFrame>, FeedError> {
        Ok(self.generate(window_hours, now))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

fn baseline_value(rng: &mut StdRng) -> f64 {
    let v: f64 = rng.gen_range(120.0..180.0);
    ((v * 10.0).round() / 10.0).min(179.9)
}

/// Overwrites the last two frames: `previous` on the second to last,
/// `latest` on the last, for every station `pick` selects.
fn set_tail<F>(frames: &mut [HourlyFrame], pick: F, previous: f64, latest: f64)
where
    F: Fn(usize, f64) -> Option<f64>,
{
    let n = frames.len();
    for (offset, value) in [(2, previous), (1, latest)] {
        let Some(frame) = n.checked_sub(offset).and_then(|i| frames.get_mut(i)) else {
            continue;
        };
        for (i, station) in frame.stations.iter_mut().enumerate() {
            if let Some(v) = pick(i, value) {
                station.value = v;
            }
        }
    }
}
