//! Public notice content for an information-threshold episode.
//!
//! [`build_notice_content`] normalizes a [`StatusResponse`] into the fields a
//! printed notice shows; [`NoticeContent::render_text`] lays them out as
//! plain text. Works the same for the live status and for frozen episode
//! snapshots.

use serde::Serialize;

use crate::models::{Status, StatusResponse};
use crate::timefmt;

// ---

const AREA: &str = "Aglomeración de Madrid";
const KIND: &str = "Umbral de información O₃ (180 µg/m³, 1 h)";
const FORECAST: &str =
    "Se recomienda consultar las fuentes oficiales para información actualizada.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoticeContent {
    // ---
    pub area: &'static str,
    pub kind: &'static str,
    pub status: Status,
    pub episode_start_local: Option<String>,
    pub episode_start_utc: Option<String>,
    pub duration_hours: Option<i64>,
    pub max_1h_value: f64,
    pub max_1h_station: String,
    pub max_1h_local: String,
    pub max_1h_utc: String,
    pub max_8h: f64,
    pub why: Option<String>,
    pub forecast: &'static str,
}

pub fn build_notice_content(status: &StatusResponse) -> NoticeContent {
    // ---
    let start = status.episode_start.map(timefmt::format_with_utc);
    let max_at = timefmt::format_with_utc(status.max_1h.timestamp_utc);

    NoticeContent {
        area: AREA,
        kind: KIND,
        status: status.status,
        episode_start_local: start.as_ref().map(|s| s.local.clone()),
        episode_start_utc: start.map(|s| s.utc),
        duration_hours: status.duration_hours,
        max_1h_value: status.max_1h.value,
        max_1h_station: status.max_1h.station_name.clone(),
        max_1h_local: max_at.local,
        max_1h_utc: max_at.utc,
        max_8h: status.max_8h,
        why: status.why.clone(),
        forecast: FORECAST,
    }
}

impl NoticeContent {
    pub fn render_text(&self) -> String {
        // ---
        let mut lines = vec![
            "Umbral de Información O₃".to_string(),
            String::new(),
            format!("Área: {}", self.area),
            format!("Tipo: {}", self.kind),
            format!("Estado: {}", self.status),
        ];

        if let (Some(local), Some(utc)) = (&self.episode_start_local, &self.episode_start_utc) {
            lines.push(format!("Inicio: {} ({})", local, utc));
        }
        if let Some(hours) = self.duration_hours {
            lines.push(format!("Duración: {} h", hours));
        }
        lines.push(format!(
            "Máximo 1 h: {:.1} µg/m³ en {} a las {} ({})",
            self.max_1h_value, self.max_1h_station, self.max_1h_local, self.max_1h_utc
        ));
        lines.push(format!("Máximo media móvil 8 h: {:.2} µg/m³", self.max_8h));
        if let Some(why) = &self.why {
            lines.push(format!("Motivo: {}", why));
        }
        lines.push(String::new());
        lines.push(self.forecast.to_string());

        lines.join("\n") + "\n"
    }
}
