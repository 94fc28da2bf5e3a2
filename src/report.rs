//! JSON export of check reports

use crate::keyboard::Timestamp;
use crate::queue::CheckReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One key's scored state, with times in seconds on the monotonic clock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRecord {
    pub press_count: u32,
    pub release_count: u32,
    pub first_press: Option<f64>,
    pub last_press: Option<f64>,
    pub first_release: Option<f64>,
    pub last_release: Option<f64>,
}

/// Serializable form of a [`CheckReport`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    /// Wall-clock generation time (RFC 3339)
    pub generated_at: String,
    /// Device index
    pub device: usize,
    /// Any key pressed since the previous check
    pub pressed: bool,
    pub overflowed: bool,
    pub dropped: u64,
    /// Keyed by key code
    pub keys: BTreeMap<u16, KeyRecord>,
}

fn secs(t: Option<Timestamp>) -> Option<f64> {
    t.map(|t| t.as_secs_f64())
}

impl From<&CheckReport> for CheckRecord {
    fn from(report: &CheckReport) -> Self {
        let now: DateTime<Utc> = Utc::now();
        let keys = report
            .keys
            .iter()
            .map(|(code, state)| {
                (
                    code.as_u16(),
                    KeyRecord {
                        press_count: state.press_count,
                        release_count: state.release_count,
                        first_press: secs(state.first_press_time),
                        last_press: secs(state.last_press_time),
                        first_release: secs(state.first_release_time),
                        last_release: secs(state.last_release_time),
                    },
                )
            })
            .collect();

        Self {
            generated_at: now.to_rfc3339(),
            device: report.device.index(),
            pressed: report.pressed(),
            overflowed: report.overflowed,
            dropped: report.dropped,
            keys,
        }
    }
}

impl CheckRecord {
    /// Single-line JSON, suitable for streaming one record per line
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Export record to a pretty-printed JSON file
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
