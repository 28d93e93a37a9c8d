// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Optional per-cycle log artifact.
//!
//! When a tracker is configured with an export directory, every completed
//! cycle is written as one JSON file containing the cycle statistics and
//! the recorded sample series. The artifact is a side effect for charting
//! and bookkeeping; a write failure is logged by the caller and never
//! affects tracking.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cycle::{CycleSummary, SamplePoint};
use crate::error::{ProtocolError, Result};

/// On-disk layout of a cycle log file.
#[derive(Debug, Serialize)]
struct CycleLogFile<'a> {
    device_id: &'a str,
    device_name: &'a str,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    duration_sec: f64,
    min_power: f64,
    max_power: f64,
    avg_power: f64,
    total_kwh: f64,
    samples: &'a [SamplePoint],
}

/// Writes one completed cycle to `<dir>/<device_id>-<start_epoch>.json`.
///
/// Creates the directory when missing. Returns the path of the written
/// file.
///
/// # Errors
///
/// Returns an error when the directory cannot be created or the file
/// cannot be written.
pub fn write_cycle_log(
    dir: &Path,
    device_id: &str,
    device_name: &str,
    summary: &CycleSummary,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).map_err(ProtocolError::Io)?;

    let log = CycleLogFile {
        device_id,
        device_name,
        start_time: epoch_to_datetime(summary.started_at_epoch),
        end_time: epoch_to_datetime(summary.finished_at_epoch),
        duration_sec: summary.duration_secs,
        min_power: summary.min_watts,
        max_power: summary.max_watts,
        avg_power: summary.avg_watts,
        total_kwh: summary.total_kwh,
        samples: &summary.samples,
    };

    #[allow(clippy::cast_possible_truncation)]
    let path = dir.join(format!("{device_id}-{}.json", summary.started_at_epoch as i64));

    let body = serde_json::to_string_pretty(&log).map_err(crate::error::ParseError::Json)?;
    std::fs::write(&path, body).map_err(ProtocolError::Io)?;

    tracing::info!(path = %path.display(), "Wrote cycle log");
    Ok(path)
}

/// Converts fractional epoch seconds to a UTC timestamp.
fn epoch_to_datetime(epoch_secs: f64) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation)]
    DateTime::from_timestamp_millis((epoch_secs * 1000.0) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> CycleSummary {
        CycleSummary {
            started_at_epoch: 1_700_000_000.0,
            finished_at_epoch: 1_700_003_600.0,
            duration_secs: 3600.0,
            total_kwh: 0.5,
            avg_watts: 500.0,
            min_watts: 2.0,
            max_watts: 2100.0,
            sample_count: 3600,
            samples: vec![
                SamplePoint {
                    epoch_secs: 1_700_000_000.0,
                    watts: 500.0,
                },
                SamplePoint {
                    epoch_secs: 1_700_000_001.0,
                    watts: 520.0,
                },
            ],
        }
    }

    fn scratch_dir(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("washr-export-{label}-{}", std::process::id()))
    }

    #[test]
    fn writes_parseable_log_file() {
        let dir = scratch_dir("basic");
        let path = write_cycle_log(&dir, "bf01", "Washer", &summary()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();

        assert_eq!(parsed["device_id"], "bf01");
        assert_eq!(parsed["device_name"], "Washer");
        assert_eq!(parsed["total_kwh"], 0.5);
        assert_eq!(parsed["samples"].as_array().unwrap().len(), 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn file_name_carries_device_and_start_time() {
        let dir = scratch_dir("name");
        let path = write_cycle_log(&dir, "bf02", "Dryer", &summary()).unwrap();

        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "bf02-1700000000.json"
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn creates_missing_directories() {
        let dir = scratch_dir("nested").join("deep");
        assert!(!dir.exists());

        write_cycle_log(&dir, "bf03", "Washer", &summary()).unwrap();
        assert!(dir.exists());

        std::fs::remove_dir_all(dir.parent().unwrap()).unwrap();
    }
}
