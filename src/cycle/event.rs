// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Lifecycle events emitted by the cycle detector.

use serde::Serialize;

/// Watt-seconds per kilowatt-hour.
pub(crate) const WS_PER_KWH: f64 = 3_600_000.0;

/// A single recorded power sample, kept for the optional cycle export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplePoint {
    /// Sample timestamp, seconds since the Unix epoch.
    pub epoch_secs: f64,
    /// Power draw in watts.
    pub watts: f64,
}

/// Statistics for one completed cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// When the cycle was confirmed started, seconds since the Unix epoch.
    pub started_at_epoch: f64,
    /// When the cycle was confirmed finished, seconds since the Unix epoch.
    pub finished_at_epoch: f64,
    /// Cycle duration in seconds.
    pub duration_secs: f64,
    /// Total energy consumed over the cycle in kWh.
    pub total_kwh: f64,
    /// Arithmetic mean of the observed power samples in watts.
    pub avg_watts: f64,
    /// Lowest observed power sample in watts.
    pub min_watts: f64,
    /// Highest observed power sample in watts.
    pub max_watts: f64,
    /// Number of valid samples observed during the cycle.
    pub sample_count: u64,
    /// Recorded samples; empty unless sample recording is enabled.
    pub samples: Vec<SamplePoint>,
}

/// An event produced by [`CycleDetector::apply`](super::CycleDetector::apply).
#[derive(Debug, Clone, PartialEq)]
pub enum CycleEvent {
    /// A cycle start was confirmed (dwell time satisfied).
    Started {
        /// Confirmation timestamp, seconds since the Unix epoch.
        at_epoch: f64,
    },

    /// A cycle end was confirmed; carries the full cycle statistics.
    Finished(CycleSummary),
}

impl CycleEvent {
    /// Returns `true` for a start confirmation.
    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }

    /// Returns the summary of a finished cycle, if this is one.
    #[must_use]
    pub fn summary(&self) -> Option<&CycleSummary> {
        match self {
            Self::Finished(summary) => Some(summary),
            Self::Started { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_accessors() {
        let started = CycleEvent::Started { at_epoch: 1.0 };
        assert!(started.is_started());
        assert!(started.summary().is_none());

        let finished = CycleEvent::Finished(CycleSummary {
            started_at_epoch: 0.0,
            finished_at_epoch: 10.0,
            duration_secs: 10.0,
            total_kwh: 0.001,
            avg_watts: 360.0,
            min_watts: 0.0,
            max_watts: 400.0,
            sample_count: 10,
            samples: Vec::new(),
        });
        assert!(!finished.is_started());
        assert_eq!(finished.summary().unwrap().sample_count, 10);
    }

    #[test]
    fn summary_serializes_for_export() {
        let summary = CycleSummary {
            started_at_epoch: 100.0,
            finished_at_epoch: 200.0,
            duration_secs: 100.0,
            total_kwh: 0.05,
            avg_watts: 1800.0,
            min_watts: 2.0,
            max_watts: 2200.0,
            sample_count: 42,
            samples: vec![SamplePoint {
                epoch_secs: 100.0,
                watts: 1800.0,
            }],
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"total_kwh\":0.05"));
        assert!(json.contains("\"watts\":1800.0"));
    }
}
