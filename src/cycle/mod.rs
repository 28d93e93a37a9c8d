// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cycle detection from power samples.
//!
//! An appliance plugged into a monitored plug produces a noisy power-draw
//! stream. This module turns that stream into discrete cycle start/finish
//! events using hysteresis (separate start and end thresholds) combined
//! with dwell-time confirmation, and accounts the energy consumed while a
//! cycle runs.
//!
//! The detector is a pure state machine: it consumes [`PowerSample`]s
//! carrying caller-supplied timestamps and never reads the clock itself,
//! so behavior is fully deterministic under test.
//!
//! # Examples
//!
//! ```
//! use washr_lib::cycle::{CycleDetector, CycleEvent, PowerSample, Thresholds};
//!
//! let thresholds = Thresholds::new(90.0, 10.0, 5.0, 60.0).unwrap();
//! let mut detector = CycleDetector::new(thresholds);
//!
//! // Sustained draw above 90 W for more than 10 s confirms a start.
//! assert!(detector.apply(&PowerSample::new(120.0, 0.0)).is_none());
//! let event = detector.apply(&PowerSample::new(120.0, 11.0));
//! assert!(matches!(event, Some(CycleEvent::Started { .. })));
//! ```

mod calibration;
mod detector;
mod event;

pub use calibration::{ThresholdEstimator, ThresholdSuggestion};
pub use detector::{Boundary, CycleDetector, CyclePhase, PowerSample, Thresholds};
pub use event::{CycleEvent, CycleSummary, SamplePoint};
