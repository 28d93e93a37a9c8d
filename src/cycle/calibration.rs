// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Threshold calibration from observed power readings.
//!
//! Picking start/end thresholds by hand requires knowing the appliance's
//! draw profile. The estimator watches a short window of live readings and
//! suggests thresholds from their distribution: start at two standard
//! deviations above the mean, end at one.

use std::collections::VecDeque;

/// Number of readings the estimator keeps.
const WINDOW_LEN: usize = 20;

/// Threshold values suggested by the estimator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdSuggestion {
    /// Suggested start threshold in watts.
    pub start_watts: f64,
    /// Suggested end threshold in watts.
    pub end_watts: f64,
}

/// Sliding-window threshold estimator.
///
/// # Examples
///
/// ```
/// use washr_lib::cycle::ThresholdEstimator;
///
/// let mut estimator = ThresholdEstimator::new();
/// for watts in [2.0, 3.0, 150.0, 148.0, 152.0, 2.0] {
///     estimator.record(watts);
/// }
/// let suggestion = estimator.suggest().unwrap();
/// assert!(suggestion.start_watts > suggestion.end_watts);
/// ```
#[derive(Debug, Default)]
pub struct ThresholdEstimator {
    window: VecDeque<f64>,
}

impl ThresholdEstimator {
    /// Creates an empty estimator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one power reading, evicting the oldest when the window is
    /// full.
    pub fn record(&mut self, watts: f64) {
        if self.window.len() == WINDOW_LEN {
            self.window.pop_front();
        }
        self.window.push_back(watts);
    }

    /// Number of readings currently in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Returns `true` when no readings have been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Suggests thresholds from the recorded readings.
    ///
    /// Returns `None` when fewer than two readings have been recorded or
    /// the readings show no spread (a flat line cannot separate start from
    /// end).
    #[must_use]
    pub fn suggest(&self) -> Option<ThresholdSuggestion> {
        if self.window.len() < 2 {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let count = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / count;
        let variance = self
            .window
            .iter()
            .map(|watts| (watts - mean).powi(2))
            .sum::<f64>()
            / count;
        let std_dev = variance.sqrt();

        if std_dev == 0.0 {
            return None;
        }

        let suggestion = ThresholdSuggestion {
            start_watts: mean + 2.0 * std_dev,
            end_watts: mean + std_dev,
        };

        tracing::debug!(
            start_watts = suggestion.start_watts,
            end_watts = suggestion.end_watts,
            samples = self.window.len(),
            "Calibrated threshold suggestion"
        );

        Some(suggestion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_readings_yield_none() {
        let mut estimator = ThresholdEstimator::new();
        assert!(estimator.suggest().is_none());

        estimator.record(100.0);
        assert!(estimator.suggest().is_none());
    }

    #[test]
    fn flat_readings_yield_none() {
        let mut estimator = ThresholdEstimator::new();
        for _ in 0..10 {
            estimator.record(42.0);
        }
        assert!(estimator.suggest().is_none());
    }

    #[test]
    fn bimodal_readings_separate_start_from_end() {
        let mut estimator = ThresholdEstimator::new();
        for watts in [2.0, 3.0, 2.5, 150.0, 152.0, 149.0, 2.0, 3.0] {
            estimator.record(watts);
        }

        let suggestion = estimator.suggest().unwrap();
        assert!(suggestion.start_watts > suggestion.end_watts);
        assert!(suggestion.end_watts > 0.0);
    }

    #[test]
    fn window_evicts_oldest_readings() {
        let mut estimator = ThresholdEstimator::new();
        for _ in 0..WINDOW_LEN {
            estimator.record(1000.0);
        }
        // Push the window full of low readings; the old spike must age out.
        for _ in 0..WINDOW_LEN {
            estimator.record(2.0);
        }

        assert_eq!(estimator.len(), WINDOW_LEN);
        // All-equal window again: no spread, no suggestion.
        assert!(estimator.suggest().is_none());
    }

    #[test]
    fn suggestion_tracks_mean_and_spread() {
        let mut estimator = ThresholdEstimator::new();
        estimator.record(0.0);
        estimator.record(10.0);

        // mean 5, population std dev 5.
        let suggestion = estimator.suggest().unwrap();
        assert!((suggestion.start_watts - 15.0).abs() < 1e-9);
        assert!((suggestion.end_watts - 10.0).abs() < 1e-9);
    }
}
