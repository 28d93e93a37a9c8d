// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Power status sources and DPS payload handling.
//!
//! A plug reports its state as a DPS map ("data-point set"): property ids
//! mapped to values, e.g. `{"1": true, "19": 847}`. Which property carries
//! the power reading differs per device model, so the id is configuration
//! (`power_value_id`), not a constant.
//!
//! The [`StatusSource`] trait is the seam between the tracker loop and
//! whatever transport delivers status payloads: a local encrypted session
//! client (external collaborator), or the bundled MQTT feed behind the
//! `mqtt` feature.

#[cfg(feature = "mqtt")]
mod mqtt_feed;

#[cfg(feature = "mqtt")]
pub use mqtt_feed::MqttStatusFeed;

use std::collections::HashMap;
use std::future::Future;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::error::{ParseError, Result};

/// A device status snapshot: the DPS property map plus the raw payload it
/// was parsed from (kept for duplicate suppression).
#[derive(Debug, Clone, PartialEq)]
pub struct DpsStatus {
    /// Property id to value map.
    pub dps: HashMap<String, serde_json::Value>,
    /// The raw payload the map was parsed from.
    pub raw: String,
}

#[derive(Debug, Deserialize)]
struct StatusWire {
    dps: HashMap<String, serde_json::Value>,
}

impl DpsStatus {
    /// Parses a raw status payload.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the payload is not JSON or lacks a `dps`
    /// object.
    pub fn parse(raw: &str) -> std::result::Result<Self, ParseError> {
        let wire: StatusWire = serde_json::from_str(raw)?;
        Ok(Self {
            dps: wire.dps,
            raw: raw.to_string(),
        })
    }

    /// Returns a DPS value as a float, accepting integer or float encodings.
    #[must_use]
    pub fn value(&self, id: &str) -> Option<f64> {
        self.dps.get(id).and_then(serde_json::Value::as_f64)
    }
}

/// Source of status snapshots for one device.
///
/// A fetch that fails or times out is a failure for that fetch only; the
/// tracker logs it and keeps polling.
///
/// The returned future must be `Send` so trackers can run on the
/// multi-threaded runtime.
pub trait StatusSource {
    /// Fetches the current device status.
    ///
    /// # Errors
    ///
    /// Returns an error when the device cannot be reached or the payload
    /// cannot be parsed.
    fn get_status(&self) -> impl Future<Output = Result<DpsStatus>> + Send;
}

/// The DPS property ids a tracker reads.
#[derive(Debug, Clone, Default)]
pub struct PowerIds {
    /// Property carrying the power reading (deciwatt integer).
    pub power: String,
    /// Optional property carrying voltage (decivolt integer).
    pub voltage: Option<String>,
    /// Optional property carrying current (milliampere integer).
    pub current: Option<String>,
}

/// A power reading extracted from a status snapshot.
///
/// `watts: None` means the property was absent from this read (a missed
/// sample), distinct from `Some(0.0)`, an instrumented but idle appliance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    /// Power draw in watts, when present.
    pub watts: Option<f64>,
    /// Voltage in volts, when the device reports it.
    pub voltage: Option<f64>,
    /// Current in milliamperes, when the device reports it.
    pub current_ma: Option<f64>,
}

impl PowerReading {
    /// Extracts a reading from a status snapshot.
    ///
    /// Device firmware reports power in tenths of a watt and voltage in
    /// tenths of a volt; both are scaled here.
    #[must_use]
    pub fn from_dps(status: &DpsStatus, ids: &PowerIds) -> Self {
        let watts = status.value(&ids.power).map(|raw| raw / 10.0);
        let voltage = ids
            .voltage
            .as_deref()
            .and_then(|id| status.value(id))
            .map(|raw| raw / 10.0);
        let current_ma = ids.current.as_deref().and_then(|id| status.value(id));

        Self {
            watts,
            voltage,
            current_ma,
        }
    }
}

/// Suppresses re-extraction for byte-identical status payloads.
///
/// Plugs frequently re-send an unchanged status; when the raw payload
/// matches the previous one, the previously extracted reading is returned
/// as-is. The value is the same either way, so dwell timing in the state
/// machine is unaffected.
#[derive(Debug, Default)]
pub struct StatusCache {
    last: Mutex<Option<(String, PowerReading)>>,
}

impl StatusCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts a reading, reusing the previous one for duplicate payloads.
    pub fn extract(&self, status: &DpsStatus, ids: &PowerIds) -> PowerReading {
        let mut last = self.last.lock();

        if let Some((raw, reading)) = last.as_ref()
            && *raw == status.raw
        {
            tracing::trace!("Status payload unchanged, reusing last reading");
            return *reading;
        }

        let reading = PowerReading::from_dps(status, ids);
        *last = Some((status.raw.clone(), reading));
        reading
    }
}
