// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device tracker configuration.

use std::path::PathBuf;

use crate::cycle::Thresholds;
use crate::error::ConfigError;
use crate::status::PowerIds;

/// Configuration for one tracked appliance.
///
/// A configuration problem is fatal to this device's tracker at
/// construction time and to nothing else.
///
/// # Examples
///
/// ```
/// use washr_lib::cycle::Thresholds;
/// use washr_lib::manager::TrackerConfig;
///
/// let thresholds = Thresholds::new(90.0, 10.0, 5.0, 60.0).unwrap();
/// let config = TrackerConfig::new("bf0123456789", thresholds)
///     .with_name("Washer")
///     .with_local_key("a1b2c3d4e5f60708")
///     .with_ip_address("192.168.1.40")
///     .with_power_value_id("19")
///     .with_end_message("The washer is done!");
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Device identifier (`gwId`).
    pub device_id: String,
    /// Display name used in logs and messages.
    pub name: String,
    /// Symmetric key for the local protocol session.
    pub local_key: String,
    /// LAN address of the plug.
    pub ip_address: String,
    /// DPS property carrying the power reading.
    pub power_value_id: String,
    /// Optional DPS property carrying voltage, read for logging.
    pub voltage_value_id: Option<String>,
    /// Optional DPS property carrying current, read for logging.
    pub current_value_id: Option<String>,
    /// Hysteresis thresholds and dwell durations.
    pub thresholds: Thresholds,
    /// Message sent when a cycle start is confirmed.
    pub start_message: Option<String>,
    /// Message sent when a cycle end is confirmed.
    pub end_message: Option<String>,
    /// Whether the tracker reports indicator on/off events for an exposed
    /// automation switch.
    pub expose_state_switch: bool,
    /// Directory for per-cycle log files; export disabled when `None`.
    pub export_dir: Option<PathBuf>,
}

impl TrackerConfig {
    /// Default power property for plugs that report deciwatts on DPS 19.
    pub const DEFAULT_POWER_VALUE_ID: &'static str = "19";

    /// Creates a configuration with the given identity and thresholds.
    #[must_use]
    pub fn new(device_id: impl Into<String>, thresholds: Thresholds) -> Self {
        let device_id = device_id.into();
        Self {
            name: device_id.clone(),
            device_id,
            local_key: String::new(),
            ip_address: String::new(),
            power_value_id: Self::DEFAULT_POWER_VALUE_ID.to_string(),
            voltage_value_id: None,
            current_value_id: None,
            thresholds,
            start_message: None,
            end_message: None,
            expose_state_switch: false,
            export_dir: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the local protocol key.
    #[must_use]
    pub fn with_local_key(mut self, key: impl Into<String>) -> Self {
        self.local_key = key.into();
        self
    }

    /// Sets the LAN address.
    #[must_use]
    pub fn with_ip_address(mut self, ip: impl Into<String>) -> Self {
        self.ip_address = ip.into();
        self
    }

    /// Sets the DPS property carrying the power reading.
    #[must_use]
    pub fn with_power_value_id(mut self, id: impl Into<String>) -> Self {
        self.power_value_id = id.into();
        self
    }

    /// Sets the DPS property carrying voltage.
    #[must_use]
    pub fn with_voltage_value_id(mut self, id: impl Into<String>) -> Self {
        self.voltage_value_id = Some(id.into());
        self
    }

    /// Sets the DPS property carrying current.
    #[must_use]
    pub fn with_current_value_id(mut self, id: impl Into<String>) -> Self {
        self.current_value_id = Some(id.into());
        self
    }

    /// Sets the start notification message.
    #[must_use]
    pub fn with_start_message(mut self, message: impl Into<String>) -> Self {
        self.start_message = Some(message.into());
        self
    }

    /// Sets the end notification message.
    #[must_use]
    pub fn with_end_message(mut self, message: impl Into<String>) -> Self {
        self.end_message = Some(message.into());
        self
    }

    /// Enables indicator events for an exposed automation switch.
    #[must_use]
    pub fn with_state_switch(mut self) -> Self {
        self.expose_state_switch = true;
        self
    }

    /// Enables per-cycle log export into `dir`.
    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = Some(dir.into());
        self
    }

    /// Validates that the device is addressable.
    ///
    /// Threshold ordering is already enforced by
    /// [`Thresholds::new`](crate::cycle::Thresholds::new); this checks the
    /// identity fields a tracker cannot run without.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` for an empty id, key, address
    /// or power property.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::MissingField("device_id"));
        }
        if self.local_key.is_empty() {
            return Err(ConfigError::MissingField("local_key"));
        }
        if self.ip_address.is_empty() {
            return Err(ConfigError::MissingField("ip_address"));
        }
        if self.power_value_id.is_empty() {
            return Err(ConfigError::MissingField("power_value_id"));
        }
        Ok(())
    }

    /// Returns the DPS property ids this tracker reads.
    #[must_use]
    pub fn power_ids(&self) -> PowerIds {
        PowerIds {
            power: self.power_value_id.clone(),
            voltage: self.voltage_value_id.clone(),
            current: self.current_value_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::new(90.0, 10.0, 5.0, 60.0).unwrap()
    }

    fn complete() -> TrackerConfig {
        TrackerConfig::new("dev1", thresholds())
            .with_local_key("key")
            .with_ip_address("10.0.0.2")
    }

    #[test]
    fn complete_config_validates() {
        assert!(complete().validate().is_ok());
    }

    #[test]
    fn name_defaults_to_device_id() {
        let config = TrackerConfig::new("dev1", thresholds());
        assert_eq!(config.name, "dev1");
    }

    #[test]
    fn missing_key_is_rejected() {
        let config = TrackerConfig::new("dev1", thresholds()).with_ip_address("10.0.0.2");
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField("local_key"))
        );
    }

    #[test]
    fn missing_ip_is_rejected() {
        let config = TrackerConfig::new("dev1", thresholds()).with_local_key("key");
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField("ip_address"))
        );
    }

    #[test]
    fn empty_power_id_is_rejected() {
        let config = complete().with_power_value_id("");
        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingField("power_value_id"))
        );
    }

    #[test]
    fn power_ids_carry_optional_properties() {
        let config = complete()
            .with_power_value_id("5")
            .with_voltage_value_id("6")
            .with_current_value_id("4");

        let ids = config.power_ids();
        assert_eq!(ids.power, "5");
        assert_eq!(ids.voltage.as_deref(), Some("6"));
        assert_eq!(ids.current.as_deref(), Some("4"));
    }
}
