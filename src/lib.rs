// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `WashR` Lib - A Rust library to watch laundry appliances through Tuya
//! smart plugs.
//!
//! The library discovers power plugs on the local network, reconciles them
//! against the Tuya cloud registry to obtain key material and display
//! names, and monitors each plug's power draw to detect when the attached
//! washer or dryer starts and finishes a cycle. Detected cycles carry
//! energy accounting (total kWh, min/max/average power) and drive
//! plain-text notifications plus typed events for host integrations.
//!
//! # Supported Features
//!
//! - **LAN discovery**: encrypted UDP broadcast listener on both protocol
//!   generations, with per-pass duplicate suppression
//! - **Cloud reconciliation**: merge LAN sightings with the account's
//!   registered plugs to obtain local keys
//! - **Cycle detection**: hysteresis thresholds with dwell-time
//!   confirmation, adaptive polling, energy integration
//! - **Calibration**: threshold suggestions from observed draw
//! - **Cycle export**: optional per-cycle JSON artifacts
//!
//! # Quick Start
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use washr_lib::cycle::Thresholds;
//! use washr_lib::discovery::DiscoveryOptions;
//! use washr_lib::manager::{DeviceDirectory, LaundryTracker, TrackerConfig};
//! use washr_lib::notify::NullSink;
//! use washr_lib::registry::HttpRegistryConfig;
//! use washr_lib::status::MqttStatusFeed;
//!
//! #[tokio::main]
//! async fn main() -> washr_lib::Result<()> {
//!     // Find the plug on the LAN and in the cloud registry.
//!     let registry = HttpRegistryConfig::new("https://openapi.tuyaeu.com")
//!         .with_access_token("token")
//!         .into_client()?;
//!     let directory = DeviceDirectory::new(registry);
//!     let plug = directory.find_device("bf0123456789").await?;
//!
//!     // Track cycles: start above 90 W for 10 s, end below 5 W for 60 s.
//!     let thresholds = Thresholds::new(90.0, 10.0, 5.0, 60.0)?;
//!     let config = TrackerConfig::new(&plug.id, thresholds)
//!         .with_name(&plug.name)
//!         .with_local_key(&plug.local_key)
//!         .with_ip_address(&plug.ip)
//!         .with_end_message("The washer is done!");
//!
//!     let source =
//!         MqttStatusFeed::connect("mqtt://192.168.1.50:1883", "tuya/bf0123456789/status").await?;
//!     let (events_tx, mut events_rx) = mpsc::channel(16);
//!     let handle = LaundryTracker::spawn(config, source, NullSink, events_tx)?;
//!
//!     while let Some(event) = events_rx.recv().await {
//!         println!("{event:?}");
//!     }
//!     handle.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cycle;
pub mod discovery;
pub mod error;
pub mod export;
pub mod manager;
pub mod notify;
pub mod registry;
pub mod status;

pub use cycle::{
    Boundary, CycleDetector, CycleEvent, CyclePhase, CycleSummary, PowerSample, Thresholds,
};
pub use discovery::{DiscoveryOptions, LocalDevice, discover};
pub use error::{ConfigError, Error, ParseError, ProtocolError, Result};
pub use manager::{DeviceDirectory, LaundryTracker, TrackerConfig, TrackerEvent, TrackerHandle};
pub use notify::{NotificationSink, NullSink};
pub use registry::{CloudDevice, DeviceRegistry, PlugDevice, reconcile};
pub use status::{DpsStatus, PowerReading, StatusSource};
