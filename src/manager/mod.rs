// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device directory and per-device laundry trackers.
//!
//! The [`DeviceDirectory`] combines LAN discovery with the cloud registry
//! and caches the last successful reconciliation. A [`LaundryTracker`] is
//! one polling loop per configured appliance: it feeds power readings into
//! a [`CycleDetector`](crate::cycle::CycleDetector) and pushes lifecycle
//! notifications and typed events outward.
//!
//! Trackers are fully independent: a configuration or network failure on
//! one device never affects another.

mod directory;
mod tracker;
mod tracker_config;

pub use directory::{DeviceDirectory, DeviceList, RetryPolicy};
pub use tracker::{LaundryTracker, TrackerEvent, TrackerHandle};
pub use tracker_config::TrackerConfig;
