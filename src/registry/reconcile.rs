// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciliation of LAN discovery results with cloud registry entries.

use crate::discovery::LocalDevice;

use super::CloudDevice;

/// A fully addressable plug: LAN address and protocol version from
/// discovery, key material and display metadata from the cloud registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlugDevice {
    /// Device identifier shared by both sources.
    pub id: String,
    /// LAN address from the discovery pass.
    pub ip: String,
    /// Local protocol version from the discovery pass.
    pub version: String,
    /// Display name from the cloud registry.
    pub name: String,
    /// Symmetric key for the local protocol session.
    pub local_key: String,
    /// Device category code.
    pub category: String,
}

/// Merges local discovery results with cloud registry entries by device id.
///
/// Pure function: no I/O, deterministic, output order follows `local`. A
/// local device without a cloud entry cannot be addressed (no key) and is
/// dropped; a cloud entry without a local sighting has no address and is
/// likewise dropped. Reduced counts are the only signal; a miss is not an
/// error.
#[must_use]
pub fn reconcile(local: &[LocalDevice], cloud: &[CloudDevice]) -> Vec<PlugDevice> {
    local
        .iter()
        .filter_map(|candidate| {
            let matched = cloud.iter().find(|entry| entry.id == candidate.id)?;
            tracing::debug!(
                device = %candidate.id,
                name = %matched.name,
                ip = %candidate.ip,
                "Reconciled local device with cloud entry"
            );
            Some(PlugDevice {
                id: candidate.id.clone(),
                ip: candidate.ip.clone(),
                version: candidate.version.clone(),
                name: matched.name.clone(),
                local_key: matched.local_key.clone(),
                category: matched.category.clone(),
            })
        })
        .collect()
}
