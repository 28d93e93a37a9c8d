// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cloud device registry access.
//!
//! The Tuya cloud knows every device registered to the user's account,
//! including the symmetric `local_key` needed to talk to a device over the
//! LAN. This module defines the [`DeviceRegistry`] seam the rest of the
//! library consumes, the [`reconcile`] step that merges registry entries
//! with LAN discovery results, and an HTTP implementation behind the `http`
//! feature.
//!
//! Registry failures are never fatal to the engine: callers treat an error
//! as "zero cloud devices this round" and fall back to cached
//! reconciliation results where available.

mod reconcile;

pub use reconcile::{PlugDevice, reconcile};

use std::future::Future;

use serde::Deserialize;

use crate::error::Result;

/// Tuya category code for smart power plugs.
pub const PLUG_CATEGORY: &str = "cz";

/// A device as known to the cloud registry.
///
/// Read-only to this library; the registry owns these records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudDevice {
    /// Cloud device identifier; matches the `gwId` broadcast on the LAN.
    pub id: String,
    /// User-assigned display name.
    pub name: String,
    /// Symmetric key for the local protocol session.
    pub local_key: String,
    /// Device category code (`cz` for plugs).
    pub category: String,
}

/// Source of cloud-registered devices.
///
/// Implementations return only power-plug devices (category
/// [`PLUG_CATEGORY`]). Retry/auth mechanics are the implementation's
/// concern; callers degrade gracefully on any error.
pub trait DeviceRegistry {
    /// Lists the power-plug devices registered to the account.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry cannot be reached or rejects the
    /// request.
    fn list_devices(&self) -> impl Future<Output = Result<Vec<CloudDevice>>> + Send;
}

/// Response envelope used by the Tuya cloud API.
#[derive(Debug, Deserialize)]
pub(crate) struct DevicesEnvelope {
    pub success: bool,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub result: Option<DevicesResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DevicesResult {
    #[serde(default)]
    pub devices: Vec<WireDevice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireDevice {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub local_key: Option<String>,
}

impl DevicesEnvelope {
    /// Extracts the plug devices from a successful envelope.
    pub(crate) fn into_plugs(self) -> std::result::Result<Vec<CloudDevice>, (i64, String)> {
        if !self.success {
            return Err((
                self.code.unwrap_or(-1),
                self.msg.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let devices = self.result.map(|r| r.devices).unwrap_or_default();

        Ok(devices
            .into_iter()
            .filter(|d| d.category == PLUG_CATEGORY)
            .map(|d| CloudDevice {
                id: d.id,
                name: d.name,
                local_key: d.local_key.unwrap_or_default(),
                category: d.category,
            })
            .collect())
    }
}

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use reqwest::Client;

    use crate::error::{ProtocolError, Result};

    use super::{CloudDevice, DeviceRegistry, DevicesEnvelope};

    /// Path of the associated-devices listing.
    const DEVICES_PATH: &str = "/v1.0/iot-01/associated-users/devices";

    /// Configuration for the HTTP registry client.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use washr_lib::registry::HttpRegistryConfig;
    ///
    /// let config = HttpRegistryConfig::new("https://openapi.tuyaeu.com")
    ///     .with_access_token("token")
    ///     .with_timeout(Duration::from_secs(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct HttpRegistryConfig {
        base_url: String,
        access_token: Option<String>,
        timeout: Duration,
    }

    impl HttpRegistryConfig {
        /// Default request timeout.
        pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

        /// Creates a configuration for the given API base URL.
        #[must_use]
        pub fn new(base_url: impl Into<String>) -> Self {
            Self {
                base_url: base_url.into(),
                access_token: None,
                timeout: Self::DEFAULT_TIMEOUT,
            }
        }

        /// Sets the access token sent with every request.
        ///
        /// Obtaining and refreshing the token is the host's concern.
        #[must_use]
        pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
            self.access_token = Some(token.into());
            self
        }

        /// Sets the request timeout.
        #[must_use]
        pub fn with_timeout(mut self, timeout: Duration) -> Self {
            self.timeout = timeout;
            self
        }

        /// Builds the registry client.
        ///
        /// # Errors
        ///
        /// Returns an error if the underlying HTTP client cannot be created.
        pub fn into_client(self) -> Result<HttpRegistry> {
            let client = Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(ProtocolError::Http)?;

            Ok(HttpRegistry {
                base_url: self.base_url.trim_end_matches('/').to_string(),
                access_token: self.access_token,
                client,
            })
        }
    }

    /// HTTP implementation of [`DeviceRegistry`] against the Tuya cloud API.
    #[derive(Debug, Clone)]
    pub struct HttpRegistry {
        base_url: String,
        access_token: Option<String>,
        client: Client,
    }

    impl HttpRegistry {
        /// Returns the configured API base URL.
        #[must_use]
        pub fn base_url(&self) -> &str {
            &self.base_url
        }
    }

    impl DeviceRegistry for HttpRegistry {
        async fn list_devices(&self) -> Result<Vec<CloudDevice>> {
            let url = format!("{}{DEVICES_PATH}", self.base_url);
            tracing::debug!(%url, "Fetching cloud device list");

            let mut request = self.client.get(&url);
            if let Some(token) = &self.access_token {
                request = request.header("access_token", token);
            }

            let envelope: DevicesEnvelope = request
                .send()
                .await
                .map_err(ProtocolError::Http)?
                .error_for_status()
                .map_err(ProtocolError::Http)?
                .json()
                .await
                .map_err(ProtocolError::Http)?;

            let plugs = envelope.into_plugs().map_err(|(code, message)| {
                ProtocolError::CloudRejected { code, message }
            })?;

            tracing::debug!(count = plugs.len(), "Cloud registry returned plug devices");
            Ok(plugs)
        }
    }
}

#[cfg(feature = "http")]
pub use http::{HttpRegistry, HttpRegistryConfig};
