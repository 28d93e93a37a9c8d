// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directory of addressable plugs: discovery plus registry plus cache.

use std::time::Duration;

use tokio::sync::RwLock;

use crate::discovery::{DiscoveryOptions, LocalDevice, discover};
use crate::error::{Error, Result};
use crate::registry::{DeviceRegistry, PlugDevice, reconcile};

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy.
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Result of a directory refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceList {
    /// The addressable devices.
    pub devices: Vec<PlugDevice>,
    /// `true` when the fresh pass came up empty and the previous
    /// successful result was served instead. Staleness is then the
    /// caller's risk.
    pub from_cache: bool,
}

/// Combines LAN discovery with the cloud registry.
///
/// The directory caches the last successful reconciliation; when a fresh
/// pass yields nothing (quiet network, cloud outage) the cache is served
/// and flagged as such. The cache has a single writer (the refresh pass
/// itself) and any number of readers.
///
/// The registry client is injected at construction; there is no implicit
/// global instance.
///
/// # Examples
///
/// ```no_run
/// use washr_lib::manager::DeviceDirectory;
/// use washr_lib::registry::HttpRegistryConfig;
///
/// # async fn example() -> washr_lib::Result<()> {
/// let registry = HttpRegistryConfig::new("https://openapi.tuyaeu.com")
///     .with_access_token("token")
///     .into_client()?;
///
/// let directory = DeviceDirectory::new(registry);
/// let list = directory.refresh().await;
/// println!("{} plugs addressable", list.devices.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DeviceDirectory<R> {
    registry: R,
    options: DiscoveryOptions,
    retry: RetryPolicy,
    cache: RwLock<Vec<PlugDevice>>,
}

impl<R: DeviceRegistry> DeviceDirectory<R> {
    /// Creates a directory with default discovery options and retry policy.
    #[must_use]
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            options: DiscoveryOptions::default(),
            retry: RetryPolicy::default(),
            cache: RwLock::new(Vec::new()),
        }
    }

    /// Sets the discovery options.
    #[must_use]
    pub fn with_discovery_options(mut self, options: DiscoveryOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the retry policy used by [`find_device`](Self::find_device).
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs a discovery pass and reconciles it against the cloud registry.
    pub async fn refresh(&self) -> DeviceList {
        let local = discover(&self.options).await;
        self.resolve_local(&local).await
    }

    /// Reconciles an already-discovered device list against the registry.
    ///
    /// Useful when several trackers share one discovery pass instead of
    /// each running their own.
    pub async fn resolve_local(&self, local: &[LocalDevice]) -> DeviceList {
        // A registry failure means zero cloud devices this round; the
        // cache below absorbs the round.
        let cloud = match self.registry.list_devices().await {
            Ok(cloud) => cloud,
            Err(e) => {
                tracing::warn!(error = %e, "Cloud registry unavailable, assuming no cloud devices");
                Vec::new()
            }
        };

        let merged = reconcile(local, &cloud);

        if merged.is_empty() {
            let cached = self.cache.read().await;
            if cached.is_empty() {
                return DeviceList {
                    devices: Vec::new(),
                    from_cache: false,
                };
            }

            tracing::warn!(
                count = cached.len(),
                "Reconciliation came up empty, serving cached device list"
            );
            return DeviceList {
                devices: cached.clone(),
                from_cache: true,
            };
        }

        tracing::info!(count = merged.len(), "Reconciled device list refreshed");
        *self.cache.write().await = merged.clone();

        DeviceList {
            devices: merged,
            from_cache: false,
        }
    }

    /// Returns the cached device list without touching the network.
    pub async fn cached(&self) -> Vec<PlugDevice> {
        self.cache.read().await.clone()
    }

    /// Finds one device, re-running discovery with bounded retries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] after the configured attempts are
    /// exhausted. The failure is terminal for this operation only.
    pub async fn find_device(&self, device_id: &str) -> Result<PlugDevice> {
        for attempt in 1..=self.retry.attempts {
            let list = self.refresh().await;
            if let Some(device) = list.devices.into_iter().find(|d| d.id == device_id) {
                return Ok(device);
            }

            if attempt < self.retry.attempts {
                tracing::warn!(
                    device = %device_id,
                    attempt,
                    attempts = self.retry.attempts,
                    "Device not found, retrying"
                );
                tokio::time::sleep(self.retry.delay).await;
            }
        }

        Err(Error::DeviceNotFound {
            device_id: device_id.to_string(),
            attempts: self.retry.attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::registry::CloudDevice;

    /// Registry fake with a fixed answer.
    struct FixedRegistry {
        devices: Vec<CloudDevice>,
        fail: bool,
    }

    impl FixedRegistry {
        fn with(devices: Vec<CloudDevice>) -> Self {
            Self {
                devices,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                devices: Vec::new(),
                fail: true,
            }
        }
    }

    impl DeviceRegistry for FixedRegistry {
        async fn list_devices(&self) -> Result<Vec<CloudDevice>> {
            if self.fail {
                return Err(ProtocolError::Timeout(10_000).into());
            }
            Ok(self.devices.clone())
        }
    }

    fn cloud(id: &str) -> CloudDevice {
        CloudDevice {
            id: id.to_string(),
            name: format!("Plug {id}"),
            local_key: "key".to_string(),
            category: "cz".to_string(),
        }
    }

    fn local(id: &str) -> LocalDevice {
        LocalDevice {
            id: id.to_string(),
            ip: "10.0.0.9".to_string(),
            version: "3.3".to_string(),
        }
    }

    /// Options that bind an unused port for a few milliseconds, keeping
    /// network-touching tests fast.
    fn quiet_discovery() -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_ports(vec![47123])
            .with_window(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn resolve_merges_and_fills_cache() {
        let directory = DeviceDirectory::new(FixedRegistry::with(vec![cloud("a")]));

        let list = directory.resolve_local(&[local("a")]).await;
        assert_eq!(list.devices.len(), 1);
        assert!(!list.from_cache);

        assert_eq!(directory.cached().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_pass_serves_cache_and_flags_it() {
        let directory = DeviceDirectory::new(FixedRegistry::with(vec![cloud("a")]));

        directory.resolve_local(&[local("a")]).await;
        let list = directory.resolve_local(&[]).await;

        assert_eq!(list.devices.len(), 1);
        assert!(list.from_cache);
        // The cache itself is untouched by the empty pass.
        assert_eq!(directory.cached().await.len(), 1);
    }

    #[tokio::test]
    async fn empty_pass_without_cache_returns_empty() {
        let directory = DeviceDirectory::new(FixedRegistry::with(vec![cloud("a")]));

        let list = directory.resolve_local(&[]).await;
        assert!(list.devices.is_empty());
        assert!(!list.from_cache);
    }

    #[tokio::test]
    async fn registry_failure_degrades_to_cache() {
        let directory = DeviceDirectory::new(FixedRegistry::failing());

        let list = directory.resolve_local(&[local("a")]).await;
        assert!(list.devices.is_empty());
    }

    #[tokio::test]
    async fn find_device_exhausts_retries() {
        let directory = DeviceDirectory::new(FixedRegistry::with(Vec::new()))
            .with_discovery_options(quiet_discovery())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));

        let err = directory.find_device("ghost").await.unwrap_err();
        assert!(matches!(
            err,
            Error::DeviceNotFound { attempts: 2, ref device_id } if device_id == "ghost"
        ));
    }

    #[tokio::test]
    async fn find_device_serves_from_cached_list() {
        let directory = DeviceDirectory::new(FixedRegistry::with(vec![cloud("a")]))
            .with_discovery_options(quiet_discovery())
            .with_retry_policy(RetryPolicy::new(1, Duration::from_millis(10)));

        // Seed the cache, then search with a silent network: the refresh
        // inside find_device falls back to the cache.
        directory.resolve_local(&[local("a")]).await;

        let device = directory.find_device("a").await.unwrap();
        assert_eq!(device.name, "Plug a");
    }

    #[test]
    fn retry_policy_floor_is_one_attempt() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.attempts, 1);
    }
}
