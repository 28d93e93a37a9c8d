// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! LAN auto-discovery for Tuya smart plugs.
//!
//! Tuya devices broadcast an encrypted announcement on UDP port 6666
//! (protocol 3.1) or 6667 (protocol 3.3+) every few seconds. Discovery
//! listens on both ports for a bounded window, decrypts each frame via
//! [`broadcast`] and returns one [`LocalDevice`] per distinct announcement.
//!
//! A discovered device carries no key material; it must be reconciled
//! against the cloud registry before it can be addressed (see
//! [`crate::registry`]).
//!
//! # Examples
//!
//! ```no_run
//! use washr_lib::discovery::{DiscoveryOptions, discover};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let options = DiscoveryOptions::new().with_window(Duration::from_secs(5));
//! let devices = discover(&options).await;
//!
//! for device in &devices {
//!     println!("{} at {} (protocol {})", device.id, device.ip, device.version);
//! }
//! # }
//! ```

pub mod broadcast;

use std::collections::HashSet;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::net::IpAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::Instant;

pub use broadcast::BroadcastPayload;

/// UDP ports Tuya devices announce themselves on, one per protocol generation.
pub const DISCOVERY_PORTS: [u16; 2] = [6666, 6667];

/// Default listening window per port.
const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(5);

/// Largest broadcast frame we accept.
const MAX_FRAME_LEN: usize = 2048;

/// A device seen on the local network.
///
/// Ephemeral: rebuilt on every discovery pass and never persisted. The
/// record has no key material, so it cannot be addressed until reconciled
/// with its cloud registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDevice {
    /// Device identifier from the broadcast payload (`gwId`).
    pub id: String,
    /// Source address of the broadcast datagram.
    pub ip: String,
    /// Local protocol version, e.g. `3.3`.
    pub version: String,
}

/// Options for a LAN discovery pass.
///
/// # Examples
///
/// ```
/// use washr_lib::discovery::DiscoveryOptions;
/// use std::time::Duration;
///
/// let options = DiscoveryOptions::new()
///     .with_window(Duration::from_secs(10))
///     .with_ports(vec![6667]);
/// ```
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    ports: Vec<u16>,
    window: Duration,
}

impl DiscoveryOptions {
    /// Creates options with the default ports and a 5 second window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the listening window applied to each port.
    #[must_use]
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Replaces the set of ports to listen on.
    #[must_use]
    pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
        self.ports = ports;
        self
    }

    /// Returns the configured ports.
    #[must_use]
    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Returns the per-port listening window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            ports: DISCOVERY_PORTS.to_vec(),
            window: DEFAULT_DISCOVERY_WINDOW,
        }
    }
}

/// Runs one LAN discovery pass.
///
/// Each configured port gets its own socket and its own listening window;
/// the ports are listened to concurrently and their results concatenated
/// (ordering between ports is not meaningful). Sockets are closed when the
/// window elapses regardless of in-flight packets.
///
/// Frames that fail decryption or parsing are logged and skipped; a socket
/// that cannot be bound is logged and skipped. Neither aborts the pass, so
/// the result may be empty; callers decide whether to fall back to a
/// cached device list (see [`crate::manager::DeviceDirectory`]).
///
/// Duplicate datagrams (devices re-announce within the window) are filtered
/// through a fingerprint set created fresh for every call, so back-to-back
/// passes each see the full device population.
pub async fn discover(options: &DiscoveryOptions) -> Vec<LocalDevice> {
    tracing::info!(
        ports = ?options.ports(),
        window_secs = options.window().as_secs(),
        "Starting LAN discovery"
    );

    let mut tasks = Vec::with_capacity(options.ports().len());
    for &port in options.ports() {
        tasks.push(tokio::spawn(collect_datagrams(port, options.window())));
    }

    // The fingerprint set is scoped to this pass. Reusing it across passes
    // would make every later pass report an empty network.
    let mut seen = HashSet::new();
    let mut devices = Vec::new();

    for task in tasks {
        match task.await {
            Ok(datagrams) => process_datagrams(datagrams, &mut seen, &mut devices),
            Err(e) => tracing::warn!(error = %e, "Discovery listener task failed"),
        }
    }

    tracing::info!(count = devices.len(), "LAN discovery completed");
    devices
}

/// Collects raw datagrams from one port until the window elapses.
///
/// Returns the raw bytes and source address of every datagram received.
/// Dropping the socket at the end of the window closes it.
async fn collect_datagrams(port: u16, window: Duration) -> Vec<(Vec<u8>, IpAddr)> {
    let socket = match UdpSocket::bind(("0.0.0.0", port)).await {
        Ok(socket) => socket,
        Err(e) => {
            tracing::warn!(port, error = %e, "Failed to bind discovery socket");
            return Vec::new();
        }
    };

    tracing::debug!(port, "Listening for device broadcasts");

    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; MAX_FRAME_LEN];
    let mut datagrams = Vec::new();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        match tokio::time::timeout(remaining, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, addr))) => datagrams.push((buf[..len].to_vec(), addr.ip())),
            Ok(Err(e)) => tracing::warn!(port, error = %e, "Error receiving broadcast"),
            // Window elapsed
            Err(_) => break,
        }
    }

    tracing::debug!(port, count = datagrams.len(), "Port window elapsed");
    datagrams
}

/// Decrypts and parses collected datagrams into device records.
///
/// `seen` holds fingerprints of datagrams already processed in this pass.
fn process_datagrams(
    datagrams: Vec<(Vec<u8>, IpAddr)>,
    seen: &mut HashSet<u64>,
    devices: &mut Vec<LocalDevice>,
) {
    for (bytes, source) in datagrams {
        if !seen.insert(fingerprint(&bytes)) {
            tracing::trace!(%source, "Skipping repeated broadcast");
            continue;
        }

        match broadcast::parse_frame(&bytes) {
            Ok(payload) => {
                tracing::debug!(
                    device = %payload.gw_id,
                    %source,
                    version = %payload.version,
                    "Discovered device"
                );
                devices.push(LocalDevice {
                    id: payload.gw_id,
                    ip: source.to_string(),
                    version: payload.version,
                });
            }
            Err(e) => {
                tracing::warn!(%source, error = %e, "Discarding undecodable broadcast frame");
            }
        }
    }
}

/// Hashes a raw datagram for duplicate detection.
fn fingerprint(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}
