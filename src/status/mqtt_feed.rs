// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message-bus power status feed.
//!
//! Some installations bridge device status onto an MQTT broker instead of
//! polling the plug's local session directly. The feed subscribes to one
//! status topic, retains the most recent payload, and serves it through the
//! [`StatusSource`] seam.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::watch;

use crate::error::{ProtocolError, Result};

use super::{DpsStatus, StatusSource};

/// Global counter for generating unique client IDs.
static CLIENT_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// How long a status fetch waits for a first payload before failing.
const FIRST_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// MQTT-backed [`StatusSource`] for one device topic.
///
/// # Examples
///
/// ```ignore
/// use washr_lib::status::{MqttStatusFeed, StatusSource};
///
/// let feed = MqttStatusFeed::connect("mqtt://192.168.1.50:1883", "tuya/bf012345/status").await?;
/// let status = feed.get_status().await?;
/// ```
#[derive(Debug)]
pub struct MqttStatusFeed {
    topic: String,
    latest_rx: watch::Receiver<Option<String>>,
}

impl MqttStatusFeed {
    /// Connects to a broker and subscribes to the given status topic.
    ///
    /// # Errors
    ///
    /// Returns an error if the broker URL is invalid or the subscription
    /// fails.
    pub async fn connect(
        broker_url: impl Into<String>,
        topic: impl Into<String>,
    ) -> Result<Self> {
        let broker_url = broker_url.into();
        let topic = topic.into();

        let (host, port) = parse_mqtt_url(&broker_url)?;

        let counter = CLIENT_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        let client_id = format!("washr_{}_{}", std::process::id(), counter);

        let mut mqtt_options = MqttOptions::new(&client_id, host, port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));
        mqtt_options.set_clean_session(true);

        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

        client
            .subscribe(&topic, QoS::AtLeastOnce)
            .await
            .map_err(ProtocolError::Mqtt)?;

        let (latest_tx, latest_rx) = watch::channel(None);

        let topic_clone = topic.clone();
        tokio::spawn(async move {
            retain_latest(event_loop, topic_clone, latest_tx).await;
        });

        Ok(Self { topic, latest_rx })
    }

    /// Returns the subscribed status topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl StatusSource for MqttStatusFeed {
    async fn get_status(&self) -> Result<DpsStatus> {
        let mut rx = self.latest_rx.clone();

        // Serve the retained payload immediately; otherwise wait (bounded)
        // for the first one to arrive.
        let raw = if let Some(raw) = rx.borrow().clone() {
            raw
        } else {
            // Safe: constant fits in u64 milliseconds
            #[allow(clippy::cast_possible_truncation)]
            let timeout_ms = FIRST_PAYLOAD_TIMEOUT.as_millis() as u64;

            tokio::time::timeout(FIRST_PAYLOAD_TIMEOUT, rx.wait_for(Option::is_some))
                .await
                .map_err(|_| ProtocolError::Timeout(timeout_ms))?
                .map_err(|_| {
                    ProtocolError::ChannelClosed("status feed stopped".to_string())
                })?
                .clone()
                .unwrap_or_default()
        };

        Ok(DpsStatus::parse(&raw)?)
    }
}

/// Stores the payload of every publish on `topic` into the watch channel.
async fn retain_latest(
    mut event_loop: EventLoop,
    topic: String,
    latest_tx: watch::Sender<Option<String>>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(?connack, "Status feed connected");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic == topic
                    && let Ok(payload) = String::from_utf8(publish.payload.to_vec())
                {
                    tracing::trace!(topic = %publish.topic, "Retained status payload");
                    let _ = latest_tx.send(Some(payload));
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Status feed event loop error");
                break;
            }
        }
    }
}

/// Parses an MQTT URL into host and port.
fn parse_mqtt_url(url: &str) -> std::result::Result<(String, u16), ProtocolError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    if let Some((host, port)) = url.rsplit_once(':') {
        let port = port.parse().map_err(|_| {
            ProtocolError::InvalidAddress(format!("invalid broker port: {port}"))
        })?;
        Ok((host.to_string(), port))
    } else {
        Ok((url.to_string(), 1883))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_url_with_scheme_and_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1884").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1884);
    }

    #[test]
    fn parse_url_defaults_port() {
        let (host, port) = parse_mqtt_url("broker.local").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_url_rejects_bad_port() {
        assert!(parse_mqtt_url("mqtt://broker:notaport").is_err());
    }
}
