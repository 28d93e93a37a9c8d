// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device polling loop.

use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cycle::{CycleDetector, CycleEvent, CycleSummary, PowerSample};
use crate::error::Result;
use crate::notify::NotificationSink;
use crate::status::{PowerIds, StatusCache, StatusSource};

use super::tracker_config::TrackerConfig;

/// Typed lifecycle events emitted by a tracker.
///
/// Delivered on the channel passed to [`LaundryTracker::spawn`]; hosts map
/// them to accessories, dashboards or logs.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// A cycle start was confirmed.
    CycleStarted {
        /// The tracked device.
        device_id: String,
        /// Confirmation timestamp, seconds since the Unix epoch.
        at_epoch: f64,
    },

    /// A cycle end was confirmed.
    CycleFinished {
        /// The tracked device.
        device_id: String,
        /// Statistics for the completed cycle.
        summary: CycleSummary,
    },

    /// The exposed automation indicator changed.
    ///
    /// Only emitted when the config enables the state switch.
    IndicatorChanged {
        /// The tracked device.
        device_id: String,
        /// New indicator state.
        on: bool,
    },
}

/// Handle to a running tracker.
///
/// Dropping the handle stops the tracker: the stop signal's sender lives
/// here, and the loop exits when it goes away.
#[derive(Debug)]
pub struct TrackerHandle {
    device_id: String,
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl TrackerHandle {
    /// Returns the tracked device's id.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Signals the loop to stop. Idempotent.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Returns `true` once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops the loop and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.join.await {
            tracing::error!(device = %self.device_id, error = %e, "Tracker task failed");
        }
    }
}

/// Spawner for per-device tracking loops.
///
/// Each tracker polls its status source, feeds the readings through a
/// [`CycleDetector`] and pushes lifecycle notifications and
/// [`TrackerEvent`]s outward. All collaborators are injected; trackers
/// share nothing with each other except the notification sink, which must
/// tolerate concurrent sends.
///
/// # Examples
///
/// ```no_run
/// use tokio::sync::mpsc;
/// use washr_lib::cycle::Thresholds;
/// use washr_lib::manager::{LaundryTracker, TrackerConfig};
/// use washr_lib::notify::NullSink;
/// use washr_lib::status::MqttStatusFeed;
///
/// # async fn example() -> washr_lib::Result<()> {
/// let thresholds = Thresholds::new(90.0, 10.0, 5.0, 60.0)?;
/// let config = TrackerConfig::new("bf0123456789", thresholds)
///     .with_name("Washer")
///     .with_local_key("a1b2c3d4e5f60708")
///     .with_ip_address("192.168.1.40")
///     .with_end_message("The washer is done!");
///
/// let source = MqttStatusFeed::connect("mqtt://broker:1883", "tuya/bf0123456789/status").await?;
/// let (events_tx, mut events_rx) = mpsc::channel(16);
///
/// let handle = LaundryTracker::spawn(config, source, NullSink, events_tx)?;
///
/// while let Some(event) = events_rx.recv().await {
///     println!("{event:?}");
/// }
/// handle.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct LaundryTracker;

impl LaundryTracker {
    /// Validates the configuration and spawns the polling loop.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the device configuration is not
    /// addressable (missing id, key, address or power property). The error
    /// is fatal to this device only.
    pub fn spawn<S, N>(
        config: TrackerConfig,
        source: S,
        notifier: N,
        events: mpsc::Sender<TrackerEvent>,
    ) -> Result<TrackerHandle>
    where
        S: StatusSource + Send + Sync + 'static,
        N: NotificationSink + 'static,
    {
        config.validate()?;

        let device_id = config.device_id.clone();
        let (stop_tx, stop_rx) = watch::channel(false);

        let join = tokio::spawn(run_loop(config, source, notifier, events, stop_rx));

        Ok(TrackerHandle {
            device_id,
            stop_tx,
            join,
        })
    }
}

/// The tracker loop: poll, detect, notify, sleep, repeat.
async fn run_loop<S, N>(
    config: TrackerConfig,
    source: S,
    notifier: N,
    events: mpsc::Sender<TrackerEvent>,
    mut stop_rx: watch::Receiver<bool>,
) where
    S: StatusSource,
    N: NotificationSink,
{
    let mut detector = CycleDetector::new(config.thresholds);
    if config.export_dir.is_some() {
        detector = detector.with_sample_recording();
    }

    let ids = config.power_ids();
    let cache = StatusCache::new();

    tracing::info!(device = %config.name, "Tracker started");

    loop {
        poll_once(&config, &source, &notifier, &events, &mut detector, &cache, &ids).await;

        tokio::select! {
            () = tokio::time::sleep(detector.polling_interval()) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!(device = %config.name, "Tracker stopped");
}

/// Fetches one status snapshot and feeds it through the detector.
///
/// Fetch failures are logged and swallowed; the loop keeps polling.
async fn poll_once<S, N>(
    config: &TrackerConfig,
    source: &S,
    notifier: &N,
    events: &mpsc::Sender<TrackerEvent>,
    detector: &mut CycleDetector,
    cache: &StatusCache,
    ids: &PowerIds,
) where
    S: StatusSource,
    N: NotificationSink,
{
    let status = match source.get_status().await {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(device = %config.name, error = %e, "Status fetch failed");
            return;
        }
    };

    let reading = cache.extract(&status, ids);

    if reading.voltage.is_some() || reading.current_ma.is_some() {
        tracing::debug!(
            device = %config.name,
            voltage = reading.voltage,
            current_ma = reading.current_ma,
            "Electrical readings"
        );
    }

    if reading.watts.is_none() {
        tracing::warn!(
            device = %config.name,
            power_id = %ids.power,
            "Power property absent from status read"
        );
    }

    let sample = PowerSample {
        watts: reading.watts,
        epoch_secs: now_epoch(),
    };

    if let Some(event) = detector.apply(&sample) {
        handle_event(config, notifier, events, event).await;
    }
}

/// Fans a detector event out to the notifier and the event channel.
async fn handle_event<N: NotificationSink>(
    config: &TrackerConfig,
    notifier: &N,
    events: &mpsc::Sender<TrackerEvent>,
    event: CycleEvent,
) {
    match event {
        CycleEvent::Started { at_epoch } => {
            tracing::info!(device = %config.name, "Appliance started the job");

            if let Some(message) = &config.start_message {
                deliver(config, notifier, message).await;
            }

            emit(
                events,
                TrackerEvent::CycleStarted {
                    device_id: config.device_id.clone(),
                    at_epoch,
                },
            )
            .await;

            if config.expose_state_switch {
                emit(
                    events,
                    TrackerEvent::IndicatorChanged {
                        device_id: config.device_id.clone(),
                        on: true,
                    },
                )
                .await;
            }
        }

        CycleEvent::Finished(summary) => {
            tracing::info!(
                device = %config.name,
                total_kwh = summary.total_kwh,
                duration_secs = summary.duration_secs,
                "Appliance finished the job"
            );

            if let Some(message) = &config.end_message {
                deliver(config, notifier, message).await;
            }

            if let Some(dir) = &config.export_dir
                && let Err(e) =
                    crate::export::write_cycle_log(dir, &config.device_id, &config.name, &summary)
            {
                tracing::error!(device = %config.name, error = %e, "Cycle export failed");
            }

            emit(
                events,
                TrackerEvent::CycleFinished {
                    device_id: config.device_id.clone(),
                    summary,
                },
            )
            .await;

            if config.expose_state_switch {
                emit(
                    events,
                    TrackerEvent::IndicatorChanged {
                        device_id: config.device_id.clone(),
                        on: false,
                    },
                )
                .await;
            }
        }
    }
}

/// Sends a notification, logging failures instead of propagating them.
async fn deliver<N: NotificationSink>(config: &TrackerConfig, notifier: &N, message: &str) {
    if let Err(e) = notifier.send(message).await {
        tracing::warn!(device = %config.name, error = %e, "Notification delivery failed");
    }
}

/// Pushes a tracker event, tolerating a closed channel.
async fn emit(events: &mpsc::Sender<TrackerEvent>, event: TrackerEvent) {
    if events.send(event).await.is_err() {
        tracing::debug!("Event channel closed, dropping tracker event");
    }
}

/// Current wall-clock time as fractional seconds since the Unix epoch.
fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
