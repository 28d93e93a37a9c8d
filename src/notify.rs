// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Notification gateway seam.
//!
//! Trackers push plain-text lifecycle messages ("the washer started",
//! "the dryer finished") through a [`NotificationSink`]. Fan-out to
//! concrete channels (chat bots, topic push services) is the host's
//! concern; this library only defines the seam and a no-op sink for hosts
//! that configure no gateway.
//!
//! Delivery is fire-and-forget from the tracker's perspective: a failed
//! send is logged and never blocks a phase transition.

use std::future::Future;

use crate::error::Result;

/// Receiver of plain-text lifecycle messages.
///
/// Implementations must tolerate concurrent calls: every tracker shares
/// one sink.
pub trait NotificationSink: Send + Sync {
    /// Delivers one message.
    ///
    /// # Errors
    ///
    /// Returns an error when delivery fails; callers log and move on.
    fn send(&self, message: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Sink for installations without a notification gateway.
///
/// Messages are dropped with a debug log, mirroring the "no gateways
/// configured" path hosts otherwise hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    async fn send(&self, message: &str) -> Result<()> {
        tracing::debug!(message, "No notification gateway configured, dropping message");
        Ok(())
    }
}
