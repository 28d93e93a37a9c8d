// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `WashR` library.
//!
//! This module provides the error hierarchy for failures across the library:
//! device configuration validation, network protocol communication, and
//! parsing of broadcast frames, cloud responses and device status payloads.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Device configuration is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred during protocol communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// Device was not found on the network after all discovery attempts.
    #[error("device {device_id} not found after {attempts} discovery attempts")]
    DeviceNotFound {
        /// The device identifier that was searched for.
        device_id: String,
        /// Number of discovery attempts made.
        attempts: u32,
    },
}

/// Errors related to per-device configuration.
///
/// These are fatal to the affected device's tracker at construction time;
/// other devices are unaffected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// The start threshold is below the end threshold.
    #[error("start threshold {start} W must not be below end threshold {end} W")]
    ThresholdOrder {
        /// Configured start threshold in watts.
        start: f64,
        /// Configured end threshold in watts.
        end: f64,
    },

    /// A required device field is missing or empty.
    #[error("missing required device field: {0}")]
    MissingField(&'static str),

    /// A dwell duration is not usable.
    #[error("invalid dwell duration for {field}: {seconds} s")]
    InvalidDwell {
        /// The field that failed validation.
        field: &'static str,
        /// The rejected value in seconds.
        seconds: f64,
    },
}

/// Errors related to protocol communication (UDP discovery, cloud HTTP, MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Cloud HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT connection or communication failed.
    #[cfg(feature = "mqtt")]
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Socket or file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request timed out.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The cloud API answered with a non-success envelope.
    #[error("cloud request rejected: code={code}, msg={message}")]
    CloudRejected {
        /// Tuya error code from the response envelope.
        code: i64,
        /// Human-readable message from the response envelope.
        message: String,
    },

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to parsing frames and payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A broadcast frame could not be decrypted.
    #[error("broadcast decrypt failed: {0}")]
    Decrypt(String),

    /// Expected field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// Unexpected payload format.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
