// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decryption and parsing of Tuya discovery broadcast frames.
//!
//! Tuya devices announce themselves on UDP ports 6666/6667 with a framed,
//! AES-encrypted JSON payload. The frame layout is a fixed 20-byte header,
//! the ECB-encrypted body, and a 4-byte CRC plus 4-byte tail marker. The
//! body is encrypted with AES-128-ECB using a key derived as the MD5 digest
//! of a well-known seed string shared by all devices.
//!
//! Broadcast frames are not reliably padded; after decryption, everything
//! outside the printable ASCII range is stripped before JSON parsing.

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, KeyInit};
use md5::{Digest, Md5};
use serde::Deserialize;

use crate::error::ParseError;

/// Fixed prefix of every broadcast frame.
pub(crate) const FRAME_HEADER_LEN: usize = 20;

/// CRC and tail marker trailing every broadcast frame.
pub(crate) const FRAME_SIGNATURE_LEN: usize = 8;

/// Seed for the shared broadcast key. The actual AES key is `MD5(seed)`.
const UDP_KEY_SEED: &[u8] = b"yGAdlopoPVldABfn";

/// AES block size in bytes.
const BLOCK_LEN: usize = 16;

/// The JSON payload carried by a discovery broadcast.
///
/// Only the fields the reconciler needs are modeled; devices include
/// additional fields (`productKey`, `ability`, `encrypt`) that are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastPayload {
    /// The device identifier ("gateway id" in protocol terms).
    #[serde(rename = "gwId")]
    pub gw_id: String,
    /// Local protocol version, e.g. `3.3` or `3.4`.
    pub version: String,
    /// IP address as reported by the device itself, when present.
    ///
    /// The listener prefers the datagram's source address; this field is
    /// kept for logging only.
    #[serde(default)]
    pub ip: Option<String>,
}

/// Decrypts and parses a complete broadcast datagram.
///
/// # Errors
///
/// Returns `ParseError` if the frame is too short, the body length is not a
/// multiple of the AES block size, or the decrypted body is not valid JSON.
pub fn parse_frame(datagram: &[u8]) -> Result<BroadcastPayload, ParseError> {
    if datagram.len() <= FRAME_HEADER_LEN + FRAME_SIGNATURE_LEN {
        return Err(ParseError::Decrypt(format!(
            "frame too short: {} bytes",
            datagram.len()
        )));
    }

    let body = &datagram[FRAME_HEADER_LEN..datagram.len() - FRAME_SIGNATURE_LEN];
    let decrypted = decrypt_body(body)?;
    let cleaned = strip_non_printable(&decrypted);

    let payload: BroadcastPayload = serde_json::from_str(&cleaned)?;

    if payload.gw_id.is_empty() {
        return Err(ParseError::MissingField("gwId".to_string()));
    }

    Ok(payload)
}

/// Decrypts the frame body with AES-128-ECB, no padding.
fn decrypt_body(body: &[u8]) -> Result<Vec<u8>, ParseError> {
    if body.is_empty() || body.len() % BLOCK_LEN != 0 {
        return Err(ParseError::Decrypt(format!(
            "body length {} is not a multiple of the block size",
            body.len()
        )));
    }

    let key: [u8; 16] = Md5::digest(UDP_KEY_SEED).into();
    let cipher = Aes128::new(&key.into());

    let mut buffer = body.to_vec();
    for block in buffer.chunks_exact_mut(BLOCK_LEN) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }

    Ok(buffer)
}

/// Drops every byte outside the printable ASCII range (0x20-0x7E).
///
/// Broadcast bodies carry zero padding and occasional trailing garbage that
/// would otherwise break the JSON parser.
fn strip_non_printable(bytes: &[u8]) -> String {
    bytes
        .iter()
        .copied()
        .filter(|b| (0x20..=0x7E).contains(b))
        .map(char::from)
        .collect()
}
