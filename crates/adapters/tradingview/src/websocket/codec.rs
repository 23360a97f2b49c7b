// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Encoding and decoding of the TradingView wire framing.
//!
//! Every unit on the wire is `~m~<len>~m~<payload>` where `<len>` is the decimal byte
//! length of the payload. A single websocket message may carry several units. Payloads
//! starting with `~h~` are heartbeat challenges, everything else is JSON.

use serde_json::Value;

use super::{
    error::{TradingViewWsError, TradingViewWsResult},
    messages::{
        TradingViewFrame, TradingViewInboundMessage, TradingViewOutboundMessage,
        TradingViewSession,
    },
};
use crate::common::consts::{FRAME_MARKER, HEARTBEAT_MARKER};

/// Wraps `payload` in the length-prefix framing.
#[must_use]
pub fn frame(payload: &str) -> String {
    format!("{FRAME_MARKER}{}{FRAME_MARKER}{payload}", payload.len())
}

/// Encodes a command as a framed `{"m": name, "p": params}` payload.
///
/// # Errors
///
/// Returns an error if the parameters fail to serialize.
pub fn encode(name: &str, params: &[Value]) -> TradingViewWsResult<String> {
    let payload = serde_json::to_string(&TradingViewOutboundMessage { m: name, p: params })?;
    Ok(frame(&payload))
}

/// Decodes a raw websocket text message into its frames.
///
/// Text before the first marker is discarded.
///
/// # Errors
///
/// Returns [`TradingViewWsError::Protocol`] if a non-heartbeat payload is not valid JSON
/// or has neither a `session_id` nor an `m` field.
pub fn decode(raw: &str) -> TradingViewWsResult<Vec<TradingViewFrame>> {
    split_frames(raw).into_iter().map(decode_payload).collect()
}

/// Splits `raw` on length markers, dropping any preamble before the first marker.
#[must_use]
pub fn split_frames(raw: &str) -> Vec<&str> {
    let mut payloads = Vec::new();
    let Some((_, mut payload_start)) = find_marker(raw, 0) else {
        return payloads;
    };

    while let Some((start, end)) = find_marker(raw, payload_start) {
        payloads.push(&raw[payload_start..start]);
        payload_start = end;
    }
    payloads.push(&raw[payload_start..]);

    payloads
}

// Returns the byte range of the next `~m~<digits>~m~` marker at or after `from`
fn find_marker(raw: &str, from: usize) -> Option<(usize, usize)> {
    let bytes = raw.as_bytes();
    let mut search = from;

    while let Some(offset) = raw.get(search..)?.find(FRAME_MARKER) {
        let start = search + offset;
        let digits_start = start + FRAME_MARKER.len();
        let digits_len = bytes[digits_start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        let digits_end = digits_start + digits_len;

        if digits_len > 0 && raw[digits_end..].starts_with(FRAME_MARKER) {
            return Some((start, digits_end + FRAME_MARKER.len()));
        }
        search = start + 1;
    }

    None
}

fn decode_payload(payload: &str) -> TradingViewWsResult<TradingViewFrame> {
    if payload.starts_with(HEARTBEAT_MARKER) {
        return Ok(TradingViewFrame::Heartbeat {
            echo: frame(payload),
        });
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|e| TradingViewWsError::Protocol(format!("Invalid frame payload: {e}")))?;

    if value.get("session_id").is_some() {
        let session: TradingViewSession = serde_json::from_value(value)
            .map_err(|e| TradingViewWsError::Protocol(format!("Invalid session payload: {e}")))?;
        return Ok(TradingViewFrame::SessionEstablished(session));
    }

    let message: TradingViewInboundMessage = serde_json::from_value(value)
        .map_err(|e| TradingViewWsError::Protocol(format!("Invalid event payload: {e}")))?;

    Ok(TradingViewFrame::NamedEvent {
        name: message.m,
        params: message.p,
    })
}
