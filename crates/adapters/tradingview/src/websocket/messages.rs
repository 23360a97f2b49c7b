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

//! Data structures for TradingView websocket messages.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{TradingViewWsError, TradingViewWsResult};
use crate::common::enums::TradingViewEvent;

/// Outbound payload `{"m": <name>, "p": [<params>]}`.
#[derive(Debug, Serialize)]
pub struct TradingViewOutboundMessage<'a> {
    /// Command name.
    pub m: &'a str,
    /// Positional command parameters.
    pub p: &'a [Value],
}

/// Inbound named message payload.
#[derive(Debug, Deserialize)]
pub struct TradingViewInboundMessage {
    /// Event name.
    pub m: String,
    /// Positional event parameters.
    #[serde(default)]
    pub p: Vec<Value>,
}

/// Session establishment payload sent by the server right after connecting.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TradingViewSession {
    /// Server-assigned session identifier.
    pub session_id: String,
    /// Server time (UNIX seconds) at session creation.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// A decoded wire unit.
#[derive(Clone, Debug, PartialEq)]
pub enum TradingViewFrame {
    /// Heartbeat challenge carrying the framed echo to send back verbatim.
    Heartbeat { echo: String },
    /// The session has been established.
    SessionEstablished(TradingViewSession),
    /// A named event with positional parameters.
    NamedEvent { name: String, params: Vec<Value> },
}

/// A named event whose name is recognized by the client.
#[derive(Clone, Debug, PartialEq)]
pub struct TradingViewWsEvent {
    /// The event kind.
    pub event: TradingViewEvent,
    /// Positional event parameters.
    pub params: Vec<Value>,
}

impl TradingViewWsEvent {
    /// Classifies a named event.
    ///
    /// # Errors
    ///
    /// Returns [`TradingViewWsError::UnknownEvent`] if the name is not recognized.
    pub fn from_named(name: &str, params: Vec<Value>) -> TradingViewWsResult<Self> {
        let event = TradingViewEvent::from_str(name)
            .map_err(|_| TradingViewWsError::UnknownEvent(name.to_string()))?;
        Ok(Self { event, params })
    }
}

/// Messages published to subscribers of a connection.
#[derive(Clone, Debug, PartialEq)]
pub enum TradingViewWsMessage {
    /// The session has been established.
    Session(TradingViewSession),
    /// A recognized named event.
    Event(TradingViewWsEvent),
}

/// Items forwarded from the transport task to the connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// A decoded message to publish.
    Message(TradingViewWsMessage),
    /// A fatal protocol or transport failure.
    Error(TradingViewWsError),
    /// The socket has closed.
    Closed,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_outbound_message_serialization() {
        let params = vec![json!("cs_abc"), json!("")];
        let msg = TradingViewOutboundMessage {
            m: "chart_create_session",
            p: &params,
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"m":"chart_create_session","p":["cs_abc",""]}"#);
    }

    #[rstest]
    fn test_inbound_message_without_params() {
        let msg: TradingViewInboundMessage =
            serde_json::from_str(r#"{"m":"series_completed"}"#).unwrap();
        assert_eq!(msg.m, "series_completed");
        assert!(msg.p.is_empty());
    }

    #[rstest]
    fn test_session_deserialization() {
        let session: TradingViewSession = serde_json::from_str(
            r#"{"session_id":"<0.123.456>_sfo-charts-1","timestamp":1700000000,"release":"r1"}"#,
        )
        .unwrap();
        assert_eq!(session.session_id, "<0.123.456>_sfo-charts-1");
        assert_eq!(session.timestamp, Some(1_700_000_000));
    }

    #[rstest]
    fn test_event_from_named() {
        let event = TradingViewWsEvent::from_named("series_completed", vec![json!("cs_x")])
            .unwrap();
        assert_eq!(event.event, TradingViewEvent::SeriesCompleted);
        assert_eq!(event.params, vec![json!("cs_x")]);
    }

    #[rstest]
    fn test_event_from_named_unknown() {
        let result = TradingViewWsEvent::from_named("mystery", Vec::new());
        assert!(matches!(
            result,
            Err(TradingViewWsError::UnknownEvent(name)) if name == "mystery"
        ));
    }
}
