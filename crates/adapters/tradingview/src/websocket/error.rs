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

//! TradingView websocket client error types.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Error types for the TradingView websocket client.
#[derive(Debug, Clone, Error)]
pub enum TradingViewWsError {
    /// Client is not connected (the transport task has stopped).
    #[error("Not connected")]
    NotConnected,
    /// Transport-level error during websocket communication.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Failed to send a message over the websocket.
    #[error("Send error: {0}")]
    Send(String),
    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),
    /// Malformed frame or message content.
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// An event name not recognized by the client.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    /// Session-level failure reported by the server.
    #[error("Server error ({event}): {message}")]
    Server {
        /// The event name that reported the failure.
        event: String,
        /// The payload of the event.
        message: String,
    },
    /// An operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),
    /// The operation was cancelled through the connection's cancellation token.
    #[error("Cancelled")]
    Cancelled,
    /// The socket closed while an operation was in flight.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl From<tungstenite::Error> for TradingViewWsError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for TradingViewWsError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error.to_string())
    }
}

/// Result type alias for TradingView websocket operations.
pub type TradingViewWsResult<T> = Result<T, TradingViewWsError>;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_display() {
        let error = TradingViewWsError::Server {
            event: "critical_error".to_string(),
            message: "[\"cs_abc\",\"bad\"]".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Server error (critical_error): [\"cs_abc\",\"bad\"]"
        );
    }

    #[rstest]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = TradingViewWsError::from(json_err);
        assert!(matches!(error, TradingViewWsError::Json(_)));
    }

    #[rstest]
    fn test_from_tungstenite_error() {
        let error = TradingViewWsError::from(tungstenite::Error::ConnectionClosed);
        assert!(matches!(error, TradingViewWsError::Transport(_)));
    }
}
