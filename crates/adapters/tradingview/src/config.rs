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

//! Configuration for the TradingView websocket client.

use std::{fmt, time::Duration};

use chartfeed_common::env::{get_env_var_u64, get_or_env_var_opt};

use crate::common::consts::{TRADINGVIEW_ANONYMOUS_TOKEN, TRADINGVIEW_ORIGIN, TRADINGVIEW_WS_URL};

/// Configuration for a TradingView websocket connection.
#[derive(Clone)]
pub struct TradingViewConfig {
    /// Websocket endpoint URL.
    pub ws_url: String,
    /// Value of the `Origin` header sent with the upgrade request.
    pub origin: String,
    /// Token presented with `set_auth_token` once the session is established.
    pub auth_token: String,
    /// Deadline (seconds) for the socket connect and session bootstrap.
    pub connect_timeout_secs: u64,
    /// Deadline (seconds) for one candle fetch, `None` to wait indefinitely.
    pub fetch_timeout_secs: Option<u64>,
    /// Deadline (seconds) for the close handshake.
    pub close_timeout_secs: u64,
}

impl Default for TradingViewConfig {
    fn default() -> Self {
        Self {
            ws_url: TRADINGVIEW_WS_URL.to_string(),
            origin: TRADINGVIEW_ORIGIN.to_string(),
            auth_token: TRADINGVIEW_ANONYMOUS_TOKEN.to_string(),
            connect_timeout_secs: 10,
            fetch_timeout_secs: Some(120),
            close_timeout_secs: 5,
        }
    }
}

impl fmt::Debug for TradingViewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = if self.auth_token == TRADINGVIEW_ANONYMOUS_TOKEN {
            TRADINGVIEW_ANONYMOUS_TOKEN
        } else {
            "<redacted>"
        };
        f.debug_struct(stringify!(TradingViewConfig))
            .field("ws_url", &self.ws_url)
            .field("origin", &self.origin)
            .field("auth_token", &token)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("close_timeout_secs", &self.close_timeout_secs)
            .finish()
    }
}

impl TradingViewConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration with defaults, overridden by environment variables when set:
    ///
    /// - `TRADINGVIEW_WS_URL`
    /// - `TRADINGVIEW_AUTH_TOKEN`
    /// - `TRADINGVIEW_CONNECT_TIMEOUT_SECS`
    /// - `TRADINGVIEW_FETCH_TIMEOUT_SECS` (`0` disables the fetch deadline)
    /// - `TRADINGVIEW_CLOSE_TIMEOUT_SECS`
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ws_url: get_or_env_var_opt(None, "TRADINGVIEW_WS_URL").unwrap_or(defaults.ws_url),
            auth_token: get_or_env_var_opt(None, "TRADINGVIEW_AUTH_TOKEN")
                .unwrap_or(defaults.auth_token),
            connect_timeout_secs: get_env_var_u64("TRADINGVIEW_CONNECT_TIMEOUT_SECS")
                .unwrap_or(defaults.connect_timeout_secs),
            fetch_timeout_secs: match get_env_var_u64("TRADINGVIEW_FETCH_TIMEOUT_SECS") {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => defaults.fetch_timeout_secs,
            },
            close_timeout_secs: get_env_var_u64("TRADINGVIEW_CLOSE_TIMEOUT_SECS")
                .unwrap_or(defaults.close_timeout_secs),
            ..defaults
        }
    }

    /// Returns a copy of this configuration pointing at `ws_url`.
    #[must_use]
    pub fn with_ws_url(mut self, ws_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    #[must_use]
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_secs.map(Duration::from_secs)
    }

    #[must_use]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}
