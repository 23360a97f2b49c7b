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

//! Core constants for the TradingView adapter.

// Production endpoints
pub const TRADINGVIEW_WS_URL: &str = "wss://prodata.tradingview.com/socket.io/websocket";
pub const TRADINGVIEW_ORIGIN: &str = "https://prodata.tradingview.com";

/// Token presented by sessions without an account.
pub const TRADINGVIEW_ANONYMOUS_TOKEN: &str = "unauthorized_user_token";

// Framing markers
pub const FRAME_MARKER: &str = "~m~";
pub const HEARTBEAT_MARKER: &str = "~h~";

/// Largest number of candles the server delivers for one series request.
pub const MAX_BATCH_SIZE: usize = 5_000;

/// Default candle timeframe in seconds.
pub const DEFAULT_TIMEFRAME_SECS: u64 = 60;

// Session identifiers
pub const CHART_SESSION_PREFIX: &str = "cs_";
pub const QUOTE_SESSION_PREFIX: &str = "qs_";
pub const SESSION_ID_LEN: usize = 12;

// Series keys within a chart session
pub const SERIES_ID: &str = "sds_1";
pub const SYMBOL_REF_PREFIX: &str = "sds_sym_";
pub const SERIES_TURNAROUND_PREFIX: &str = "s";

/// Price adjustment requested when resolving symbols.
pub const SYMBOL_ADJUSTMENT: &str = "splits";

/// Flags attached to `quote_add_symbols`.
pub const QUOTE_SYMBOL_FLAGS: &[&str] = &["force_permission"];

/// Fields requested for the quote session.
pub const QUOTE_FIELDS: &[&str] = &[
    "ch",
    "chp",
    "current_session",
    "description",
    "local_description",
    "language",
    "exchange",
    "fractional",
    "is_tradable",
    "lp",
    "lp_time",
    "minmov",
    "minmove2",
    "original_name",
    "pricescale",
    "pro_name",
    "short_name",
    "type",
    "update_mode",
    "volume",
    "currency_code",
    "rchp",
    "rtc",
];
