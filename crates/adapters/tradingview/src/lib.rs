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

//! Streaming chart-data client for the [TradingView](https://www.tradingview.com) websocket.
//!
//! The crate speaks TradingView's length-prefixed framing (`~m~<len>~m~<json>`) over a
//! persistent websocket and drives the chart session protocol to retrieve historical
//! candles for one or more symbols, following pagination until each symbol completes.
//!
//! The pieces, leaves first:
//!
//! - [`websocket::codec`]: pure frame encode/decode including heartbeat echoes.
//! - [`websocket::handler`]: the transport task owning the socket.
//! - [`chartfeed_common::msgbus::EventBus`]: fan-out of decoded events to subscribers.
//! - [`websocket::client::connect`]: session bootstrap yielding a ready
//!   [`websocket::client::TradingViewConnection`].
//! - [`data::fetcher::fetch_candles`]: the symbol-by-symbol paginated candle retrieval.
//!
//! # Documentation
//!
//! - Crate docs: <https://docs.rs/chartfeed-tradingview>

#![deny(unsafe_code)]
#![deny(nonstandard_style)]
#![deny(missing_debug_implementations)]
#![deny(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod common;
pub mod config;
pub mod data;
pub mod websocket;
