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

//! Candle data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::consts::{DEFAULT_TIMEFRAME_SECS, MAX_BATCH_SIZE};

/// One OHLCV price bar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time (UNIX seconds).
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Returns the bar open time as a UTC datetime, if representable.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// Bar record as delivered inside a `timescale_update` series payload.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct RawBar {
    /// Bar index within the series.
    #[serde(default)]
    pub i: Option<i64>,
    /// `[timestamp, open, high, low, close, volume]`.
    pub v: Vec<f64>,
}

/// Parameters of a historical candle fetch.
///
/// Only constructed through [`CandleRequest::new`], so `amount` and `timeframe`
/// are always positive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandleRequest {
    symbols: Vec<String>,
    amount: Option<usize>,
    timeframe: u64,
}

impl CandleRequest {
    /// Creates a new [`CandleRequest`] instance.
    ///
    /// `timeframe` defaults to 60 seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if any symbol is empty, or if `amount` or `timeframe` is zero.
    pub fn new(
        symbols: Vec<String>,
        amount: Option<usize>,
        timeframe: Option<u64>,
    ) -> anyhow::Result<Self> {
        if let Some(idx) = symbols.iter().position(|s| s.trim().is_empty()) {
            anyhow::bail!("Symbol at index {idx} is empty");
        }
        if amount == Some(0) {
            anyhow::bail!("`amount` must be positive when provided");
        }
        let timeframe = timeframe.unwrap_or(DEFAULT_TIMEFRAME_SECS);
        if timeframe == 0 {
            anyhow::bail!("`timeframe` must be positive");
        }

        Ok(Self {
            symbols,
            amount,
            timeframe,
        })
    }

    /// Symbols to fetch in order (e.g. `BINANCE:BTCUSDT`).
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Number of candles per symbol, unbounded when `None`.
    #[must_use]
    pub fn amount(&self) -> Option<usize> {
        self.amount
    }

    /// Candle timeframe in seconds.
    #[must_use]
    pub fn timeframe(&self) -> u64 {
        self.timeframe
    }

    /// Returns the number of candles requested per page, fixed for the whole request.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.amount.map_or(MAX_BATCH_SIZE, |amount| amount.min(MAX_BATCH_SIZE))
    }
}
