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

//! Parsing and identifier helpers for the TradingView protocol.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    common::consts::{SERIES_TURNAROUND_PREFIX, SESSION_ID_LEN, SYMBOL_ADJUSTMENT, SYMBOL_REF_PREFIX},
    data::models::{Candle, RawBar},
    websocket::error::{TradingViewWsError, TradingViewWsResult},
};

/// Generates a session identifier: `prefix` followed by random lowercase ASCII letters.
#[must_use]
pub fn generate_session_id(prefix: &str) -> String {
    let mut rng = rand::rng();
    let mut id = String::with_capacity(prefix.len() + SESSION_ID_LEN);
    id.push_str(prefix);
    for _ in 0..SESSION_ID_LEN {
        id.push(rng.random_range('a'..='z'));
    }
    id
}

/// Returns the symbol reference key for the symbol at `index` (`sds_sym_<index>`).
#[must_use]
pub fn symbol_ref(index: usize) -> String {
    format!("{SYMBOL_REF_PREFIX}{index}")
}

/// Returns the series turnaround key for the symbol at `index` (`s<index>`).
#[must_use]
pub fn series_turnaround(index: usize) -> String {
    format!("{SERIES_TURNAROUND_PREFIX}{index}")
}

#[derive(Serialize)]
struct SymbolDescriptor<'a> {
    symbol: &'a str,
    adjustment: &'a str,
}

/// Builds the `resolve_symbol` descriptor parameter: `=` followed by
/// `{"symbol":<symbol>,"adjustment":"splits"}`.
///
/// # Errors
///
/// Returns an error if the descriptor cannot be serialized.
pub fn resolve_symbol_param(symbol: &str) -> TradingViewWsResult<String> {
    let descriptor = serde_json::to_string(&SymbolDescriptor {
        symbol,
        adjustment: SYMBOL_ADJUSTMENT,
    })?;
    Ok(format!("={descriptor}"))
}

/// Extracts the bars delivered for `series_id` from `timescale_update` parameters.
///
/// Returns `Ok(None)` when the update carries no data for the series.
///
/// # Errors
///
/// Returns [`TradingViewWsError::Protocol`] if the payload is missing or malformed.
pub fn parse_series_bars(
    params: &[Value],
    series_id: &str,
) -> TradingViewWsResult<Option<Vec<RawBar>>> {
    let payload = params.get(1).ok_or_else(|| {
        TradingViewWsError::Protocol("timescale_update without payload".to_string())
    })?;
    let Some(series) = payload.get(series_id) else {
        return Ok(None);
    };
    let Some(bars) = series.get("s") else {
        return Ok(Some(Vec::new()));
    };

    Vec::<RawBar>::deserialize(bars)
        .map(Some)
        .map_err(|e| TradingViewWsError::Protocol(format!("Invalid bars for {series_id}: {e}")))
}

/// Converts a raw bar into a [`Candle`]; a missing volume is treated as zero.
///
/// # Errors
///
/// Returns [`TradingViewWsError::Protocol`] if the bar has fewer than five values.
pub fn parse_candle(bar: &RawBar) -> TradingViewWsResult<Candle> {
    let [timestamp, open, high, low, close, rest @ ..] = bar.v.as_slice() else {
        return Err(TradingViewWsError::Protocol(format!(
            "Bar has {} values, expected at least 5",
            bar.v.len()
        )));
    };

    Ok(Candle {
        timestamp: *timestamp as i64,
        open: *open,
        high: *high,
        low: *low,
        close: *close,
        volume: rest.first().copied().unwrap_or(0.0),
    })
}
