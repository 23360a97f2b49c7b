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

//! Example fetching historical candles from TradingView and printing their RSI.
//!
//! Symbols are taken from the command line (default `BINANCE:BTCUSDT`).
//! `TRADINGVIEW_WS_URL` and `TRADINGVIEW_AUTH_TOKEN` may be set in the
//! environment or a `.env` file. Press Ctrl+C to cancel the fetch.

use chartfeed_indicators::momentum::RelativeStrengthIndex;
use chartfeed_tradingview::{
    config::TradingViewConfig,
    data::{fetcher::fetch_candles, models::CandleRequest},
    websocket::client::connect,
};
use tracing_subscriber::EnvFilter;

const AMOUNT: usize = 100;
const TIMEFRAME_SECS: u64 = 60;
const RSI_PERIOD: usize = 14;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let mut symbols: Vec<String> = std::env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols.push("BINANCE:BTCUSDT".to_string());
    }
    let request = CandleRequest::new(symbols.clone(), Some(AMOUNT), Some(TIMEFRAME_SECS))?;

    let mut connection = connect(TradingViewConfig::from_env()).await?;

    let token = connection.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, cancelling");
            token.cancel();
        }
    });

    let fetched = fetch_candles(&mut connection, request).await;
    let closed = connection.close().await;
    let results = fetched?;

    let rsi = RelativeStrengthIndex::new(RSI_PERIOD);
    for (symbol, candles) in symbols.iter().zip(&results) {
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let points = rsi.calculate(&closes);

        println!("{symbol}: {} candles", candles.len());
        for (candle, point) in candles.iter().zip(&points) {
            let time = candle
                .datetime()
                .map_or_else(|| candle.timestamp.to_string(), |dt| dt.to_rfc3339());
            let value = point
                .rsi
                .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
            println!("  {time}  close={:<12} {rsi}={value}", candle.close);
        }
    }

    closed?;
    Ok(())
}
