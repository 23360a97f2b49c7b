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

//! Paginated historical candle retrieval.
//!
//! A [`CandleFetcher`] is the per-request state machine. It subscribes to the
//! connection's event bus, issues the chart and quote session setup, then walks
//! the requested symbols one at a time: bars from `timescale_update` are
//! prepended to the current symbol's buffer, and each `series_completed` (or
//! `symbol_error`) either requests another page or finalizes the symbol and
//! moves the series on to the next one.

use std::{cell::RefCell, rc::Rc};

use chartfeed_common::msgbus::Subscription;
use serde_json::{Value, json};

use crate::{
    common::{
        consts::{
            CHART_SESSION_PREFIX, QUOTE_FIELDS, QUOTE_SESSION_PREFIX, QUOTE_SYMBOL_FLAGS,
            SERIES_ID,
        },
        enums::{TradingViewCommand, TradingViewEvent},
        parse::{
            generate_session_id, parse_candle, parse_series_bars, resolve_symbol_param,
            series_turnaround, symbol_ref,
        },
    },
    data::models::{Candle, CandleRequest, RawBar},
    websocket::{
        client::{TradingViewCommandSender, TradingViewConnection},
        error::{TradingViewWsError, TradingViewWsResult},
        messages::{TradingViewWsEvent, TradingViewWsMessage},
    },
};

/// Candles per symbol, in request order.
pub type CandleResults = Vec<Vec<Candle>>;

/// Mutable progress of one fetch.
#[derive(Clone, Debug, Default)]
pub struct FetchState {
    /// Index of the symbol currently loading.
    pub symbol_index: usize,
    /// Bars received for the current symbol, oldest page first.
    pub buffer: Vec<RawBar>,
    /// Finalized candles for each completed symbol.
    pub completed: CandleResults,
}

/// Returns whether another page should be requested after `loaded` bars.
#[must_use]
pub fn needs_more_data(loaded: usize, batch_size: usize, amount: Option<usize>) -> bool {
    loaded > 0 && loaded % batch_size == 0 && amount.is_none_or(|amount| loaded < amount)
}

/// Prepends `batch` onto `buffer`.
///
/// A batch longer than `batch_size` carries a redelivered overlap: as many bars
/// as `buffer` already holds are dropped from its tail first.
pub fn merge_batch(buffer: &mut Vec<RawBar>, mut batch: Vec<RawBar>, batch_size: usize) {
    if batch.len() > batch_size {
        let keep = batch.len().saturating_sub(buffer.len());
        tracing::trace!(
            "Trimming redelivered overlap of {} bars",
            batch.len() - keep
        );
        batch.truncate(keep);
    }
    batch.append(buffer);
    *buffer = batch;
}

/// Per-request candle fetch state machine.
#[derive(Debug)]
pub struct CandleFetcher {
    request: CandleRequest,
    batch_size: usize,
    chart_session: String,
    quote_session: String,
    sender: TradingViewCommandSender,
    state: FetchState,
    // Buffer length when the last page was requested
    requested_at: Option<usize>,
    subscription: Option<Subscription>,
    outcome: Option<TradingViewWsResult<CandleResults>>,
}

impl CandleFetcher {
    /// Creates a new [`CandleFetcher`] with fresh chart and quote session identifiers.
    #[must_use]
    pub fn new(request: CandleRequest, sender: TradingViewCommandSender) -> Self {
        Self {
            batch_size: request.batch_size(),
            request,
            chart_session: generate_session_id(CHART_SESSION_PREFIX),
            quote_session: generate_session_id(QUOTE_SESSION_PREFIX),
            sender,
            state: FetchState::default(),
            requested_at: None,
            subscription: None,
            outcome: None,
        }
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn chart_session(&self) -> &str {
        &self.chart_session
    }

    #[must_use]
    pub fn quote_session(&self) -> &str {
        &self.quote_session
    }

    #[must_use]
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// Stores the event bus subscription feeding this fetcher, released on completion.
    pub fn attach(&mut self, subscription: Subscription) {
        self.subscription = Some(subscription);
    }

    /// Releases the event bus subscription, if still held.
    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    /// Takes the final result once available.
    pub fn take_outcome(&mut self) -> Option<TradingViewWsResult<CandleResults>> {
        self.outcome.take()
    }

    /// Issues the session setup for the first symbol.
    ///
    /// # Errors
    ///
    /// Returns an error if a command cannot be sent.
    pub fn start(&mut self) -> TradingViewWsResult<()> {
        let Some(symbol) = self.request.symbols().first().cloned() else {
            self.complete(Ok(Vec::new()));
            return Ok(());
        };
        tracing::debug!(
            chart_session = %self.chart_session,
            quote_session = %self.quote_session,
            batch_size = self.batch_size,
            "Starting fetch of {} symbols",
            self.request.symbols().len()
        );

        let cs = Value::from(self.chart_session.as_str());
        let qs = Value::from(self.quote_session.as_str());
        let sym = Value::from(symbol.as_str());

        self.send(TradingViewCommand::ChartCreateSession, &[cs.clone(), json!("")])?;
        self.send(TradingViewCommand::QuoteCreateSession, &[qs.clone()])?;

        let mut fields = vec![qs.clone()];
        fields.extend(QUOTE_FIELDS.iter().map(|field| Value::from(*field)));
        self.send(TradingViewCommand::QuoteSetFields, &fields)?;

        self.send(
            TradingViewCommand::QuoteAddSymbols,
            &[qs.clone(), sym.clone(), json!({ "flags": QUOTE_SYMBOL_FLAGS })],
        )?;
        self.send(TradingViewCommand::QuoteFastSymbols, &[qs, sym])?;

        self.send_resolve_symbol(0, &symbol)?;
        self.send(
            TradingViewCommand::CreateSeries,
            &[
                cs,
                json!(SERIES_ID),
                json!(series_turnaround(0)),
                json!(symbol_ref(0)),
                json!(self.request.timeframe().to_string()),
                json!(self.batch_size),
                json!(""),
            ],
        )
    }

    /// Applies one published message; failures end the fetch.
    pub fn handle_message(&mut self, msg: &TradingViewWsMessage) {
        if self.outcome.is_some() {
            return;
        }
        let TradingViewWsMessage::Event(event) = msg else {
            return;
        };

        if let Err(e) = self.handle_event(event) {
            tracing::error!("Fetch failed: {e}");
            self.complete(Err(e));
        }
    }

    fn handle_event(&mut self, event: &TradingViewWsEvent) -> TradingViewWsResult<()> {
        if event.event.is_fatal() {
            return Err(TradingViewWsError::Server {
                event: event.event.to_string(),
                message: Value::from(event.params.clone()).to_string(),
            });
        }
        if self.is_foreign(&event.params) {
            return Ok(());
        }

        match event.event {
            TradingViewEvent::TimescaleUpdate => self.on_timescale_update(&event.params),
            kind if kind.is_series_end() => {
                if kind != TradingViewEvent::SeriesCompleted {
                    tracing::warn!(
                        "{kind} for {}: {:?}",
                        self.current_symbol(),
                        event.params.get(2)
                    );
                }
                self.on_series_end()
            }
            _ => Ok(()),
        }
    }

    /// Events addressed to another chart session.
    fn is_foreign(&self, params: &[Value]) -> bool {
        matches!(
            params.first(),
            Some(Value::String(session))
                if session.starts_with(CHART_SESSION_PREFIX) && *session != self.chart_session
        )
    }

    fn on_timescale_update(&mut self, params: &[Value]) -> TradingViewWsResult<()> {
        let Some(batch) = parse_series_bars(params, SERIES_ID)? else {
            return Ok(());
        };
        tracing::debug!(
            "Received {} bars for {}",
            batch.len(),
            self.current_symbol()
        );
        merge_batch(&mut self.state.buffer, batch, self.batch_size);
        Ok(())
    }

    fn on_series_end(&mut self) -> TradingViewWsResult<()> {
        let loaded = self.state.buffer.len();
        if self.requested_at == Some(loaded) {
            tracing::debug!(
                "No more history for {} after {loaded} bars",
                self.current_symbol()
            );
        } else if needs_more_data(loaded, self.batch_size, self.request.amount()) {
            self.requested_at = Some(loaded);
            tracing::debug!(
                "Loaded {loaded} bars for {}, requesting more",
                self.current_symbol()
            );
            return self.send(
                TradingViewCommand::RequestMoreData,
                &[
                    json!(self.chart_session),
                    json!(SERIES_ID),
                    json!(self.batch_size),
                ],
            );
        }

        self.finalize_symbol()
    }

    fn finalize_symbol(&mut self) -> TradingViewWsResult<()> {
        self.requested_at = None;
        let mut bars = std::mem::take(&mut self.state.buffer);
        if let Some(amount) = self.request.amount() {
            bars.truncate(amount);
        }
        let candles = bars
            .iter()
            .map(parse_candle)
            .collect::<TradingViewWsResult<Vec<_>>>()?;
        tracing::debug!(
            "Completed {} with {} candles",
            self.current_symbol(),
            candles.len()
        );
        self.state.completed.push(candles);

        let next = self.state.symbol_index + 1;
        match self.request.symbols().get(next).cloned() {
            Some(symbol) => {
                self.state.symbol_index = next;
                self.send_resolve_symbol(next, &symbol)?;
                self.send(
                    TradingViewCommand::ModifySeries,
                    &[
                        json!(self.chart_session),
                        json!(SERIES_ID),
                        json!(series_turnaround(next)),
                        json!(symbol_ref(next)),
                        json!(self.request.timeframe().to_string()),
                        json!(""),
                    ],
                )
            }
            None => {
                let results = std::mem::take(&mut self.state.completed);
                self.complete(Ok(results));
                Ok(())
            }
        }
    }

    fn send_resolve_symbol(&self, index: usize, symbol: &str) -> TradingViewWsResult<()> {
        self.send(
            TradingViewCommand::ResolveSymbol,
            &[
                json!(self.chart_session),
                json!(symbol_ref(index)),
                json!(resolve_symbol_param(symbol)?),
            ],
        )
    }

    fn send(&self, command: TradingViewCommand, params: &[Value]) -> TradingViewWsResult<()> {
        self.sender.send(command, params)
    }

    fn current_symbol(&self) -> &str {
        self.request
            .symbols()
            .get(self.state.symbol_index)
            .map_or("", String::as_str)
    }

    fn complete(&mut self, result: TradingViewWsResult<CandleResults>) {
        self.detach();
        self.outcome = Some(result);
    }
}

/// Fetches candles for every symbol in `request`, in order.
///
/// Drives `connection` until the last symbol completes. Bounded by the
/// connection's `fetch_timeout_secs` and its cancellation token.
///
/// # Errors
///
/// Returns an error if a command cannot be sent, the transport fails or closes,
/// the server reports a session failure or sends an unknown event, or the fetch
/// times out or is cancelled.
pub async fn fetch_candles(
    connection: &mut TradingViewConnection,
    request: CandleRequest,
) -> TradingViewWsResult<CandleResults> {
    if request.symbols().is_empty() {
        tracing::debug!("No symbols requested");
        return Ok(Vec::new());
    }

    let fetcher = Rc::new(RefCell::new(CandleFetcher::new(request, connection.sender())));
    let handler = fetcher.clone();
    let subscription = connection.subscribe(move |msg| handler.borrow_mut().handle_message(msg));
    fetcher.borrow_mut().attach(subscription);

    let started = fetcher.borrow_mut().start();
    if let Err(e) = started {
        fetcher.borrow_mut().detach();
        return Err(e);
    }

    let deadline = connection.config().fetch_timeout();
    let result = connection
        .run_until(deadline, "Candle fetch", || fetcher.borrow_mut().take_outcome())
        .await;

    // Transport failure, timeout and cancellation leave the subscription behind
    fetcher.borrow_mut().detach();
    result
}
