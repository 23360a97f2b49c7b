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

//! Integration tests for the TradingView websocket client using a mock Axum server.

use std::{
    collections::HashMap,
    net::SocketAddr,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::HeaderMap,
    response::Response,
    routing::get,
};
use chartfeed_common::testing::wait_until_async;
use chartfeed_tradingview::{
    config::TradingViewConfig,
    data::{fetcher::fetch_candles, models::CandleRequest},
    websocket::{
        client::{TradingViewConnection, connect},
        codec,
        error::TradingViewWsError,
        messages::TradingViewFrame,
    },
};
use rstest::rstest;
use serde_json::{Value, json};

const HEARTBEAT: &str = "~m~4~m~~h~1";

// ------------------------------------------------------------------------------------------------
// Test Data Helpers
// ------------------------------------------------------------------------------------------------

fn data_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_data")
}

fn load_json(filename: &str) -> Value {
    let content = std::fs::read_to_string(data_path().join(filename))
        .unwrap_or_else(|_| panic!("failed to read {filename}"));
    serde_json::from_str(&content).expect("invalid json")
}

/// Loads a named event fixture addressed to `chart_session`.
fn load_event(filename: &str, chart_session: &str) -> Value {
    let mut event = load_json(filename);
    event["p"][0] = json!(chart_session);
    event
}

fn generated_update(chart_session: &str, indexes: std::ops::Range<i64>) -> Value {
    let bars: Vec<Value> = indexes
        .map(|i| {
            let ts = (1_600_000_000 + i * 60) as f64;
            json!({ "i": i, "v": [ts, 1.0, 2.0, 0.5, 1.5, 100.0] })
        })
        .collect();
    json!({ "m": "timescale_update", "p": [chart_session, { "sds_1": { "s": bars } }] })
}

fn framed(values: &[Value]) -> String {
    values.iter().map(|v| codec::frame(&v.to_string())).collect()
}

fn symbols(names: &[&str]) -> Vec<String> {
    names.iter().map(ToString::to_string).collect()
}

// ------------------------------------------------------------------------------------------------
// Test Server State
// ------------------------------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
enum Scenario {
    /// One page of fixture bars per series.
    #[default]
    Standard,
    /// A full first page, then a short older page.
    Paged,
    /// Drops the socket without a close handshake once a series is requested.
    DropOnSeries,
    /// Answers a series request with an unrecognized event.
    UnknownEventOnSeries,
    /// Never answers series requests.
    Silent,
    /// Never sends the session frame.
    NoSession,
    /// Closes the socket before sending the session frame.
    CloseBeforeSession,
    /// Sends an undecodable frame before the session frame.
    MalformedBeforeSession,
}

#[derive(Default)]
struct TestServerState {
    scenario: Scenario,
    commands: tokio::sync::Mutex<Vec<(String, Vec<Value>)>>,
    heartbeat_echoes: tokio::sync::Mutex<Vec<String>>,
    origin: tokio::sync::Mutex<Option<String>>,
    close_received: AtomicBool,
}

impl TestServerState {
    fn new(scenario: Scenario) -> Arc<Self> {
        Arc::new(Self {
            scenario,
            ..Default::default()
        })
    }

    async fn command_names(&self) -> Vec<String> {
        self.commands
            .lock()
            .await
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    async fn commands_named(&self, name: &str) -> Vec<Vec<Value>> {
        self.commands
            .lock()
            .await
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

enum Reply {
    Frames(Vec<Value>),
    Drop,
}

/// Per-socket protocol state of the mock server.
#[derive(Default)]
struct MockSession {
    chart_session: String,
    symbols: HashMap<String, String>,
}

impl MockSession {
    fn reply(&mut self, scenario: Scenario, name: &str, params: &[Value]) -> Reply {
        let param = |idx: usize| params.get(idx).and_then(Value::as_str).unwrap_or_default();
        let cs = self.chart_session.clone();

        match name {
            "chart_create_session" => {
                self.chart_session = param(0).to_string();
                Reply::Frames(Vec::new())
            }
            "resolve_symbol" => {
                let descriptor: Value =
                    serde_json::from_str(param(2).trim_start_matches('=')).expect("descriptor");
                let symbol = descriptor["symbol"].as_str().unwrap_or_default();
                self.symbols.insert(param(1).to_string(), symbol.to_string());
                Reply::Frames(Vec::new())
            }
            "create_series" | "modify_series" => {
                let symbol = self.symbols.get(param(3)).cloned().unwrap_or_default();
                match scenario {
                    Scenario::Silent
                    | Scenario::NoSession
                    | Scenario::CloseBeforeSession
                    | Scenario::MalformedBeforeSession => Reply::Frames(Vec::new()),
                    Scenario::DropOnSeries => Reply::Drop,
                    Scenario::UnknownEventOnSeries => {
                        Reply::Frames(vec![json!({ "m": "brand_new_event", "p": [cs] })])
                    }
                    _ if symbol.contains("BAD") => {
                        let mut error = load_event("ws_symbol_error.json", &cs);
                        error["p"][1] = json!(param(3));
                        Reply::Frames(vec![error])
                    }
                    Scenario::Paged => Reply::Frames(vec![
                        generated_update(&cs, 100..5_100),
                        load_event("ws_series_completed.json", &cs),
                    ]),
                    Scenario::Standard => Reply::Frames(vec![
                        load_event("ws_timescale_update.json", &cs),
                        load_event("ws_series_completed.json", &cs),
                    ]),
                }
            }
            "request_more_data" if scenario == Scenario::Paged => Reply::Frames(vec![
                generated_update(&cs, 0..100),
                load_event("ws_series_completed.json", &cs),
            ]),
            _ => Reply::Frames(Vec::new()),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Mock WebSocket Handler
// ------------------------------------------------------------------------------------------------

async fn handle_ws_upgrade(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<Arc<TestServerState>>,
) -> Response {
    let origin = headers
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    *state.origin.lock().await = origin;
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<TestServerState>) {
    match state.scenario {
        Scenario::CloseBeforeSession => {
            let _ = socket.send(Message::Close(None)).await;
            // Drain until the client acknowledges the close
            while let Some(Ok(_)) = socket.recv().await {}
            return;
        }
        Scenario::MalformedBeforeSession => {
            let _ = socket.send(Message::Text("~m~5~m~{oops".into())).await;
        }
        _ => {}
    }

    if !matches!(
        state.scenario,
        Scenario::NoSession | Scenario::CloseBeforeSession | Scenario::MalformedBeforeSession
    ) {
        let session = codec::frame(&load_json("ws_session.json").to_string());
        let _ = socket.send(Message::Text(session.into())).await;
        let _ = socket.send(Message::Text(HEARTBEAT.into())).await;
    }

    let mut session = MockSession::default();

    while let Some(Ok(message)) = socket.recv().await {
        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => {
                state.close_received.store(true, Ordering::Relaxed);
                continue;
            }
            _ => continue,
        };

        for frame in codec::decode(&text).expect("client sent an invalid frame") {
            match frame {
                TradingViewFrame::Heartbeat { .. } => {
                    state.heartbeat_echoes.lock().await.push(text.clone());
                }
                TradingViewFrame::SessionEstablished(_) => panic!("client sent a session frame"),
                TradingViewFrame::NamedEvent { name, params } => {
                    let reply = session.reply(state.scenario, &name, &params);
                    state.commands.lock().await.push((name, params));

                    match reply {
                        Reply::Drop => return,
                        Reply::Frames(frames) if frames.is_empty() => {}
                        // Multiple frames share one websocket message
                        Reply::Frames(frames) => {
                            let _ = socket.send(Message::Text(framed(&frames).into())).await;
                        }
                    }
                }
            }
        }
    }
}

async fn start_ws_server(state: Arc<TestServerState>) -> SocketAddr {
    let router = Router::new()
        .route("/socket.io/websocket", get(handle_ws_upgrade))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind websocket listener");
    let addr = listener.local_addr().expect("missing local addr");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("websocket server failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

fn test_config(addr: SocketAddr) -> TradingViewConfig {
    TradingViewConfig {
        connect_timeout_secs: 2,
        fetch_timeout_secs: Some(5),
        close_timeout_secs: 2,
        ..Default::default()
    }
    .with_ws_url(format!("ws://{addr}/socket.io/websocket"))
}

async fn connect_to(scenario: Scenario) -> (Arc<TestServerState>, TradingViewConnection) {
    let state = TestServerState::new(scenario);
    let addr = start_ws_server(state.clone()).await;
    let connection = connect(test_config(addr)).await.expect("connect failed");
    (state, connection)
}

// ------------------------------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------------------------------

#[tokio::test]
async fn test_connect_establishes_session() {
    let (state, connection) = connect_to(Scenario::Standard).await;

    let session = connection.session().expect("missing session");
    assert_eq!(
        session.session_id,
        "<0.2141.1037>_fra-charts-free-5-webchart-8@fra-compute-5-webchart-8"
    );
    assert_eq!(session.timestamp, Some(1_700_000_000));

    wait_until_async(
        || {
            let state = state.clone();
            async move { !state.commands.lock().await.is_empty() }
        },
        Duration::from_secs(2),
    )
    .await;
    assert_eq!(
        state.commands.lock().await[0],
        (
            "set_auth_token".to_string(),
            vec![json!("unauthorized_user_token")]
        )
    );
    assert_eq!(
        state.origin.lock().await.as_deref(),
        Some("https://prodata.tradingview.com")
    );

    connection.close().await.expect("close failed");
    wait_until_async(
        || {
            let state = state.clone();
            async move { state.close_received.load(Ordering::Relaxed) }
        },
        Duration::from_secs(2),
    )
    .await;
}

#[tokio::test]
async fn test_heartbeat_is_echoed_verbatim() {
    let (state, connection) = connect_to(Scenario::Standard).await;

    wait_until_async(
        || {
            let state = state.clone();
            async move { !state.heartbeat_echoes.lock().await.is_empty() }
        },
        Duration::from_secs(2),
    )
    .await;
    assert_eq!(*state.heartbeat_echoes.lock().await, vec![HEARTBEAT.to_string()]);

    connection.close().await.expect("close failed");
}

#[tokio::test]
async fn test_fetch_candles_for_two_symbols() {
    let (state, mut connection) = connect_to(Scenario::Standard).await;
    let request = CandleRequest::new(
        symbols(&["BINANCE:BTCUSDT", "BINANCE:ETHUSDT"]),
        Some(3),
        Some(60),
    )
    .unwrap();

    let results = fetch_candles(&mut connection, request).await.expect("fetch failed");

    assert_eq!(results.len(), 2);
    for candles in &results {
        let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        assert_eq!(timestamps, vec![1_700_000_040, 1_700_000_100, 1_700_000_160]);
    }
    let first = results[0][0];
    assert_eq!(first.open, 36_500.5);
    assert_eq!(first.high, 36_520.0);
    assert_eq!(first.low, 36_490.25);
    assert_eq!(first.close, 36_510.0);
    assert_eq!(first.volume, 12.345);

    let names = state.command_names().await;
    assert_eq!(
        names,
        vec![
            "set_auth_token",
            "chart_create_session",
            "quote_create_session",
            "quote_set_fields",
            "quote_add_symbols",
            "quote_fast_symbols",
            "resolve_symbol",
            "create_series",
            "resolve_symbol",
            "modify_series",
        ]
    );

    connection.close().await.expect("close failed");
}

#[tokio::test]
async fn test_fetch_candles_follows_pagination() {
    let (state, mut connection) = connect_to(Scenario::Paged).await;
    let request = CandleRequest::new(symbols(&["BINANCE:BTCUSDT"]), None, None).unwrap();

    let results = fetch_candles(&mut connection, request).await.expect("fetch failed");

    assert_eq!(results.len(), 1);
    let candles = &results[0];
    assert_eq!(candles.len(), 5_100);
    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));

    let more = state.commands_named("request_more_data").await;
    assert_eq!(more.len(), 1);
    assert_eq!(more[0][1], json!("sds_1"));
    assert_eq!(more[0][2], json!(5_000));

    let series = state.commands_named("create_series").await;
    assert_eq!(series[0][5], json!(5_000));

    connection.close().await.expect("close failed");
}

#[tokio::test]
async fn test_symbol_error_yields_empty_series() {
    let (_state, mut connection) = connect_to(Scenario::Standard).await;
    let request = CandleRequest::new(
        symbols(&["BINANCE:BADPAIR", "BINANCE:BTCUSDT"]),
        Some(3),
        None,
    )
    .unwrap();

    let results = fetch_candles(&mut connection, request).await.expect("fetch failed");

    assert_eq!(results.len(), 2);
    assert!(results[0].is_empty());
    assert_eq!(results[1].len(), 3);

    connection.close().await.expect("close failed");
}

#[tokio::test]
async fn test_fetch_without_symbols_sends_nothing() {
    let (state, mut connection) = connect_to(Scenario::Standard).await;
    let request = CandleRequest::new(Vec::new(), None, None).unwrap();

    let results = fetch_candles(&mut connection, request).await.expect("fetch failed");
    assert!(results.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(state.command_names().await, vec!["set_auth_token"]);

    connection.close().await.expect("close failed");
}

#[rstest]
#[case(Scenario::DropOnSeries)]
#[case(Scenario::UnknownEventOnSeries)]
#[tokio::test]
async fn test_fetch_fails_instead_of_hanging(#[case] scenario: Scenario) {
    let (_state, mut connection) = connect_to(scenario).await;
    let request = CandleRequest::new(symbols(&["BINANCE:BTCUSDT"]), Some(3), None).unwrap();

    let err = fetch_candles(&mut connection, request)
        .await
        .expect_err("fetch should fail");

    match scenario {
        Scenario::DropOnSeries => assert!(
            matches!(
                err,
                TradingViewWsError::Transport(_) | TradingViewWsError::ConnectionClosed
            ),
            "unexpected error {err:?}"
        ),
        _ => assert!(
            matches!(err, TradingViewWsError::UnknownEvent(ref name) if name == "brand_new_event"),
            "unexpected error {err:?}"
        ),
    }
}

#[tokio::test]
async fn test_fetch_times_out() {
    let state = TestServerState::new(Scenario::Silent);
    let addr = start_ws_server(state).await;
    let config = TradingViewConfig {
        fetch_timeout_secs: Some(1),
        ..test_config(addr)
    };
    let mut connection = connect(config).await.expect("connect failed");
    let request = CandleRequest::new(symbols(&["BINANCE:BTCUSDT"]), Some(3), None).unwrap();

    let err = fetch_candles(&mut connection, request)
        .await
        .expect_err("fetch should time out");
    assert!(matches!(err, TradingViewWsError::Timeout(_)), "{err:?}");

    connection.close().await.expect("close failed");
}

#[tokio::test]
async fn test_fetch_is_cancelled() {
    let (_state, mut connection) = connect_to(Scenario::Silent).await;
    let request = CandleRequest::new(symbols(&["BINANCE:BTCUSDT"]), Some(3), None).unwrap();

    let token = connection.cancellation_token().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let err = fetch_candles(&mut connection, request)
        .await
        .expect_err("fetch should be cancelled");
    assert!(matches!(err, TradingViewWsError::Cancelled), "{err:?}");
}

#[tokio::test]
async fn test_connect_times_out_without_session() {
    let state = TestServerState::new(Scenario::NoSession);
    let addr = start_ws_server(state).await;
    let config = TradingViewConfig {
        connect_timeout_secs: 1,
        ..test_config(addr)
    };

    let err = connect(config).await.expect_err("connect should time out");
    assert!(matches!(err, TradingViewWsError::Timeout(_)), "{err:?}");
}

#[tokio::test]
async fn test_connect_fails_when_closed_before_session() {
    let state = TestServerState::new(Scenario::CloseBeforeSession);
    let addr = start_ws_server(state).await;

    let err = connect(test_config(addr))
        .await
        .expect_err("connect should fail");
    assert!(matches!(err, TradingViewWsError::ConnectionClosed), "{err:?}");
}

#[tokio::test]
async fn test_connect_fails_on_malformed_frame_before_session() {
    let state = TestServerState::new(Scenario::MalformedBeforeSession);
    let addr = start_ws_server(state).await;

    let err = connect(test_config(addr))
        .await
        .expect_err("connect should fail");
    assert!(
        matches!(err, TradingViewWsError::Protocol(ref msg) if msg.starts_with("Invalid frame payload")),
        "{err:?}"
    );
}

#[tokio::test]
async fn test_connect_refused() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = connect(test_config(addr))
        .await
        .expect_err("connect should fail");
    assert!(matches!(err, TradingViewWsError::Transport(_)), "{err:?}");
}
