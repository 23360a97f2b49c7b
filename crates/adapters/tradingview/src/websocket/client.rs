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

//! Connection handle and session bootstrap for the TradingView websocket.
//!
//! [`connect`] opens the socket, spawns the transport task and waits for the
//! server's session frame before presenting the auth token. The returned
//! [`TradingViewConnection`] is single-threaded: decoded events are published on
//! its [`EventBus`] one at a time, on the caller's task, by whichever operation
//! is currently driving the connection.

use std::{cell::RefCell, future::Future, rc::Rc, time::Duration};

use chartfeed_common::msgbus::{EventBus, Subscription};
use serde_json::Value;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{HeaderValue, header::ORIGIN},
    },
};
use tokio_util::sync::CancellationToken;

use super::{
    codec,
    error::{TradingViewWsError, TradingViewWsResult},
    handler::{HandlerCommand, TradingViewWsFeedHandler, TradingViewWsStream},
    messages::{TradingViewSession, TradingViewWsMessage, TransportEvent},
};
use crate::{common::enums::TradingViewCommand, config::TradingViewConfig};

/// Clonable handle for enqueuing commands on the transport task.
#[derive(Clone, Debug)]
pub struct TradingViewCommandSender {
    cmd_tx: mpsc::UnboundedSender<HandlerCommand>,
}

impl TradingViewCommandSender {
    pub(crate) fn new(cmd_tx: mpsc::UnboundedSender<HandlerCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Encodes `command` with `params` and enqueues it for immediate sending.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the transport task has stopped.
    pub fn send(&self, command: impl AsRef<str>, params: &[Value]) -> TradingViewWsResult<()> {
        let command = command.as_ref();
        tracing::debug!("Sending {command}");
        let text = codec::encode(command, params)?;
        self.cmd_tx
            .send(HandlerCommand::Send(text))
            .map_err(|_| TradingViewWsError::NotConnected)
    }

    fn disconnect(&self, ack: oneshot::Sender<TradingViewWsResult<()>>) -> bool {
        self.cmd_tx.send(HandlerCommand::Disconnect(ack)).is_ok()
    }
}

/// Bootstrap progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BootstrapState {
    AwaitingSession,
    Ready,
}

#[derive(Debug)]
struct SessionBootstrap {
    state: BootstrapState,
    auth_token: String,
    sender: TradingViewCommandSender,
    outcome: Option<TradingViewWsResult<TradingViewSession>>,
}

impl SessionBootstrap {
    fn new(auth_token: String, sender: TradingViewCommandSender) -> Self {
        Self {
            state: BootstrapState::AwaitingSession,
            auth_token,
            sender,
            outcome: None,
        }
    }

    fn handle_message(&mut self, msg: &TradingViewWsMessage) {
        if self.state == BootstrapState::Ready {
            return;
        }

        match msg {
            TradingViewWsMessage::Session(session) => {
                tracing::debug!("Session established: {}", session.session_id);
                let token = Value::String(self.auth_token.clone());
                let result = self
                    .sender
                    .send(TradingViewCommand::SetAuthToken, &[token])
                    .map(|()| session.clone());
                self.state = BootstrapState::Ready;
                self.outcome = Some(result);
            }
            TradingViewWsMessage::Event(event) => {
                tracing::trace!("Ignoring {} before session is established", event.event);
            }
        }
    }

    fn take_outcome(&mut self) -> Option<TradingViewWsResult<TradingViewSession>> {
        self.outcome.take()
    }
}

/// A ready TradingView websocket connection.
#[derive(Debug)]
pub struct TradingViewConnection {
    config: TradingViewConfig,
    bus: EventBus<TradingViewWsMessage>,
    sender: TradingViewCommandSender,
    out_rx: mpsc::UnboundedReceiver<TransportEvent>,
    task_handle: Option<JoinHandle<()>>,
    session: Option<TradingViewSession>,
    cancellation_token: CancellationToken,
}

/// Connects to the configured endpoint and completes the session bootstrap.
///
/// # Errors
///
/// Returns an error if the socket cannot be opened, the transport fails or the
/// server sends undecodable data before the session is established, or the
/// bootstrap exceeds `connect_timeout_secs`.
pub async fn connect(config: TradingViewConfig) -> TradingViewWsResult<TradingViewConnection> {
    tracing::info!("Connecting to {}", config.ws_url);
    let timeout = config.connect_timeout();

    let mut request = config.ws_url.as_str().into_client_request()?;
    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| TradingViewWsError::Transport(format!("Invalid origin header: {e}")))?;
    request.headers_mut().insert(ORIGIN, origin);

    let (stream, _response) = tokio::time::timeout(timeout, connect_async(request))
        .await
        .map_err(|_| TradingViewWsError::Timeout(format!("Connect exceeded {timeout:?}")))??;

    let mut connection = TradingViewConnection::from_stream(stream, config);
    connection.bootstrap().await?;

    tracing::info!("Connected");
    Ok(connection)
}

impl TradingViewConnection {
    fn from_stream(stream: TradingViewWsStream, config: TradingViewConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let handler = TradingViewWsFeedHandler::new(stream, cmd_rx, out_tx);
        let task_handle = tokio::spawn(handler.run());

        Self {
            config,
            bus: EventBus::new(),
            sender: TradingViewCommandSender::new(cmd_tx),
            out_rx,
            task_handle: Some(task_handle),
            session: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    async fn bootstrap(&mut self) -> TradingViewWsResult<()> {
        let bootstrap = Rc::new(RefCell::new(SessionBootstrap::new(
            self.config.auth_token.clone(),
            self.sender.clone(),
        )));
        let handler = bootstrap.clone();
        let subscription = self.subscribe(move |msg| handler.borrow_mut().handle_message(msg));

        // Only the session frame matters before readiness
        let deadline = Some(self.config.connect_timeout());
        let result = self
            .run_until_with(
                deadline,
                "Session bootstrap",
                || bootstrap.borrow_mut().take_outcome(),
                |e| !matches!(e, TradingViewWsError::UnknownEvent(_)),
            )
            .await;
        subscription.unsubscribe();

        self.session = Some(result?);
        Ok(())
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn config(&self) -> &TradingViewConfig {
        &self.config
    }

    /// Returns the session established during bootstrap.
    #[must_use]
    pub fn session(&self) -> Option<&TradingViewSession> {
        self.session.as_ref()
    }

    /// Returns the token cancelling operations driven on this connection.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    /// Registers `handler` for every message published on this connection.
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&TradingViewWsMessage) + 'static,
    {
        self.bus.subscribe(handler)
    }

    /// Encodes and enqueues a command.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails or the transport task has stopped.
    pub fn send(&self, command: impl AsRef<str>, params: &[Value]) -> TradingViewWsResult<()> {
        self.sender.send(command, params)
    }

    /// Returns a clonable command sender for use inside subscribers.
    #[must_use]
    pub fn sender(&self) -> TradingViewCommandSender {
        self.sender.clone()
    }

    /// Waits for the next transport item and publishes it to subscribers.
    ///
    /// # Errors
    ///
    /// Returns the transport or protocol error forwarded by the transport task,
    /// [`TradingViewWsError::ConnectionClosed`] once the socket has closed, or
    /// [`TradingViewWsError::NotConnected`] if the transport task has stopped.
    pub async fn dispatch_next(&mut self) -> TradingViewWsResult<()> {
        match self.out_rx.recv().await {
            Some(TransportEvent::Message(msg)) => {
                self.bus.publish(&msg);
                Ok(())
            }
            Some(TransportEvent::Error(e)) => Err(e),
            Some(TransportEvent::Closed) => Err(TradingViewWsError::ConnectionClosed),
            None => Err(TradingViewWsError::NotConnected),
        }
    }

    /// Dispatches events until `poll` yields an outcome.
    ///
    /// `poll` is checked before each dispatch. The loop stops early with
    /// [`TradingViewWsError::Cancelled`] when the cancellation token fires, or with
    /// [`TradingViewWsError::Timeout`] once `deadline` elapses.
    pub(crate) async fn run_until<T, F>(
        &mut self,
        deadline: Option<Duration>,
        operation: &str,
        poll: F,
    ) -> TradingViewWsResult<T>
    where
        F: FnMut() -> Option<TradingViewWsResult<T>>,
    {
        self.run_until_with(deadline, operation, poll, |_| true).await
    }

    /// Like [`Self::run_until`], skipping dispatch errors for which `is_fatal` is `false`.
    async fn run_until_with<T, F, E>(
        &mut self,
        deadline: Option<Duration>,
        operation: &str,
        mut poll: F,
        is_fatal: E,
    ) -> TradingViewWsResult<T>
    where
        F: FnMut() -> Option<TradingViewWsResult<T>>,
        E: Fn(&TradingViewWsError) -> bool,
    {
        let token = self.cancellation_token.clone();
        let drive = async {
            loop {
                if let Some(outcome) = poll() {
                    return outcome;
                }
                match self.dispatch_next().await {
                    Err(e) if !is_fatal(&e) => tracing::debug!("{operation}: ignoring {e}"),
                    result => result?,
                }
            }
        };
        let guarded = async {
            tokio::select! {
                () = token.cancelled() => Err(TradingViewWsError::Cancelled),
                result = drive => result,
            }
        };

        with_deadline(deadline, operation, guarded).await
    }

    /// Closes the socket and waits for the close handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket reports a transport error before closing,
    /// or the handshake exceeds `close_timeout_secs`.
    pub async fn close(mut self) -> TradingViewWsResult<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        let result = if self.sender.disconnect(ack_tx) {
            let timeout = self.config.close_timeout();
            match tokio::time::timeout(timeout, ack_rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => self.drain_transport_error(),
                Err(_) => Err(TradingViewWsError::Timeout(format!(
                    "Close exceeded {timeout:?}"
                ))),
            }
        } else {
            self.drain_transport_error()
        };

        if let Some(handle) = self.task_handle.take() {
            if result.is_ok() {
                let _ = handle.await;
            } else {
                handle.abort();
            }
        }

        match &result {
            Ok(()) => tracing::info!("Closed"),
            Err(e) => tracing::warn!("Close failed: {e}"),
        }
        result
    }

    /// The transport task has already stopped; report how the socket ended.
    fn drain_transport_error(&mut self) -> TradingViewWsResult<()> {
        while let Ok(event) = self.out_rx.try_recv() {
            if let TransportEvent::Error(e @ TradingViewWsError::Transport(_)) = event {
                return Err(e);
            }
        }
        Ok(())
    }
}

async fn with_deadline<T>(
    deadline: Option<Duration>,
    operation: &str,
    fut: impl Future<Output = TradingViewWsResult<T>>,
) -> TradingViewWsResult<T> {
    match deadline {
        Some(duration) => tokio::time::timeout(duration, fut).await.map_err(|_| {
            TradingViewWsError::Timeout(format!("{operation} exceeded {duration:?}"))
        })?,
        None => fut.await,
    }
}
