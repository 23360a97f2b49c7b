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

//! Websocket transport task for TradingView.
//!
//! The handler runs in a dedicated Tokio task as the I/O boundary between the
//! connection and the network. It exclusively owns the socket, receives commands
//! from the connection over an unbounded channel, answers heartbeats itself and
//! forwards every other decoded frame to the connection in arrival order.

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{self, Message},
};

use super::{
    codec,
    error::{TradingViewWsError, TradingViewWsResult},
    messages::{TradingViewFrame, TradingViewWsEvent, TradingViewWsMessage, TransportEvent},
};

pub type TradingViewWsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Commands sent from the connection to the handler.
#[derive(Debug)]
pub enum HandlerCommand {
    /// Write an already framed payload to the socket.
    Send(String),
    /// Start the close handshake; the sender is completed once the socket has closed.
    Disconnect(oneshot::Sender<TradingViewWsResult<()>>),
}

/// TradingView websocket feed handler.
#[allow(missing_debug_implementations)]
pub struct TradingViewWsFeedHandler {
    writer: SplitSink<TradingViewWsStream, Message>,
    reader: SplitStream<TradingViewWsStream>,
    cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
    out_tx: mpsc::UnboundedSender<TransportEvent>,
    close_ack: Option<oneshot::Sender<TradingViewWsResult<()>>>,
}

impl TradingViewWsFeedHandler {
    /// Creates a new feed handler owning `stream`.
    #[must_use]
    pub fn new(
        stream: TradingViewWsStream,
        cmd_rx: mpsc::UnboundedReceiver<HandlerCommand>,
        out_tx: mpsc::UnboundedSender<TransportEvent>,
    ) -> Self {
        let (writer, reader) = stream.split();
        Self {
            writer,
            reader,
            cmd_rx,
            out_tx,
            close_ack: None,
        }
    }

    /// Runs the handler until the socket closes or the connection is dropped.
    pub async fn run(mut self) {
        loop {
            let keep_running = tokio::select! {
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(cmd) => {
                        self.process_command(cmd).await;
                        true
                    }
                    None => {
                        tracing::debug!("Connection dropped, closing websocket");
                        let _ = self.writer.close().await;
                        false
                    }
                },
                msg = self.reader.next() => self.process_socket_message(msg).await,
            };

            if !keep_running {
                break;
            }
        }
        tracing::debug!("Handler task exiting");
    }

    async fn process_command(&mut self, cmd: HandlerCommand) {
        match cmd {
            HandlerCommand::Send(text) => {
                tracing::trace!("Sending: {text}");
                if let Err(e) = self.send_text(text).await {
                    tracing::error!("Failed to send message: {e}");
                    self.forward(TransportEvent::Error(e));
                }
            }
            HandlerCommand::Disconnect(ack) => {
                tracing::debug!("Closing websocket");
                if let Err(e) = self.writer.close().await {
                    let _ = ack.send(Err(TradingViewWsError::from(e)));
                    return;
                }
                // Completed once the peer acknowledges and the stream ends
                self.close_ack = Some(ack);
            }
        }
    }

    /// Returns `false` once the socket is finished.
    async fn process_socket_message(
        &mut self,
        msg: Option<Result<Message, tungstenite::Error>>,
    ) -> bool {
        match msg {
            Some(Ok(Message::Text(text))) => {
                self.process_text(text.as_str()).await;
                true
            }
            Some(Ok(Message::Binary(data))) => {
                match std::str::from_utf8(&data) {
                    Ok(text) => self.process_text(text).await,
                    Err(e) => self.forward(TransportEvent::Error(TradingViewWsError::Protocol(
                        format!("Binary frame is not UTF-8: {e}"),
                    ))),
                }
                true
            }
            Some(Ok(Message::Ping(payload))) => {
                if let Err(e) = self.writer.send(Message::Pong(payload)).await {
                    tracing::warn!("Failed to answer ping: {e}");
                }
                true
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::debug!("Received close frame: {frame:?}");
                true
            }
            Some(Ok(Message::Pong(_) | Message::Frame(_))) => true,
            Some(Err(tungstenite::Error::ConnectionClosed)) | None => {
                self.finish(Ok(()));
                false
            }
            Some(Err(e)) => {
                tracing::error!("Websocket error: {e}");
                self.finish(Err(TradingViewWsError::from(e)));
                false
            }
        }
    }

    async fn process_text(&mut self, text: &str) {
        tracing::trace!("Received: {text}");
        let frames = match codec::decode(text) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::error!("Failed to decode frame: {e}");
                self.forward(TransportEvent::Error(e));
                return;
            }
        };

        for frame in frames {
            match frame {
                TradingViewFrame::Heartbeat { echo } => {
                    tracing::trace!("Answering heartbeat");
                    if let Err(e) = self.send_text(echo).await {
                        self.forward(TransportEvent::Error(e));
                    }
                }
                TradingViewFrame::SessionEstablished(session) => {
                    self.forward(TransportEvent::Message(TradingViewWsMessage::Session(
                        session,
                    )));
                }
                TradingViewFrame::NamedEvent { name, params } => {
                    let event = match TradingViewWsEvent::from_named(&name, params) {
                        Ok(event) => TransportEvent::Message(TradingViewWsMessage::Event(event)),
                        Err(e) => TransportEvent::Error(e),
                    };
                    self.forward(event);
                }
            }
        }
    }

    async fn send_text(&mut self, text: String) -> TradingViewWsResult<()> {
        self.writer
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TradingViewWsError::Send(e.to_string()))
    }

    fn forward(&self, event: TransportEvent) {
        if self.out_tx.send(event).is_err() {
            tracing::debug!("Connection dropped, discarding transport event");
        }
    }

    /// Reports the end of the socket to a pending close, or to the connection otherwise.
    fn finish(&mut self, result: TradingViewWsResult<()>) {
        match self.close_ack.take() {
            Some(ack) => {
                let _ = ack.send(result);
            }
            None => match result {
                Ok(()) => self.forward(TransportEvent::Closed),
                Err(e) => self.forward(TransportEvent::Error(e)),
            },
        }
    }
}
