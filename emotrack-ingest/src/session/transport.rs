//! Session transport
//!
//! The controller talks to its client through [`Transport`], so the frame
//! loop does not depend on the WebSocket stack. `recv` must be cancel-safe:
//! the loop polls it inside `tokio::select!`.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::protocol::{CloseReason, ServerEvent};

/// Message received from the client
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Encoded image bytes
    Frame(Vec<u8>),
    Text(String),
    /// Transport-level ping/pong; only resets the idle deadline
    Heartbeat,
    /// Client closed the connection or the stream ended
    Closed,
}

#[async_trait]
pub trait Transport: Send {
    async fn recv(&mut self) -> Result<Inbound>;
    async fn send(&mut self, event: &ServerEvent) -> Result<()>;
    /// Send the close frame for `reason`; the transport is unusable afterwards
    async fn close(&mut self, reason: CloseReason) -> Result<()>;
}

/// Transport over an upgraded axum WebSocket
pub struct WsTransport {
    socket: WebSocket,
}

impl WsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn recv(&mut self) -> Result<Inbound> {
        match self.socket.recv().await {
            None | Some(Ok(Message::Close(_))) => Ok(Inbound::Closed),
            Some(Ok(Message::Binary(bytes))) => Ok(Inbound::Frame(bytes)),
            Some(Ok(Message::Text(text))) => Ok(Inbound::Text(text)),
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => Ok(Inbound::Heartbeat),
            Some(Err(e)) => Err(Error::Transport(e.to_string())),
        }
    }

    async fn send(&mut self, event: &ServerEvent) -> Result<()> {
        self.socket
            .send(Message::Text(event.to_text()))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn close(&mut self, reason: CloseReason) -> Result<()> {
        self.socket
            .send(Message::Close(Some(CloseFrame {
                code: reason.code(),
                reason: Cow::Borrowed(reason.description()),
            })))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}
