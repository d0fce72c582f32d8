//! Minimal Chrome DevTools Protocol client over a WebSocket.
//!
//! Only what browser capture needs: send a command and wait for its result,
//! and pull events off the socket in arrival order. Events that arrive while a
//! command is waiting for its response are queued, not dropped.

use std::collections::VecDeque;
use std::fmt;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::trace;

use super::StrategyError;

/// DevTools client failures.
#[derive(Debug)]
pub enum CdpError {
  /// The WebSocket handshake failed
  Connect(tungstenite::Error),
  /// Reading or writing the socket failed
  Socket(tungstenite::Error),
  /// The browser closed the connection
  Closed,
  /// A frame was not valid protocol JSON
  Decode(serde_json::Error),
  /// A command returned an error object
  Command { method: String, message: String },
  /// A command result lacked a field we rely on
  MissingField { method: String, field: &'static str },
}

impl fmt::Display for CdpError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Connect(err) => write!(f, "DevTools connect failed: {err}"),
      Self::Socket(err) => write!(f, "DevTools socket error: {err}"),
      Self::Closed => write!(f, "DevTools connection closed"),
      Self::Decode(err) => write!(f, "invalid DevTools message: {err}"),
      Self::Command { method, message } => write!(f, "{method} failed: {message}"),
      Self::MissingField { method, field } => write!(f, "{method} result has no '{field}'"),
    }
  }
}

impl std::error::Error for CdpError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      Self::Connect(err) | Self::Socket(err) => Some(err),
      Self::Decode(err) => Some(err),
      _ => None,
    }
  }
}

impl From<CdpError> for StrategyError {
  fn from(err: CdpError) -> Self {
    Self::Transport(anyhow::Error::new(err))
  }
}

/// An unsolicited protocol event.
#[derive(Debug, Clone)]
pub(crate) struct CdpEvent {
  pub method: String,
  pub params: Value,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
  id: Option<u64>,
  method: Option<String>,
  #[serde(default)]
  params: Value,
  #[serde(default)]
  result: Value,
  error: Option<RawError>,
}

#[derive(Debug, Deserialize)]
struct RawError {
  message: String,
}

#[derive(Debug)]
enum Incoming {
  Response { id: u64, result: Result<Value, String> },
  Event(CdpEvent),
  Other,
}

fn parse_incoming(text: &str) -> Result<Incoming, CdpError> {
  let raw: RawMessage = serde_json::from_str(text).map_err(CdpError::Decode)?;
  Ok(match (raw.id, raw.method) {
    (Some(id), _) => Incoming::Response {
      id,
      result: match raw.error {
        Some(error) => Err(error.message),
        None => Ok(raw.result),
      },
    },
    (None, Some(method)) => Incoming::Event(CdpEvent {
      method,
      params: raw.params,
    }),
    (None, None) => Incoming::Other,
  })
}

/// A connection to the browser-level DevTools endpoint.
pub(crate) struct CdpConnection {
  socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
  next_id: u64,
  pending_events: VecDeque<CdpEvent>,
}

impl CdpConnection {
  pub async fn connect(ws_url: &str) -> Result<Self, CdpError> {
    let (socket, _) = connect_async(ws_url).await.map_err(CdpError::Connect)?;
    Ok(Self {
      socket,
      next_id: 1,
      pending_events: VecDeque::new(),
    })
  }

  /// Send a command and wait for its result.
  ///
  /// # Arguments
  /// * `method` - Protocol method, e.g. `Page.navigate`.
  /// * `params` - Command parameters.
  /// * `session_id` - Target session for flattened sessions; `None` addresses
  ///   the browser itself.
  pub async fn call(&mut self, method: &str, params: Value, session_id: Option<&str>) -> Result<Value, CdpError> {
    let id = self.next_id;
    self.next_id += 1;

    let mut command = json!({ "id": id, "method": method, "params": params });
    if let Some(session_id) = session_id {
      command["sessionId"] = Value::String(session_id.to_string());
    }

    trace!(id, method, "DevTools command");
    self
      .socket
      .send(Message::text(command.to_string()))
      .await
      .map_err(CdpError::Socket)?;

    loop {
      match self.read_incoming().await? {
        Incoming::Response { id: response_id, result } if response_id == id => {
          return result.map_err(|message| CdpError::Command {
            method: method.to_string(),
            message,
          });
        }
        Incoming::Event(event) => self.pending_events.push_back(event),
        Incoming::Response { .. } | Incoming::Other => {}
      }
    }
  }

  /// Wait for the next event, draining queued ones first.
  pub async fn next_event(&mut self) -> Result<CdpEvent, CdpError> {
    if let Some(event) = self.pending_events.pop_front() {
      return Ok(event);
    }

    loop {
      if let Incoming::Event(event) = self.read_incoming().await? {
        return Ok(event);
      }
    }
  }

  pub async fn close(mut self) {
    let _ = self.socket.close(None).await;
  }

  async fn read_incoming(&mut self) -> Result<Incoming, CdpError> {
    loop {
      let message = self
        .socket
        .next()
        .await
        .ok_or(CdpError::Closed)?
        .map_err(CdpError::Socket)?;

      match message {
        Message::Text(text) => return parse_incoming(text.as_str()),
        Message::Close(_) => return Err(CdpError::Closed),
        _ => {}
      }
    }
  }
}

/// Pull a string field out of a command result.
pub(crate) fn required_str(result: &Value, method: &str, field: &'static str) -> Result<String, CdpError> {
  result
    .get(field)
    .and_then(Value::as_str)
    .map(str::to_string)
    .ok_or_else(|| CdpError::MissingField {
      method: method.to_string(),
      field,
    })
}
