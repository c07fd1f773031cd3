//! WebSocket transport for the client.
//!
//! Executes [`ClientAction`]s against real sockets. One task runs per
//! session; it reports lifecycle signals and inbound events back over a
//! channel, each tagged with its [`SessionId`], as [`ClientEvent`]s ready to
//! feed into [`crate::ChatClient::handle`]. Protocol logic stays in the
//! Sans-IO client.
//!
//! Frames are JSON text messages `{"event": <name>, "data": <payload>}`. The
//! bearer token travels in the `Authorization` header of the upgrade request.

use std::collections::HashMap;

use futures_util::{SinkExt, StreamExt};
use murmur_core::{BearerToken, Outbound, SessionId, TransportSignal};
use murmur_proto::{Envelope, ProtocolError};
use thiserror::Error;
use tokio::{sync::mpsc, task::AbortHandle};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        Message as WsMessage,
        client::IntoClientRequest,
        handshake::client::Request,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::{debug, warn};

use crate::event::{ClientAction, ClientEvent};

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Upgrade request could not be built.
    #[error("invalid request: {0}")]
    Request(String),

    /// Outbound event could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] ProtocolError),
}

struct SessionHandle {
    outgoing: mpsc::UnboundedSender<String>,
    task: AbortHandle,
}

/// Socket owner for every session the client opens.
///
/// Must be used from within a tokio runtime.
pub struct WsTransport<I> {
    url: String,
    events: mpsc::UnboundedSender<ClientEvent<I>>,
    sessions: HashMap<SessionId, SessionHandle>,
}

impl<I> std::fmt::Debug for WsTransport<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("url", &self.url)
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<I: Send + 'static> WsTransport<I> {
    /// Transport for `url` reporting into `events`.
    pub fn new(url: impl Into<String>, events: mpsc::UnboundedSender<ClientEvent<I>>) -> Self {
        Self { url: url.into(), events, sessions: HashMap::new() }
    }

    /// Number of sessions with a running task.
    pub fn open_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Execute one client action.
    ///
    /// # Errors
    ///
    /// - `TransportError::Encode` if an outbound event cannot be serialized;
    ///   the event is dropped
    pub fn execute(&mut self, action: ClientAction) -> Result<(), TransportError> {
        match action {
            ClientAction::OpenSession { session, token } => {
                self.open(session, token);
                Ok(())
            },
            ClientAction::CloseSession { session } => {
                if let Some(handle) = self.sessions.remove(&session) {
                    debug!(%session, "closing session");
                    handle.task.abort();
                }
                Ok(())
            },
            ClientAction::Emit(outbound) => self.emit(outbound),
        }
    }

    /// Abort every session task.
    pub fn shutdown(&mut self) {
        for (_, handle) in self.sessions.drain() {
            handle.task.abort();
        }
    }

    fn open(&mut self, session: SessionId, token: BearerToken) {
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_session(
            self.url.clone(),
            session,
            token,
            outgoing_rx,
            self.events.clone(),
        ));

        self.sessions.insert(session, SessionHandle { outgoing, task: task.abort_handle() });
    }

    fn emit(&mut self, outbound: Outbound) -> Result<(), TransportError> {
        let Outbound { session, event } = outbound;
        let text = Envelope::from_outbound(&event)?.to_text()?;

        match self.sessions.get(&session) {
            Some(handle) if handle.outgoing.send(text).is_ok() => {},
            _ => debug!(%session, event = event.name(), "no live socket, event dropped"),
        }
        Ok(())
    }
}

impl<I> Drop for WsTransport<I> {
    fn drop(&mut self) {
        for handle in self.sessions.values() {
            handle.task.abort();
        }
    }
}

fn upgrade_request(url: &str, token: &BearerToken) -> Result<Request, TransportError> {
    let mut request =
        url.into_client_request().map_err(|e| TransportError::Request(e.to_string()))?;
    let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
        .map_err(|e| TransportError::Request(e.to_string()))?;
    request.headers_mut().insert(AUTHORIZATION, value);
    Ok(request)
}

fn report<I>(events: &mpsc::UnboundedSender<ClientEvent<I>>, session: SessionId, signal: TransportSignal) {
    // A closed receiver means the runtime is shutting down.
    let _ = events.send(ClientEvent::Transport { session, signal });
}

/// Run one session until its socket ends or its handle is dropped.
async fn run_session<I>(
    url: String,
    session: SessionId,
    token: BearerToken,
    mut outgoing: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<ClientEvent<I>>,
) {
    let request = match upgrade_request(&url, &token) {
        Ok(request) => request,
        Err(err) => {
            report(&events, session, TransportSignal::ConnectError { reason: err.to_string() });
            return;
        },
    };

    let socket = match connect_async(request).await {
        Ok((socket, _response)) => socket,
        Err(err) => {
            report(&events, session, TransportSignal::ConnectError { reason: err.to_string() });
            return;
        },
    };

    report(&events, session, TransportSignal::Connected);
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            text = outgoing.recv() => {
                let Some(text) = text else {
                    let _ = write.close().await;
                    return;
                };
                if let Err(err) = write.send(WsMessage::Text(text)).await {
                    report(&events, session, TransportSignal::Error { reason: err.to_string() });
                    return;
                }
            },
            frame = read.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => match Envelope::from_text(&text) {
                    Ok(envelope) => {
                        let _ = events.send(ClientEvent::Inbound {
                            session,
                            name: envelope.event,
                            payload: envelope.data,
                        });
                    },
                    Err(err) => warn!(%session, %err, "dropping undecodable frame"),
                },
                Some(Ok(WsMessage::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    report(&events, session, TransportSignal::Closed { reason });
                    return;
                },
                Some(Ok(_)) => {},
                Some(Err(err)) => {
                    report(&events, session, TransportSignal::Error { reason: err.to_string() });
                    return;
                },
                None => {
                    report(&events, session, TransportSignal::Closed { reason: "stream ended".into() });
                    return;
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_request_carries_bearer_token() {
        let request = upgrade_request("ws://localhost:3000/ws", &BearerToken::new("abc")).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Bearer abc");
    }

    #[test]
    fn invalid_url_is_rejected() {
        assert!(upgrade_request("not a url", &BearerToken::new("abc")).is_err());
    }
}
