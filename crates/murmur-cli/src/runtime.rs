//! Async runtime.
//!
//! Event loop that drives stdin, the websocket transport and client
//! deadlines. Uses `tokio::select!` so input, socket events and timers are
//! handled on one task; the client itself stays synchronous.

use std::{
    io::{self, Write},
    sync::Arc,
    time::Instant,
};

use murmur_client::{
    ChatClient, ClientConfig, ClientError, ClientEvent, ConnectionState, MessageDraft, summarize,
    transport::{TransportError, WsTransport},
};
use murmur_core::{BearerToken, Identity, StaticAuth, SystemEnv};
use thiserror::Error;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, warn};

use crate::{
    command::{Command, CommandError, HELP},
    render::{self, PrintedMessages},
};

/// Runtime errors.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// I/O error on stdin or stdout.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Client refused an operation.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Transport failed to execute an action.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Startup settings.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// WebSocket endpoint.
    pub url: String,
    /// Bearer token.
    pub token: String,
    /// Signed-in user id.
    pub user_id: String,
    /// Signed-in display name.
    pub user_name: String,
    /// Room to join once connected.
    pub room: Option<String>,
}

/// Terminal chat session.
pub struct Runtime {
    client: ChatClient<SystemEnv>,
    transport: WsTransport<Instant>,
    events: mpsc::UnboundedReceiver<ClientEvent<Instant>>,
    output: mpsc::UnboundedReceiver<String>,
    /// Room plain text is sent to
    current_room: Option<String>,
    /// Join the startup room on the first handshake
    pending_join: Option<String>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("client", &self.client)
            .field("transport", &self.transport)
            .field("current_room", &self.current_room)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Wire a client to a transport and subscribe the renderers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: RuntimeConfig) -> Self {
        let auth = StaticAuth::new(
            Identity::new(config.user_id, config.user_name),
            BearerToken::new(config.token),
        );
        let mut client = ChatClient::new(SystemEnv::new(), Arc::new(auth), ClientConfig::default());

        let (events_tx, events) = mpsc::unbounded_channel();
        let transport = WsTransport::new(config.url, events_tx);

        let (output_tx, output) = mpsc::unbounded_channel();
        subscribe_renderers(&mut client, &output_tx);

        Self {
            client,
            transport,
            events,
            output,
            current_room: config.room.clone(),
            pending_join: config.room,
        }
    }

    /// Run until `/quit` or end of input.
    ///
    /// # Errors
    ///
    /// - `RuntimeError::Io` if stdin or stdout fail
    /// - `RuntimeError::Client` if the first connect has no usable token
    pub async fn run(mut self) -> Result<(), RuntimeError> {
        self.client.connect()?;
        self.execute_actions()?;

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            let deadline = self.client.next_deadline();

            let quit = tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => self.handle_line(&line),
                    None => true,
                },

                Some(event) = self.events.recv() => {
                    if let Err(err) = self.client.handle(event) {
                        debug!(%err, "inbound event rejected");
                    }
                    false
                },

                () = wait_until(deadline) => {
                    if let Err(err) = self.client.handle(ClientEvent::Tick { now: Instant::now() }) {
                        debug!(%err, "tick failed");
                    }
                    false
                },
            };

            self.join_startup_room();
            self.execute_actions()?;
            self.flush_output()?;

            if quit {
                break;
            }
        }

        self.client.disconnect();
        self.execute_actions()?;
        self.transport.shutdown();
        self.flush_output()?;
        Ok(())
    }

    /// Apply one input line. Returns whether to quit.
    fn handle_line(&mut self, line: &str) -> bool {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(CommandError::Empty) => return false,
            Err(err) => {
                status(err);
                return false;
            },
        };

        if command == Command::Quit {
            return true;
        }

        if let Err(err) = self.apply(command) {
            status(format!("! {err}"));
        }
        false
    }

    fn apply(&mut self, command: Command) -> Result<(), ClientError> {
        match command {
            Command::Say(text) => {
                let Some(room) = self.current_room.clone() else {
                    status("no current room; /join one first");
                    return Ok(());
                };
                self.client.send_message(MessageDraft::text(room, text))?;
            },
            Command::Join(room) => {
                self.client.join_room(&room)?;
                status(format!("* joined #{room}"));
                self.current_room = Some(room);
            },
            Command::Leave(room) => {
                let Some(room) = room.or_else(|| self.current_room.clone()) else {
                    return Ok(());
                };
                if self.current_room.as_deref() == Some(room.as_str()) {
                    self.current_room = None;
                }
                self.client.leave_room(&room)?;
            },
            Command::Switch(room) => {
                status(format!("* now talking in #{room}"));
                self.current_room = Some(room);
            },
            Command::Chat(user) => self.client.open_chat_with(&user)?,
            Command::Read(id) => {
                self.client.mark_read(&id)?;
            },
            Command::Users => self.client.fetch_users()?,
            Command::Online => {
                let online = self.client.presence().online_users();
                status(format!("* online: {}", online.join(", ")));
            },
            Command::Typing => {
                self.client.start_typing()?;
            },
            Command::Clear => self.client.clear_conversation(),
            Command::Reconnect => self.client.connect()?,
            Command::Help => status(HELP),
            Command::Quit => {},
        }
        Ok(())
    }

    /// Join the startup room once the first handshake completes.
    fn join_startup_room(&mut self) {
        if self.client.state() != ConnectionState::Connected {
            return;
        }
        if let Some(room) = self.pending_join.take()
            && let Err(err) = self.client.join_room(&room)
        {
            warn!(%room, %err, "startup join failed");
        }
    }

    fn execute_actions(&mut self) -> Result<(), RuntimeError> {
        for action in self.client.take_actions() {
            self.transport.execute(action)?;
        }
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), RuntimeError> {
        let mut out = io::stdout().lock();
        while let Ok(line) = self.output.try_recv() {
            writeln!(out, "{line}")?;
        }
        out.flush()?;
        Ok(())
    }
}

/// Render store changes into `output`.
///
/// Messages print once, when first appended; confirmations replace the
/// optimistic copy in place and are not printed again.
fn subscribe_renderers(client: &mut ChatClient<SystemEnv>, output: &mpsc::UnboundedSender<String>) {
    let tx = output.clone();
    let mut printed = PrintedMessages::default();
    client.messages_mut().subscribe(move |log| {
        for line in printed.fresh_lines(log) {
            let _ = tx.send(line);
        }
    });

    let tx = output.clone();
    let mut last = None;
    client.typing_mut().subscribe(move |entries| {
        let names: Vec<String> = entries.iter().map(|e| e.user_name.clone()).collect();
        let summary = summarize(&names);
        if summary != last {
            if let Some(line) = &summary {
                let _ = tx.send(format!("~ {line}"));
            }
            last = summary;
        }
    });

    let tx = output.clone();
    client.add_connection_listener(move |notice| {
        let _ = tx.send(render::notice_line(notice));
    });
}

fn status(line: impl std::fmt::Display) {
    let mut out = io::stdout().lock();
    if let Err(err) = writeln!(out, "{line}") {
        warn!(%err, "stdout write failed");
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}
