//! Plain-text rendering of client state.

use std::collections::HashSet;

use chrono::DateTime;
use murmur_client::MessageLog;
use murmur_core::{ConnectionNotice, ConnectionState};
use murmur_proto::Message;

/// `HH:MM:SS` (UTC) of an epoch-millisecond timestamp.
pub fn clock(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(|at| at.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_owned())
}

/// One conversation line. Own unconfirmed messages are marked.
pub fn message_line(message: &Message) -> String {
    let author = message.sender_name.as_deref().unwrap_or(&message.sender_id);
    let room = message.chat_room_id.as_deref().unwrap_or("-");
    let pending = if message.is_temporary() { " (sending)" } else { "" };

    format!("[{}] #{room} {author}: {}{pending}", clock(message.timestamp), message.text)
}

/// Which log entries have already been written to the terminal.
///
/// A message counts as printed when its id, or the `clientId` of the
/// optimistic copy it confirmed, was present in the previous log. Removals
/// never cause earlier lines to be written again.
#[derive(Debug, Default)]
pub struct PrintedMessages {
    seen: HashSet<String>,
}

impl PrintedMessages {
    /// Lines for entries of `log` not printed before.
    pub fn fresh_lines(&mut self, log: &MessageLog) -> Vec<String> {
        let lines = log
            .messages()
            .iter()
            .filter(|m| {
                !self.seen.contains(&m.id)
                    && !m.client_id.as_ref().is_some_and(|client_id| self.seen.contains(client_id))
            })
            .map(message_line)
            .collect();
        self.seen = log.messages().iter().map(|m| m.id.clone()).collect();
        lines
    }
}

/// Status line for a connection lifecycle notice.
pub fn notice_line(notice: &ConnectionNotice) -> String {
    let state = match notice.state {
        ConnectionState::Disconnected => "disconnected".to_owned(),
        ConnectionState::Connecting => "connecting".to_owned(),
        ConnectionState::Connected => "connected".to_owned(),
        ConnectionState::Reconnecting { attempt } => format!("reconnecting (attempt {attempt})"),
    };

    match &notice.error {
        Some(err) => format!("* {}: {state}: {err}", notice.event),
        None => format!("* {}: {state}", notice.event),
    }
}
