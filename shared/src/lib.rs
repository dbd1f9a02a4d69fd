//! Wire vocabulary shared by the game server and its clients.
//!
//! Every message on the wire is one newline-terminated UTF-8 line. Framing
//! lives in [`transport`], display-name rules in [`names`] and the tagged
//! visualizer frames in [`frame`]. This module holds the protocol constants
//! and the client-side interpretation of server lines.

pub mod frame;
pub mod names;
pub mod transport;

pub use frame::{Frame, FrameError, FrameKind, LobbyStatus};
pub use names::{normalize_name, validate_name, NameError};
pub use transport::{LineReader, LineWriter};

/// Greeting a socket client sends as its very first line.
pub const HELLO: &str = "HELLO";
/// Keepalive probe sent periodically by the server. Never requires a reply.
pub const PING: &str = "PING";
/// Sent by either side to end the session.
pub const QUIT: &str = "quit";
/// Handshake prompt asking a freshly greeted client for its display name.
pub const NAME_PROMPT: &str = "What is your name?";
/// Prefix for server lines that expect exactly one line back.
pub const REPLY_PREFIX: &str = "Y: ";
/// Prefix for server lines that expect no reply.
pub const NOTICE_PREFIX: &str = "N: ";
/// First-line prefix that routes a connection to the legacy HTTP responder.
pub const HTTP_REQUEST_PREFIX: &str = "GET /";

/// Adds the reply marker to an outgoing application line.
///
/// Lines that already carry a marker are passed through untouched so that a
/// prompt is never double-prefixed.
pub fn prefix_message(message: &str, expects_reply: bool) -> String {
    if message.starts_with(REPLY_PREFIX) || message.starts_with(NOTICE_PREFIX) {
        return message.to_string();
    }

    if expects_reply {
        format!("{}{}", REPLY_PREFIX, message)
    } else {
        format!("{}{}", NOTICE_PREFIX, message)
    }
}

/// A line received from the server, as seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// `Y: ` line. The client must answer with exactly one line.
    Prompt(String),
    /// `N: ` line. Informational only.
    Notice(String),
    /// Keepalive probe.
    Ping,
    /// The server is ending the session.
    Quit,
    /// Unprefixed text, e.g. a legacy HTTP response body.
    Text(String),
}

impl ServerMessage {
    pub fn parse(line: &str) -> Self {
        if line == PING {
            return ServerMessage::Ping;
        }

        if let Some(body) = line.strip_prefix(REPLY_PREFIX) {
            return ServerMessage::Prompt(body.to_string());
        }

        if let Some(body) = line.strip_prefix(NOTICE_PREFIX) {
            if body == QUIT {
                return ServerMessage::Quit;
            }
            return ServerMessage::Notice(body.to_string());
        }

        if line == QUIT {
            return ServerMessage::Quit;
        }

        ServerMessage::Text(line.to_string())
    }

    /// Whether this line must be answered.
    pub fn expects_reply(&self) -> bool {
        matches!(self, ServerMessage::Prompt(_))
    }
}
