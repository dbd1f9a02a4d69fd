//! Tagged visualizer frames and the lobby frame vocabulary
//!
//! A frame travels as a single text line: `FRAME <payload>` for an
//! incremental update or `KEYFRAME <payload>` for an authoritative
//! full-state refresh. Lobby payloads (`WAITING`, `START_IN`, `STARTING`)
//! are produced by the session orchestrator; every other payload belongs to
//! the running game and is opaque here.

use std::fmt;
use thiserror::Error;

pub const FRAME_PREFIX: &str = "FRAME ";
pub const KEYFRAME_PREFIX: &str = "KEYFRAME ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("unhandled frame prefix: {0:?}")]
    UnknownPrefix(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Update,
    Key,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: String,
}

impl Frame {
    pub fn update(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Update,
            payload: payload.into(),
        }
    }

    pub fn key(payload: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Key,
            payload: payload.into(),
        }
    }

    pub fn is_key(&self) -> bool {
        self.kind == FrameKind::Key
    }

    /// Splits a tagged line back into a frame.
    pub fn parse(line: &str) -> Result<Self, FrameError> {
        if let Some(payload) = line.strip_prefix(KEYFRAME_PREFIX) {
            return Ok(Frame::key(payload));
        }
        if let Some(payload) = line.strip_prefix(FRAME_PREFIX) {
            return Ok(Frame::update(payload));
        }
        Err(FrameError::UnknownPrefix(line.to_string()))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            FrameKind::Update => FRAME_PREFIX,
            FrameKind::Key => KEYFRAME_PREFIX,
        };
        write!(f, "{}{}", prefix, self.payload)
    }
}

/// Waiting-room announcements emitted between sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyStatus {
    /// Fewer than `required` players are connected.
    Waiting { required: usize, names: Vec<String> },
    /// Enough players; the session starts after `seconds` more ticks.
    Countdown { seconds: u32, names: Vec<String> },
    /// The roster is being locked in now.
    Starting { names: Vec<String> },
}

impl LobbyStatus {
    /// Recognizes a lobby payload. Game payloads yield `None`.
    pub fn parse(payload: &str) -> Option<Self> {
        let mut parts = payload.split_whitespace();
        match parts.next()? {
            "WAITING" => {
                let required = parts.next()?.parse().ok()?;
                Some(LobbyStatus::Waiting {
                    required,
                    names: parts.map(str::to_string).collect(),
                })
            }
            "START_IN" => {
                let seconds = parts.next()?.parse().ok()?;
                Some(LobbyStatus::Countdown {
                    seconds,
                    names: parts.map(str::to_string).collect(),
                })
            }
            "STARTING" => Some(LobbyStatus::Starting {
                names: parts.map(str::to_string).collect(),
            }),
            _ => None,
        }
    }

    pub fn names(&self) -> &[String] {
        match self {
            LobbyStatus::Waiting { names, .. }
            | LobbyStatus::Countdown { names, .. }
            | LobbyStatus::Starting { names } => names,
        }
    }
}

impl fmt::Display for LobbyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LobbyStatus::Waiting { required, names } => {
                write!(f, "WAITING {} {}", required, names.join(" "))
            }
            LobbyStatus::Countdown { seconds, names } => {
                write!(f, "START_IN {} {}", seconds, names.join(" "))
            }
            LobbyStatus::Starting { names } => write!(f, "STARTING {}", names.join(" ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_frame_tags() {
        assert_eq!(Frame::update("hello").to_string(), "FRAME hello");
        assert_eq!(Frame::key("{}").to_string(), "KEYFRAME {}");
    }

    #[test]
    fn test_parse_frames() {
        let frame = Frame::parse("KEYFRAME {\"scores\":[1,0]}").unwrap();
        assert!(frame.is_key());
        assert_eq!(frame.payload, "{\"scores\":[1,0]}");

        let frame = Frame::parse("FRAME alice Locked in").unwrap();
        assert_eq!(frame.kind, FrameKind::Update);
        assert_eq!(frame.payload, "alice Locked in");
    }

    #[test]
    fn test_unknown_prefix_is_an_error() {
        assert_eq!(
            Frame::parse("KEY {}"),
            Err(FrameError::UnknownPrefix("KEY {}".to_string()))
        );
        assert!(Frame::parse("FRAME").is_err());
    }

    #[test]
    fn test_lobby_payloads() {
        let waiting = LobbyStatus::Waiting {
            required: 2,
            names: names(&["alice"]),
        };
        assert_eq!(waiting.to_string(), "WAITING 2 alice");
        assert_eq!(LobbyStatus::parse("WAITING 2 alice"), Some(waiting));

        let countdown = LobbyStatus::parse("START_IN 3 alice bob").unwrap();
        assert_eq!(
            countdown,
            LobbyStatus::Countdown {
                seconds: 3,
                names: names(&["alice", "bob"]),
            }
        );

        let starting = LobbyStatus::Starting {
            names: names(&["alice", "bob"]),
        };
        assert_eq!(starting.to_string(), "STARTING alice bob");
        assert_eq!(starting.names(), ["alice", "bob"]);
    }

    #[test]
    fn test_empty_waiting_room() {
        let waiting = LobbyStatus::Waiting {
            required: 2,
            names: Vec::new(),
        };
        assert_eq!(
            LobbyStatus::parse(&waiting.to_string()),
            Some(waiting.clone())
        );
        assert_eq!(waiting.names().len(), 0);
    }

    #[test]
    fn test_game_payload_is_not_lobby() {
        assert_eq!(LobbyStatus::parse("{\"message\":\"\"}"), None);
        assert_eq!(LobbyStatus::parse("WAITING many"), None);
        assert_eq!(LobbyStatus::parse(""), None);
    }
}
