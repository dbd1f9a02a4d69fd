//! Error types for the accept loop and the session orchestrator

use std::time::Duration;

/// Failures that end the registry's accept task.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out binding {addr} after {timeout:?}")]
    BindTimeout { addr: String, timeout: Duration },
}

/// Failures that are fatal to the orchestrator task.
///
/// Each one points at a defect in a game implementation or in the
/// orchestrator itself, never at player behaviour.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("no player inputs were returned on round {round}")]
    NoPlayerInputs { round: u32 },

    #[error("did not get all responses on round {round}: expected {expected}, received {received}")]
    ResponseCountMismatch {
        round: u32,
        expected: usize,
        received: usize,
    },

    #[error("game frame queue was not empty before initializing the new game: {frame:?}")]
    LeakedFrame { frame: String },

    #[error("game cannot change names: original {original:?}, new {new:?}")]
    GameRenamed { original: String, new: String },

    #[error("game failed: {0}")]
    Game(String),
}
