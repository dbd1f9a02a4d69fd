//! The contract between a concrete game and the session orchestrator
//!
//! A game is driven through a fixed lifecycle for every session:
//! setup, then an unbounded sequence of rounds (prepare, prompt, collect,
//! handle, update), then a single game-over hook. The orchestrator owns the
//! connections and the clock; the game only decides what to ask, how to
//! score the answers and what to show.
//!
//! Games report progress to the visualizer by pushing raw payloads into a
//! [`FrameQueue`]. The orchestrator drains that queue after every lifecycle
//! call and substitutes `@p{K}!` player slots with roster names.

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Round-level outcomes that end a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    /// The game reached a normal end. The reason is for logs and diagnostics.
    #[error("game over: {0}")]
    GameOver(String),

    /// The game cannot continue because of a defect or a misconfiguration,
    /// e.g. a roster size the game does not support.
    #[error("fatal game error: {0}")]
    Fatal(String),
}

/// Producer side of the orchestrator's game-frame queue.
///
/// Pushing never blocks. Frames pushed after the orchestrator has gone away
/// are dropped.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl FrameQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn push(&self, payload: impl Into<String>) {
        // The receiver only disappears when the orchestrator is shutting down.
        let _ = self.tx.send(payload.into());
    }
}

/// A round-based game playable by the orchestrator.
///
/// Player indices are positions in the roster handed to
/// [`Game::setup_game`] and stay fixed for the whole session.
#[async_trait]
pub trait Game: Send {
    /// Display name. Must return the same value for every instance built by
    /// one orchestrator.
    fn name(&self) -> String;

    /// Called once per session after the roster is fixed.
    async fn setup_game(&mut self, _players: &[String]) -> Result<(), GameError> {
        Ok(())
    }

    /// Pre-round hook. Any returned text is logged.
    async fn prepare_round(&mut self, _round: u32) -> Result<Option<String>, GameError> {
        Ok(None)
    }

    /// Prompt for `player` this round. `None` or an empty prompt skips the
    /// player.
    async fn player_input(&mut self, round: u32, player: usize) -> Option<String>;

    /// Fired as each response arrives, in arrival order. `None` means the
    /// player went away without answering.
    async fn on_player_output(&mut self, _round: u32, _player: usize, _output: Option<&str>) {}

    /// Fired once per prompted player, in ascending index order, after every
    /// response of the round is in.
    async fn handle_player_output(
        &mut self,
        round: u32,
        player: usize,
        output: Option<&str>,
    ) -> Result<(), GameError>;

    /// Resolves the round. Returning [`GameError::GameOver`] ends the
    /// session cleanly.
    async fn update_game(&mut self, round: u32) -> Result<(), GameError>;

    /// Called exactly once per session, however it ended.
    async fn on_game_over(&mut self) {}

    /// Full state snapshot for key frames.
    fn visualizer_data(&self) -> Option<String> {
        None
    }

    /// Players needed before the countdown starts.
    fn min_connections(&self) -> usize {
        1
    }

    /// Most players admitted to one session; 0 means no limit.
    fn max_connections(&self) -> usize {
        0
    }

    /// Countdown ticks between reaching the minimum and starting.
    fn start_cooldown(&self) -> u32 {
        10
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    #[async_trait]
    impl Game for Minimal {
        fn name(&self) -> String {
            "Minimal".to_string()
        }

        async fn player_input(&mut self, _round: u32, _player: usize) -> Option<String> {
            Some("go?".to_string())
        }

        async fn handle_player_output(
            &mut self,
            _round: u32,
            _player: usize,
            _output: Option<&str>,
        ) -> Result<(), GameError> {
            Ok(())
        }

        async fn update_game(&mut self, round: u32) -> Result<(), GameError> {
            Err(GameError::GameOver(format!("round {}", round)))
        }
    }

    #[test]
    fn test_default_sizing() {
        let game = Minimal;
        assert_eq!(game.min_connections(), 1);
        assert_eq!(game.max_connections(), 0);
        assert_eq!(game.start_cooldown(), 10);
        assert_eq!(game.visualizer_data(), None);
    }

    #[tokio::test]
    async fn test_default_hooks() {
        let mut game = Minimal;
        assert_eq!(game.setup_game(&["a".into(), "b".into()]).await, Ok(()));
        assert_eq!(game.prepare_round(0).await, Ok(None));
        assert_eq!(
            game.update_game(4).await,
            Err(GameError::GameOver("round 4".to_string()))
        );
    }

    #[test]
    fn test_frame_queue_is_fifo() {
        let (queue, mut rx) = FrameQueue::channel();
        let producer = queue.clone();

        queue.push("first");
        producer.push(String::from("second"));

        assert_eq!(rx.try_recv().as_deref(), Ok("first"));
        assert_eq!(rx.try_recv().as_deref(), Ok("second"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_push_after_receiver_dropped() {
        let (queue, rx) = FrameQueue::channel();
        drop(rx);
        queue.push("ignored");
    }
}
