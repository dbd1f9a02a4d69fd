//! Two-player rock paper scissors, first to three round wins

use crate::game::{FrameQueue, Game, GameError};
use async_trait::async_trait;
use log::{info, warn};
use serde::Serialize;
use std::str::FromStr;

pub const GAME_NAME: &str = "Rock Paper Scissors";
pub const WINNING_SCORE: u32 = 3;
const PLAYERS: usize = 2;
const PROMPT: &str = "Rock, Paper, or Scissors?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Rock,
    Paper,
    Scissors,
}

impl Move {
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Paper, Move::Rock) | (Move::Scissors, Move::Paper)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        }
    }
}

impl FromStr for Move {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rock" => Ok(Move::Rock),
            "paper" => Ok(Move::Paper),
            "scissors" => Ok(Move::Scissors),
            _ => Err(format!("invalid move: {:?}", s)),
        }
    }
}

/// Key-frame payload, serialized as JSON.
#[derive(Debug, Serialize)]
struct Snapshot<'a> {
    message: &'a str,
    names: &'a [String],
    scores: &'a [u32],
    winning_score: u32,
    waiting: &'a [bool],
    revealed: bool,
    moves: &'a [Option<String>],
    round_winner: Option<usize>,
    game_winner: Option<usize>,
    delay: u64,
}

pub struct RockPaperScissors {
    frames: FrameQueue,
    names: Vec<String>,
    scores: Vec<u32>,
    waiting: Vec<bool>,
    moves: Vec<Option<String>>,
    revealed: bool,
}

impl RockPaperScissors {
    pub fn new(frames: FrameQueue) -> Self {
        Self {
            frames,
            names: Vec::new(),
            scores: vec![0; PLAYERS],
            waiting: vec![true; PLAYERS],
            moves: vec![None; PLAYERS],
            revealed: false,
        }
    }

    fn parsed_move(&self, player: usize) -> Option<Move> {
        self.moves.get(player)?.as_deref()?.parse().ok()
    }

    /// Index of the round winner once both moves are in and valid.
    fn round_winner(&self) -> Option<usize> {
        let first = self.parsed_move(0)?;
        let second = self.parsed_move(1)?;
        if first.beats(second) {
            Some(0)
        } else if second.beats(first) {
            Some(1)
        } else {
            None
        }
    }

    fn game_winner(&self) -> Option<usize> {
        self.scores.iter().position(|&score| score >= WINNING_SCORE)
    }

    fn snapshot(&self, message: &str, delay_ms: u64) -> String {
        let snapshot = Snapshot {
            message,
            names: &self.names,
            scores: &self.scores,
            winning_score: WINNING_SCORE,
            waiting: &self.waiting,
            revealed: self.revealed,
            moves: &self.moves,
            round_winner: self.round_winner(),
            game_winner: self.game_winner(),
            delay: delay_ms,
        };
        serde_json::to_string(&snapshot).unwrap_or_else(|e| {
            warn!("Could not serialize snapshot: {}", e);
            String::from("{}")
        })
    }

    /// Pushes the current state with a message and a hold time in ms.
    fn visualize_frame(&self, message: &str, delay_ms: u64) {
        self.frames.push(self.snapshot(message, delay_ms));
    }
}

#[async_trait]
impl Game for RockPaperScissors {
    fn name(&self) -> String {
        GAME_NAME.to_string()
    }

    async fn setup_game(&mut self, players: &[String]) -> Result<(), GameError> {
        if players.len() != PLAYERS {
            return Err(GameError::Fatal(format!(
                "unexpected player count: {}",
                players.len()
            )));
        }
        self.names = players.to_vec();
        Ok(())
    }

    async fn prepare_round(&mut self, _round: u32) -> Result<Option<String>, GameError> {
        self.waiting = vec![true; PLAYERS];
        self.moves = vec![None; PLAYERS];
        self.revealed = false;

        self.visualize_frame("Waiting for responses", 0);
        Ok(None)
    }

    async fn player_input(&mut self, _round: u32, _player: usize) -> Option<String> {
        Some(PROMPT.to_string())
    }

    async fn on_player_output(&mut self, _round: u32, player: usize, _output: Option<&str>) {
        if let Some(waiting) = self.waiting.get_mut(player) {
            *waiting = false;
        }

        self.visualize_frame(&format!("@p{}! Locked in", player), 2000);
        if self.waiting.iter().any(|&w| w) {
            self.visualize_frame("Waiting for responses", 0);
        }
    }

    async fn handle_player_output(
        &mut self,
        _round: u32,
        player: usize,
        output: Option<&str>,
    ) -> Result<(), GameError> {
        if let Some(slot) = self.moves.get_mut(player) {
            *slot = output.map(str::to_string);
        }
        Ok(())
    }

    async fn update_game(&mut self, _round: u32) -> Result<(), GameError> {
        self.revealed = true;
        self.visualize_frame("Revealing choices", 2000);

        let first = self.parsed_move(0);
        let second = self.parsed_move(1);
        match (first, second) {
            (None, None) => {
                self.visualize_frame("@p0! and @p1! both had invalid moves!", 2000);
                return Err(GameError::GameOver(format!(
                    "both players had an invalid move: {:?}, {:?}",
                    self.moves[0], self.moves[1]
                )));
            }
            (None, Some(_)) => {
                self.visualize_frame("@p0! had an invalid move!", 2000);
                return Err(GameError::GameOver(format!(
                    "player 0 had an invalid move: {:?}",
                    self.moves[0]
                )));
            }
            (Some(_), None) => {
                self.visualize_frame("@p1! had an invalid move!", 2000);
                return Err(GameError::GameOver(format!(
                    "player 1 had an invalid move: {:?}",
                    self.moves[1]
                )));
            }
            (Some(first), Some(second)) => {
                let result = match self.round_winner() {
                    None => {
                        info!("Both players picked {}, this round is a draw", first.as_str());
                        "@p0! and @p1! draw.".to_string()
                    }
                    Some(winner) => {
                        let (won, lost) = if winner == 0 { (first, second) } else { (second, first) };
                        info!("{} beats {}, player {} wins this round", won.as_str(), lost.as_str(), winner);
                        self.scores[winner] += 1;
                        format!(
                            "@p{}!'s {} beats @p{}!'s {}!",
                            winner,
                            won.as_str(),
                            1 - winner,
                            lost.as_str()
                        )
                    }
                };
                self.visualize_frame(&result, 4000);
            }
        }

        if let Some(winner) = self.game_winner() {
            self.visualize_frame(&format!("@p{}! wins!", winner), 4000);
            return Err(GameError::GameOver(format!("player {} wins", winner)));
        }
        Ok(())
    }

    async fn on_game_over(&mut self) {
        self.visualize_frame("Game over.", 2000);
    }

    fn visualizer_data(&self) -> Option<String> {
        Some(self.snapshot("", 0))
    }

    fn min_connections(&self) -> usize {
        PLAYERS
    }

    fn max_connections(&self) -> usize {
        PLAYERS
    }

    fn start_cooldown(&self) -> u32 {
        1
    }
}
