//! Session orchestrator: waiting room, round loop and session teardown
//!
//! The orchestrator cycles forever through
//! `Waiting -> Starting -> Running(round) -> Ending -> Waiting`, building a
//! fresh game instance for every session. It reads the registry's live
//! connections and event queues but never mutates registry state except
//! through registry operations.
//!
//! ## Frames
//! Lobby frames and everything a game pushes into its [`FrameQueue`] leave
//! through one outgoing channel, tagged as regular or key frames. Game frames
//! are drained after every lifecycle call, with `@p{K}!` slots replaced by
//! the display name of roster entry `K`.
//!
//! ## Fan-out
//! Each round every participant is asked for a prompt in index order. The
//! prompts go out concurrently; completions are reported to the game in
//! arrival order and the collected outputs are handed back in index order.

use crate::config::ServerConfig;
use crate::connection::Connection;
use crate::error::OrchestratorError;
use crate::game::{FrameQueue, Game, GameError};
use crate::registry::{ConnectionEvents, ConnectionRegistry};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use shared::{Frame, LobbyStatus};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Attribute bumped on every participant when a session starts.
pub const SESSIONS_JOINED: &str = "sessions_joined";

/// Why a session stopped without a fatal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    GameOver(String),
    PlayerDisconnected(String),
}

/// Why the round loop stopped.
#[derive(Debug)]
enum Stop {
    Ended(SessionEnd),
    Fatal(OrchestratorError),
}

impl From<GameError> for Stop {
    fn from(err: GameError) -> Self {
        match err {
            GameError::GameOver(reason) => Stop::Ended(SessionEnd::GameOver(reason)),
            GameError::Fatal(reason) => Stop::Fatal(OrchestratorError::Game(reason)),
        }
    }
}

impl From<OrchestratorError> for Stop {
    fn from(err: OrchestratorError) -> Self {
        Stop::Fatal(err)
    }
}

impl From<SessionEnd> for Stop {
    fn from(end: SessionEnd) -> Self {
        Stop::Ended(end)
    }
}

/// Roster bounds read from the current game before waiting.
#[derive(Debug, Clone, Copy)]
struct LobbyRules {
    min: usize,
    max: usize,
}

/// Replaces every `@p{K}!` slot with the name of roster entry `K`.
pub fn fill_player_slots(text: &str, names: &[String]) -> String {
    let mut filled = text.to_string();
    for (index, name) in names.iter().enumerate() {
        filled = filled.replace(&format!("@p{}!", index), name);
    }
    filled
}

/// Chooses the session roster: a random subset when there are more live
/// connections than `max` (0 means no limit), otherwise everyone in random
/// order.
fn pick_roster(mut live: Vec<Arc<Connection>>, max: usize) -> Vec<Arc<Connection>> {
    let mut rng = rand::thread_rng();
    if max > 0 && live.len() > max {
        live.choose_multiple(&mut rng, max).cloned().collect()
    } else {
        live.shuffle(&mut rng);
        live
    }
}

pub struct SessionOrchestrator<G, F> {
    registry: Arc<ConnectionRegistry>,
    events: ConnectionEvents,
    factory: F,
    frames_out: mpsc::UnboundedSender<String>,
    game_frames: mpsc::UnboundedReceiver<String>,
    frame_queue: FrameQueue,
    game_name: Option<String>,
    start_ticks: u32,
    countdown: u32,
    poll_interval: Duration,
    _game: PhantomData<fn() -> G>,
}

impl<G, F> SessionOrchestrator<G, F>
where
    G: Game,
    F: FnMut(FrameQueue) -> G + Send,
{
    /// `factory` builds one game per session from the producer side of the
    /// game-frame queue. Tagged frames are sent to `frames_out`.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        events: ConnectionEvents,
        frames_out: mpsc::UnboundedSender<String>,
        config: &ServerConfig,
        factory: F,
    ) -> Self {
        let (frame_queue, game_frames) = FrameQueue::channel();
        Self {
            registry,
            events,
            factory,
            frames_out,
            game_frames,
            frame_queue,
            game_name: None,
            start_ticks: 0,
            countdown: 0,
            poll_interval: config.poll_interval,
            _game: PhantomData,
        }
    }

    /// Hosts sessions until cancelled or until a fatal error.
    pub async fn run(mut self) -> Result<(), OrchestratorError> {
        info!("Initializing game");
        let mut game = self.new_game()?;
        self.countdown = self.start_ticks;

        loop {
            info!("Waiting for connections");
            let rules = LobbyRules {
                min: game.min_connections(),
                max: game.max_connections(),
            };
            let roster = self.wait_for_players(rules).await;

            info!("Playing {} with {} players", self.name(), roster.len());
            let outcome = self.play_session(&mut game, &roster).await;

            drop(game);
            outcome?;

            info!("Initializing new game");
            game = self.new_game()?;
        }
    }

    fn name(&self) -> &str {
        self.game_name.as_deref().unwrap_or_default()
    }

    /// Builds the next game. The frame queue must be empty and the name must
    /// match the first instance.
    fn new_game(&mut self) -> Result<G, OrchestratorError> {
        if let Ok(frame) = self.game_frames.try_recv() {
            return Err(OrchestratorError::LeakedFrame { frame });
        }

        let game = (self.factory)(self.frame_queue.clone());
        let name = game.name();
        match &self.game_name {
            None => self.game_name = Some(name),
            Some(original) if *original != name => {
                return Err(OrchestratorError::GameRenamed {
                    original: original.clone(),
                    new: name,
                });
            }
            Some(_) => {}
        }

        self.start_ticks = game.start_cooldown();
        Ok(game)
    }

    fn reset_countdown(&mut self) {
        self.countdown = self.start_ticks;
    }

    /// Drains both event queues, resetting the countdown for every event.
    /// Returns the connections that went away.
    fn drain_connection_events(&mut self) -> Vec<Arc<Connection>> {
        while let Ok(connection) = self.events.connected.try_recv() {
            debug!("{} connected", connection.name());
            self.reset_countdown();
        }

        let mut departed = Vec::new();
        while let Ok(connection) = self.events.disconnected.try_recv() {
            debug!("{} disconnected", connection.name());
            self.reset_countdown();
            departed.push(connection);
        }
        departed
    }

    /// Ends the session if any roster member has disconnected.
    fn check_roster(&mut self, roster: &[Arc<Connection>]) -> Result<(), SessionEnd> {
        let departed = self.drain_connection_events();
        match departed
            .iter()
            .find(|gone| roster.iter().any(|p| p.id() == gone.id()))
        {
            Some(gone) => Err(SessionEnd::PlayerDisconnected(gone.name().to_string())),
            None => Ok(()),
        }
    }

    async fn wait_for_players(&mut self, rules: LobbyRules) -> Vec<Arc<Connection>> {
        loop {
            self.drain_connection_events();

            let live = self.registry.connections().await;
            let names: Vec<String> = live.iter().map(|c| c.name().to_string()).collect();
            debug!("There are {}/{} active connections: {:?}", live.len(), rules.min, names);

            if live.len() < rules.min {
                self.reset_countdown();
                self.emit_lobby(LobbyStatus::Waiting {
                    required: rules.min,
                    names,
                });
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            if self.countdown > 0 {
                info!("Starting in {}", self.countdown);
                self.emit_lobby(LobbyStatus::Countdown {
                    seconds: self.countdown,
                    names,
                });
                self.countdown -= 1;
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            self.emit_lobby(LobbyStatus::Starting { names });
            self.reset_countdown();
            return pick_roster(live, rules.max);
        }
    }

    /// Runs one session to its end, always passing through the ending
    /// sequence. Only fatal errors are returned.
    async fn play_session(
        &mut self,
        game: &mut G,
        roster: &[Arc<Connection>],
    ) -> Result<(), OrchestratorError> {
        for connection in roster {
            connection.increment_attribute(SESSIONS_JOINED, 1);
        }
        let names: Vec<String> = roster.iter().map(|c| c.name().to_string()).collect();

        let fatal = match self.run_rounds(game, roster, &names).await {
            Stop::Ended(SessionEnd::GameOver(reason)) => {
                info!("Game over: {}", reason);
                None
            }
            Stop::Ended(SessionEnd::PlayerDisconnected(name)) => {
                warn!("Player {} disconnected during game", name);
                None
            }
            Stop::Fatal(err) => {
                error!("Session failed: {}", err);
                Some(err)
            }
        };

        self.flush_game_frames(&names);
        self.emit_snapshot(game, &names);
        game.on_game_over().await;
        self.flush_game_frames(&names);

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn run_rounds(&mut self, game: &mut G, roster: &[Arc<Connection>], names: &[String]) -> Stop {
        debug!("Setting up game for {:?}", names);
        let setup = game.setup_game(names).await;
        self.flush_game_frames(names);
        if let Err(err) = setup {
            return err.into();
        }

        let mut round = 0;
        loop {
            if let Err(stop) = self.play_round(game, roster, names, round).await {
                return stop;
            }
            round += 1;
        }
    }

    async fn play_round(
        &mut self,
        game: &mut G,
        roster: &[Arc<Connection>],
        names: &[String],
        round: u32,
    ) -> Result<(), Stop> {
        info!("Starting round {}", round);

        let prepared = game.prepare_round(round).await;
        self.flush_game_frames(names);
        if let Some(note) = prepared? {
            debug!("Round {} prepared: {}", round, note);
        }

        let outputs = self.collect_player_outputs(game, roster, names, round).await?;

        for (player, output) in &outputs {
            let handled = game.handle_player_output(round, *player, output.as_deref()).await;
            self.flush_game_frames(names);
            handled?;
        }

        let updated = game.update_game(round).await;
        self.flush_game_frames(names);
        updated?;

        self.emit_snapshot(game, names);
        Ok(())
    }

    /// Prompts every participant the game has a question for and collects
    /// one response per prompt, ordered by player index.
    async fn collect_player_outputs(
        &mut self,
        game: &mut G,
        roster: &[Arc<Connection>],
        names: &[String],
        round: u32,
    ) -> Result<Vec<(usize, Option<String>)>, Stop> {
        let mut pending = JoinSet::new();
        let mut expected = 0;

        for (index, connection) in roster.iter().enumerate() {
            let prompt = game.player_input(round, index).await;
            self.flush_game_frames(names);

            let Some(prompt) = prompt.filter(|p| !p.is_empty()) else {
                continue;
            };

            let registry = Arc::clone(&self.registry);
            let connection = Arc::clone(connection);
            pending.spawn(async move {
                let response = registry.get_response(&connection, &prompt).await;
                (index, response)
            });
            expected += 1;
        }

        if expected == 0 {
            return Err(OrchestratorError::NoPlayerInputs { round }.into());
        }

        let mut responses = BTreeMap::new();
        while let Some(joined) = pending.join_next().await {
            let (index, response) = match joined {
                Ok(completed) => completed,
                Err(e) => {
                    error!("Response task failed on round {}: {}", round, e);
                    continue;
                }
            };

            debug!("Response from {} on round {}: {:?}", index, round, response);
            game.on_player_output(round, index, response.as_deref()).await;
            self.flush_game_frames(names);
            responses.insert(index, response);
        }

        if responses.len() != expected {
            return Err(OrchestratorError::ResponseCountMismatch {
                round,
                expected,
                received: responses.len(),
            }
            .into());
        }

        self.check_roster(roster)?;
        Ok(responses.into_iter().collect())
    }

    fn emit_lobby(&self, status: LobbyStatus) {
        debug!("Lobby frame: {}", status);
        self.send_frame(Frame::update(status.to_string()));
    }

    fn emit_snapshot(&mut self, game: &G, names: &[String]) {
        self.flush_game_frames(names);
        if let Some(snapshot) = game.visualizer_data() {
            self.send_frame(Frame::key(fill_player_slots(&snapshot, names)));
        }
    }

    fn flush_game_frames(&mut self, names: &[String]) {
        while let Ok(payload) = self.game_frames.try_recv() {
            self.send_frame(Frame::update(fill_player_slots(&payload, names)));
        }
    }

    fn send_frame(&self, frame: Frame) {
        if self.frames_out.send(frame.to_string()).is_err() {
            debug!("Frame sink is gone, dropping frame");
        }
    }
}
