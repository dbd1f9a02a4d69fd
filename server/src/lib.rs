//! # Game Arena Server Library
//!
//! This library hosts multiplayer, round-based games over persistent TCP
//! connections speaking a newline-delimited text protocol. Clients connect,
//! register a unique display name and are pooled; a session orchestrator
//! repeatedly assembles a roster from the pool, drives a pluggable game
//! through its lifecycle and then goes back to waiting for the next session.
//!
//! ## Core Responsibilities
//!
//! ### Connection Management
//! Handles the complete lifecycle of client connections including:
//! - First-line routing (`HELLO` handshake or legacy `GET /` probe)
//! - Display-name normalization, validation and uniqueness
//! - Periodic `PING` keepalive and dead-peer detection
//! - Exactly-once teardown with a final `quit` and a disconnect event
//! - Attribute maps that survive reconnection under the same name
//!
//! ### Session Orchestration
//! Runs the `Waiting -> Starting -> Running -> Ending` cycle forever:
//! - Waiting-room, countdown and starting frames for the visualizer
//! - Random roster selection bounded by the game's sizing rules
//! - Concurrent prompt fan-out with arrival-order feedback
//! - Abort on participant disconnection, ignoring bystanders
//!
//! ### Frame Stream
//! Every state change is emitted as a tagged text frame (`FRAME` for
//! incremental updates, `KEYFRAME` for full snapshots). Rendering is done
//! by an external consumer behind the [`frame_sink::FrameSink`] trait.
//!
//! ## Architecture Design
//!
//! ### Cooperative Tasks
//! Every connection has a handshake task and then a keepalive task; reads
//! and writes on one connection are serialized per direction. The registry
//! owns all shared connection state and is passed explicitly to whoever
//! needs it.
//!
//! ### Explicit Outcomes
//! Games end sessions by returning [`game::GameError`] variants. Internal
//! consistency failures surface as [`error::OrchestratorError`] and end the
//! orchestrator task, which the supervisor turns into a full shutdown.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! Accept loop, handshake, keepalive, send/read/prompt helpers and teardown.
//!
//! ### Connection Module (`connection`)
//! Per-connection transport halves, locks, closing state and attributes.
//!
//! ### Game Module (`game`)
//! The [`game::Game`] trait and the frame queue games push into.
//!
//! ### Orchestrator Module (`orchestrator`)
//! The session state machine.
//!
//! ### Supervisor Module (`supervisor`)
//! Runs the long-lived tasks and converges on shutdown.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::frame_sink::{run_frame_sink, LogFrameSink};
//! use server::games::RockPaperScissors;
//! use server::orchestrator::SessionOrchestrator;
//! use server::registry::ConnectionRegistry;
//! use server::supervisor::Supervisor;
//! use std::sync::Arc;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let (registry, events) = ConnectionRegistry::new(&config);
//!     let registry = Arc::new(registry);
//!     let (frames_tx, frames_rx) = mpsc::unbounded_channel();
//!
//!     let orchestrator = SessionOrchestrator::new(
//!         Arc::clone(&registry),
//!         events,
//!         frames_tx,
//!         &config,
//!         RockPaperScissors::new,
//!     );
//!
//!     let mut supervisor = Supervisor::new(config.shutdown_timeout);
//!     supervisor.spawn("server", Arc::clone(&registry).accept_loop());
//!     supervisor.spawn("visualizer", run_frame_sink(LogFrameSink::new("Rock Paper Scissors"), frames_rx));
//!     supervisor.spawn("game manager", orchestrator.run());
//!
//!     let report = supervisor.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     registry.close_all().await;
//!     println!("{:?}", report);
//! }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod frame_sink;
pub mod game;
pub mod games;
pub mod orchestrator;
pub mod registry;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;
