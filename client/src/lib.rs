//! # Game Arena Client Library
//!
//! A reference text client for the game arena server. It connects over TCP,
//! greets the server with `HELLO`, prints every notice, answers every
//! prompt and keeps reading until the server says `quit` or goes away.
//!
//! ## Protocol Handling
//!
//! Server lines are interpreted with [`shared::ServerMessage`]:
//! - `Y: ` lines are prompts and get exactly one line back
//! - `N: ` lines are informational and are only printed
//! - `PING` lines are keepalives and are skipped silently
//! - `quit` ends the session
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! The [`network::Client`] connection, message loop and transcript.
//!
//! ### Input Module (`input`)
//! Where answers come from: fixed command-line answers or standard input.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::input::Answers;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:12345").await?;
//!     let mut answers = Answers::fixed(Some("alice".to_string()), vec!["Rock".to_string()]);
//!
//!     let transcript = client.run(&mut answers).await;
//!     println!("server sent {} messages", transcript.len());
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
