//! Helpers shared by the unit tests: in-memory links, scripted clients and a
//! scripted game.

use crate::config::ServerConfig;
use crate::connection::{BoxedReader, BoxedWriter, Connection, PendingLink};
use crate::game::{FrameQueue, Game, GameError};
use crate::registry::{ConnectionEvents, ConnectionRegistry};
use async_trait::async_trait;
use shared::{LineReader, LineWriter, ServerMessage};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

const DUPLEX_CAPACITY: usize = 64 * 1024;

/// Client end of an in-memory connection.
pub struct TestPeer {
    pub reader: LineReader<ReadHalf<DuplexStream>>,
    pub writer: LineWriter<WriteHalf<DuplexStream>>,
}

pub fn test_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 40000))
}

pub fn fast_config() -> ServerConfig {
    ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        bind_timeout: Duration::from_secs(1),
        keepalive_interval: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
        shutdown_timeout: Duration::from_secs(1),
    }
}

fn peer_pair() -> (DuplexStream, TestPeer) {
    let (server_end, client_end) = tokio::io::duplex(DUPLEX_CAPACITY);
    let (reader, writer) = tokio::io::split(client_end);
    let peer = TestPeer {
        reader: LineReader::new(reader),
        writer: LineWriter::new(writer),
    };
    (server_end, peer)
}

/// A pending link whose far end is returned as a [`TestPeer`].
pub fn duplex_link() -> (PendingLink, TestPeer) {
    let (server_end, peer) = peer_pair();
    let (reader, writer) = tokio::io::split(server_end);
    let link = PendingLink::new(
        test_addr(),
        Box::new(reader) as BoxedReader,
        Box::new(writer) as BoxedWriter,
    );
    (link, peer)
}

pub fn registry(config: ServerConfig) -> (Arc<ConnectionRegistry>, ConnectionEvents) {
    let (registry, events) = ConnectionRegistry::new(&config);
    (Arc::new(registry), events)
}

/// Opens an in-memory connection that the registry handles like an
/// accepted socket.
pub fn connect(registry: &Arc<ConnectionRegistry>) -> TestPeer {
    let (server_end, peer) = peer_pair();
    tokio::spawn(Arc::clone(registry).handle_connection(server_end, test_addr()));
    peer
}

/// Next line that is not a keepalive ping.
pub async fn next_line(peer: &mut TestPeer) -> Option<String> {
    loop {
        let line = tokio::time::timeout(Duration::from_secs(5), peer.reader.read_line())
            .await
            .expect("timed out waiting for a line")?;
        if line != shared::PING {
            return Some(line);
        }
    }
}

/// Completes the handshake under `name` without consuming any event.
pub async fn join(registry: &Arc<ConnectionRegistry>, name: &str) -> TestPeer {
    let mut peer = connect(registry);
    assert!(peer.writer.write_line(shared::HELLO).await);
    assert_eq!(
        next_line(&mut peer).await.as_deref(),
        Some("Y: What is your name?")
    );
    assert!(peer.writer.write_line(name).await);

    for _ in 0..500 {
        if registry.connection(name).await.is_some() {
            return peer;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("{} was never registered", name);
}

/// Completes the handshake and returns the connection from the connect
/// event.
pub async fn register_client(
    registry: &Arc<ConnectionRegistry>,
    events: &mut ConnectionEvents,
    name: &str,
) -> (Arc<Connection>, TestPeer) {
    let peer = join(registry, name).await;
    let connection = tokio::time::timeout(Duration::from_secs(2), events.connected.recv())
        .await
        .expect("no connect event")
        .expect("connect queue closed");
    assert_eq!(connection.name(), name);
    (connection, peer)
}

/// Answers every prompt with `answer` (after `delay`) and records the
/// notices it receives, until the server closes the connection.
pub fn spawn_bot(mut peer: TestPeer, answer: &'static str, delay: Duration) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut notices = Vec::new();
        while let Some(line) = peer.reader.read_line().await {
            match ServerMessage::parse(&line) {
                ServerMessage::Prompt(_) => {
                    tokio::time::sleep(delay).await;
                    if !peer.writer.write_line(answer).await {
                        break;
                    }
                }
                ServerMessage::Notice(text) | ServerMessage::Text(text) => notices.push(text),
                ServerMessage::Ping => {}
                ServerMessage::Quit => break,
            }
        }
        notices
    })
}

/// Shared record of the calls a [`ScriptedGame`] received.
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn calls(log: &CallLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

/// A game whose behaviour is fixed up front and whose calls are logged.
pub struct ScriptedGame {
    pub log: CallLog,
    pub frames: FrameQueue,
    pub name: String,
    pub min_players: usize,
    pub max_players: usize,
    pub cooldown: u32,
    /// Round whose `update_game` reports game over.
    pub last_round: u32,
    /// Prompt sent to every player; `None` prompts nobody.
    pub prompt: Option<String>,
    /// Frame pushed from `Drop`, to simulate a game leaking frames.
    pub frame_on_drop: Option<String>,
}

impl ScriptedGame {
    pub fn new(log: CallLog, frames: FrameQueue) -> Self {
        Self {
            log,
            frames,
            name: "Scripted".to_string(),
            min_players: 2,
            max_players: 0,
            cooldown: 0,
            last_round: 0,
            prompt: Some("move?".to_string()),
            frame_on_drop: None,
        }
    }

    fn record(&self, call: String) {
        self.log.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Game for ScriptedGame {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn setup_game(&mut self, players: &[String]) -> Result<(), GameError> {
        self.record(format!("setup {}", players.join(",")));
        self.frames.push("@p0! is first");
        Ok(())
    }

    async fn prepare_round(&mut self, round: u32) -> Result<Option<String>, GameError> {
        self.record(format!("prepare {}", round));
        Ok(None)
    }

    async fn player_input(&mut self, round: u32, player: usize) -> Option<String> {
        self.record(format!("input {} {}", round, player));
        self.prompt.clone()
    }

    async fn on_player_output(&mut self, round: u32, player: usize, output: Option<&str>) {
        self.record(format!("output {} {} {}", round, player, output.unwrap_or("-")));
    }

    async fn handle_player_output(
        &mut self,
        round: u32,
        player: usize,
        output: Option<&str>,
    ) -> Result<(), GameError> {
        self.record(format!("handle {} {} {}", round, player, output.unwrap_or("-")));
        Ok(())
    }

    async fn update_game(&mut self, round: u32) -> Result<(), GameError> {
        self.record(format!("update {}", round));
        if round >= self.last_round {
            return Err(GameError::GameOver(format!("done after {}", round)));
        }
        Ok(())
    }

    async fn on_game_over(&mut self) {
        self.record("game over".to_string());
    }

    fn visualizer_data(&self) -> Option<String> {
        Some(format!("snapshot {}", self.name))
    }

    fn min_connections(&self) -> usize {
        self.min_players
    }

    fn max_connections(&self) -> usize {
        self.max_players
    }

    fn start_cooldown(&self) -> u32 {
        self.cooldown
    }
}

impl Drop for ScriptedGame {
    fn drop(&mut self) {
        if let Some(frame) = self.frame_on_drop.take() {
            self.frames.push(frame);
        }
    }
}
