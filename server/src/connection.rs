//! A registered, named client connection and the half-open link that precedes it

use log::debug;
use shared::{prefix_message, LineReader, LineWriter, QUIT};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Named integer counters carried across reconnection under the same name.
pub type Attributes = HashMap<String, i64>;

/// How application lines are framed for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Interactive socket client; lines carry a `Y: ` / `N: ` marker.
    Socket,
    /// Legacy HTTP probe; lines go out unprefixed.
    Browser,
}

impl ConnectionKind {
    pub fn frame(self, message: &str, expects_reply: bool) -> String {
        match self {
            ConnectionKind::Socket => prefix_message(message, expects_reply),
            ConnectionKind::Browser => message.to_string(),
        }
    }
}

/// Transport halves of an accepted connection before it has a name.
///
/// Owned by the accept handler alone, so nothing here is shared or locked.
pub struct PendingLink {
    pub addr: SocketAddr,
    pub kind: ConnectionKind,
    pub reader: LineReader<BoxedReader>,
    pub writer: LineWriter<BoxedWriter>,
}

impl PendingLink {
    pub fn new(addr: SocketAddr, reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self {
            addr,
            kind: ConnectionKind::Socket,
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
        }
    }

    /// Reads one line. End of stream and `quit` both yield `None`.
    pub async fn read_message(&mut self) -> Option<String> {
        match self.reader.read_line().await {
            Some(line) if line == QUIT => {
                debug!("Quit received from {} during handshake", self.addr);
                None
            }
            other => other,
        }
    }

    pub async fn send_message(&mut self, message: &str) -> bool {
        let framed = self.kind.frame(message, false);
        self.writer.write_line(&framed).await
    }

    pub async fn get_response(&mut self, prompt: &str) -> Option<String> {
        let framed = self.kind.frame(prompt, true);
        if !self.writer.write_line(&framed).await {
            return None;
        }
        self.read_message().await
    }

    pub async fn close(&mut self) {
        self.writer.close().await;
    }
}

/// One registered client session.
///
/// Reads and writes are serialized per direction by their own locks, so the
/// keepalive prober can write while a response is being awaited.
pub struct Connection {
    id: u64,
    addr: SocketAddr,
    name: String,
    kind: ConnectionKind,
    reader: Mutex<LineReader<BoxedReader>>,
    writer: Mutex<LineWriter<BoxedWriter>>,
    attributes: StdMutex<Attributes>,
    closed: AtomicBool,
    closing: CancellationToken,
}

impl Connection {
    pub fn new(id: u64, name: String, link: PendingLink, attributes: Attributes) -> Self {
        Self {
            id,
            addr: link.addr,
            name,
            kind: link.kind,
            reader: Mutex::new(link.reader),
            writer: Mutex::new(link.writer),
            attributes: StdMutex::new(attributes),
            closed: AtomicBool::new(false),
            closing: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Claims the right to tear this connection down. Only the first caller
    /// gets `true`.
    pub(crate) fn begin_close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    /// Resolves once teardown has finished.
    pub async fn closed(&self) {
        self.closing.cancelled().await
    }

    /// Reads one raw line. Returns `None` at end of stream or once the
    /// connection is being torn down, even if a read is in flight.
    pub(crate) async fn read_line(&self) -> Option<String> {
        tokio::select! {
            _ = self.closing.cancelled() => None,
            line = async { self.reader.lock().await.read_line().await } => line,
        }
    }

    pub(crate) async fn write_line(&self, line: &str) -> bool {
        self.writer.lock().await.write_line(line).await
    }

    /// Sends the final `quit` unless the writer is already closing, then
    /// shuts the write side down.
    pub(crate) async fn shutdown(&self) {
        let mut writer = self.writer.lock().await;
        if !writer.is_closing() && !writer.write_line(QUIT).await {
            debug!("Final quit to {} was not delivered", self.name);
        }
        writer.close().await;
    }

    /// Marks teardown complete and wakes any pending reader.
    pub(crate) fn finish_close(&self) {
        self.closing.cancel();
    }

    pub fn increment_attribute(&self, attribute: &str, amount: i64) {
        let mut attributes = self.lock_attributes();
        *attributes.entry(attribute.to_string()).or_insert(0) += amount;
    }

    pub fn attribute(&self, attribute: &str) -> Option<i64> {
        self.lock_attributes().get(attribute).copied()
    }

    pub fn attributes(&self) -> Attributes {
        self.lock_attributes().clone()
    }

    fn lock_attributes(&self) -> std::sync::MutexGuard<'_, Attributes> {
        // Counters stay usable even if a holder panicked mid-update.
        self.attributes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("closed", &self.is_closed())
            .finish()
    }
}
