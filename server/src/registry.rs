//! Connection registry: accept loop, name handshake, keepalive and teardown
//!
//! This module owns every piece of shared connection state:
//! - The live connection list and the name index
//! - Attribute maps saved for names that have disconnected
//! - The connect and disconnect event queues read by the orchestrator
//!
//! Nothing outside the registry mutates that state. Other components hold
//! `Arc<Connection>` handles and call back into the registry to send, read
//! or close.

use crate::config::ServerConfig;
use crate::connection::{Attributes, BoxedReader, BoxedWriter, Connection, ConnectionKind, PendingLink};
use crate::error::ServerError;
use futures::future::join_all;
use log::{debug, error, info, warn};
use shared::{validate_name, NameError, HELLO, HTTP_REQUEST_PREFIX, NAME_PROMPT, PING, QUIT};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Fixed reply for the legacy HTTP path.
const HTTP_RESPONSE: &str = "HTTP/1.0 200 OK\n\n<html><body><h1>Hello World</h1></body></html>";

/// Live connections, the name index and remembered attributes.
///
/// Plain data with synchronous methods; [`ConnectionRegistry`] wraps it in a
/// lock so that a name check and the matching insert happen atomically.
#[derive(Default)]
pub struct RegistryState {
    connections: Vec<Arc<Connection>>,
    names: HashMap<String, Arc<Connection>>,
    saved_attributes: HashMap<String, Attributes>,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Adds a connection to the live set and the name index.
    pub fn insert(&mut self, connection: Arc<Connection>) {
        self.names
            .insert(connection.name().to_string(), Arc::clone(&connection));
        self.connections.push(connection);
    }

    /// Removes a connection from the live set and frees its name.
    ///
    /// Returns false if it was in neither. Only the entry belonging to this
    /// exact connection is released, never a newer holder of the same name.
    pub fn remove(&mut self, connection: &Connection) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.id() != connection.id());
        let in_list = self.connections.len() != before;

        let in_names = match self.names.get(connection.name()) {
            Some(holder) if holder.id() == connection.id() => {
                self.names.remove(connection.name());
                true
            }
            _ => false,
        };

        if in_list != in_names {
            warn!(
                "Connection {} was only partially registered (list: {}, names: {})",
                connection.name(),
                in_list,
                in_names
            );
        }
        in_list || in_names
    }

    pub fn save_attributes(&mut self, name: &str, attributes: Attributes) {
        self.saved_attributes.insert(name.to_string(), attributes);
    }

    pub fn saved_attributes(&self, name: &str) -> Option<&Attributes> {
        self.saved_attributes.get(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Connection>> {
        self.names.get(name).cloned()
    }

    /// Live connections in admission order.
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections.clone()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Receiving ends of the registry's two event queues.
pub struct ConnectionEvents {
    pub connected: mpsc::UnboundedReceiver<Arc<Connection>>,
    pub disconnected: mpsc::UnboundedReceiver<Arc<Connection>>,
}

pub struct ConnectionRegistry {
    state: Arc<RwLock<RegistryState>>,
    next_id: AtomicU64,
    connected_tx: mpsc::UnboundedSender<Arc<Connection>>,
    disconnected_tx: mpsc::UnboundedSender<Arc<Connection>>,
    bind_addr: String,
    bind_timeout: Duration,
    keepalive_interval: Duration,
    shutdown: CancellationToken,
}

impl ConnectionRegistry {
    pub fn new(config: &ServerConfig) -> (Self, ConnectionEvents) {
        let (connected_tx, connected) = mpsc::unbounded_channel();
        let (disconnected_tx, disconnected) = mpsc::unbounded_channel();

        let registry = Self {
            state: Arc::new(RwLock::new(RegistryState::new())),
            next_id: AtomicU64::new(1),
            connected_tx,
            disconnected_tx,
            bind_addr: config.bind_addr.clone(),
            bind_timeout: config.bind_timeout,
            keepalive_interval: config.keepalive_interval,
            shutdown: CancellationToken::new(),
        };

        (
            registry,
            ConnectionEvents {
                connected,
                disconnected,
            },
        )
    }

    /// Binds the configured address and serves until cancelled.
    pub async fn accept_loop(self: Arc<Self>) -> Result<(), ServerError> {
        let listener =
            match tokio::time::timeout(self.bind_timeout, TcpListener::bind(&self.bind_addr)).await {
                Ok(Ok(listener)) => listener,
                Ok(Err(source)) => {
                    error!("Server could not be started on {}: {}", self.bind_addr, source);
                    return Err(ServerError::Bind {
                        addr: self.bind_addr.clone(),
                        source,
                    });
                }
                Err(_) => {
                    error!("Server start timed out on {}", self.bind_addr);
                    return Err(ServerError::BindTimeout {
                        addr: self.bind_addr.clone(),
                        timeout: self.bind_timeout,
                    });
                }
            };

        self.serve(listener).await;
        Ok(())
    }

    /// Accepts connections from an already bound listener, forever.
    ///
    /// Dropping this future (the supervisor cancelling the accept task)
    /// cancels every handshake and keepalive task the registry started.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        let _cancel_children = self.shutdown.clone().drop_guard();

        match listener.local_addr() {
            Ok(addr) => info!("Server listening on {}", addr),
            Err(e) => warn!("Server listening on unknown address: {}", e),
        }

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let registry = Arc::clone(&self);
                    tokio::spawn(registry.handle_connection(stream, addr));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }

    /// Runs the first-line routing and, for socket clients, the handshake.
    pub async fn handle_connection<S>(self: Arc<Self>, stream: S, addr: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        info!("Connected to {}", addr);

        let (reader, writer) = tokio::io::split(stream);
        let mut link = PendingLink::new(
            addr,
            Box::new(reader) as BoxedReader,
            Box::new(writer) as BoxedWriter,
        );

        let shutdown = self.shutdown.clone();
        let admitted = tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Handshake with {} cancelled", addr);
                None
            }
            admitted = self.admit(&mut link) => admitted,
        };

        match admitted {
            Some(name) => self.register(name, link),
            None => link.close().await,
        }
    }

    /// Routes on the first line. Returns the accepted display name for a
    /// socket client that completed the handshake.
    async fn admit(&self, link: &mut PendingLink) -> Option<String> {
        let Some(first) = link.read_message().await else {
            info!("Connection {} closed while getting initial message", link.addr);
            return None;
        };

        if first.starts_with(HTTP_REQUEST_PREFIX) {
            link.kind = ConnectionKind::Browser;
            self.answer_http(link, first).await;
            return None;
        }

        if first != HELLO {
            error!("Connection {} provided unexpected message: {:?}", link.addr, first);
            return None;
        }

        link.kind = ConnectionKind::Socket;
        self.negotiate_name(link).await
    }

    async fn answer_http(&self, link: &mut PendingLink, request_line: String) {
        let mut request = vec![request_line];
        while let Some(line) = link.read_message().await {
            if line.is_empty() {
                break;
            }
            request.push(line);
        }
        debug!("HTTP request from {}: {:?}", link.addr, request);

        if !link.send_message(HTTP_RESPONSE).await {
            info!("HTTP response to {} was not delivered", link.addr);
        }
    }

    /// Prompts until the client offers an acceptable, free name.
    ///
    /// The free-name check here is advisory; [`Self::register`] repeats it
    /// under the write lock.
    async fn negotiate_name(&self, link: &mut PendingLink) -> Option<String> {
        loop {
            let Some(answer) = link.get_response(NAME_PROMPT).await else {
                info!("Connection {} closed while getting name", link.addr);
                return None;
            };

            let name = match validate_name(&answer) {
                Ok(name) => name,
                Err(reason) => {
                    debug!("Rejected name {:?} from {}: {}", answer, link.addr, reason);
                    link.send_message(&reason.to_string()).await;
                    continue;
                }
            };

            if self.state.read().await.name_exists(&name) {
                link.send_message(&NameError::Taken.to_string()).await;
                continue;
            }

            return Some(name);
        }
    }

    /// Admits a named link unless the name was claimed in the meantime.
    fn register(self: Arc<Self>, name: String, link: PendingLink) {
        tokio::spawn(async move {
            let admitted = {
                let mut state = self.state.write().await;
                if state.name_exists(&name) {
                    Err(link)
                } else {
                    let attributes = match state.saved_attributes(&name) {
                        Some(saved) => {
                            debug!("{} has previously played, restoring attributes", name);
                            saved.clone()
                        }
                        None => Attributes::new(),
                    };

                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let connection = Arc::new(Connection::new(id, name, link, attributes));
                    state.insert(Arc::clone(&connection));
                    Ok(connection)
                }
            };

            let connection = match admitted {
                Ok(connection) => connection,
                Err(link) => return self.retry_taken_name(link).await,
            };

            info!("Client {} registered from {}", connection.name(), connection.addr());
            if self.connected_tx.send(Arc::clone(&connection)).is_err() {
                debug!("Nobody is listening for connect events");
            }

            self.keepalive(connection).await;
        });
    }

    /// Lost the race for a name between the check and the insert.
    async fn retry_taken_name(self: Arc<Self>, mut link: PendingLink) {
        link.send_message(&NameError::Taken.to_string()).await;
        let shutdown = self.shutdown.clone();
        let name = tokio::select! {
            _ = shutdown.cancelled() => None,
            name = self.negotiate_name(&mut link) => name,
        };
        match name {
            Some(name) => self.register(name, link),
            None => link.close().await,
        }
    }

    /// Pings until a write fails, the connection closes or the registry
    /// shuts down.
    async fn keepalive(&self, connection: Arc<Connection>) {
        loop {
            if connection.is_closed() {
                debug!("Ping ({}) stopped, connection is already closed", connection.name());
                return;
            }

            if !connection.write_line(PING).await {
                info!("Ping ({}) was not successful", connection.name());
                self.close_connection(&connection).await;
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.keepalive_interval) => {}
                _ = connection.closed() => {}
                _ = self.shutdown.cancelled() => return,
            }
        }
    }

    /// Sends an unsolicited line. A failed write closes the connection.
    pub async fn send_message(&self, connection: &Arc<Connection>, message: &str) -> bool {
        let framed = connection.kind().frame(message, false);
        if connection.write_line(&framed).await {
            return true;
        }

        info!("Write to {} was not successful", connection.name());
        self.close_connection(connection).await;
        false
    }

    /// Reads one line. End of stream or `quit` closes the connection and
    /// yields `None`.
    pub async fn read_message(&self, connection: &Arc<Connection>) -> Option<String> {
        match connection.read_line().await {
            None => {
                info!("No message from {}", connection.name());
                self.close_connection(connection).await;
                None
            }
            Some(line) if line == QUIT => {
                info!("Quit command received from {}", connection.name());
                self.close_connection(connection).await;
                None
            }
            Some(line) => {
                debug!("READ ({}) {}", connection.name(), line);
                Some(line)
            }
        }
    }

    /// Sends a prompt that expects a reply and reads exactly one line back.
    pub async fn get_response(&self, connection: &Arc<Connection>, prompt: &str) -> Option<String> {
        let framed = connection.kind().frame(prompt, true);
        if !connection.write_line(&framed).await {
            info!("Prompt to {} was not successful", connection.name());
            self.close_connection(connection).await;
            return None;
        }
        self.read_message(connection).await
    }

    /// Tears a connection down. Safe to call any number of times from any
    /// task; only the first call has an effect and every call returns once
    /// the disconnect event has been queued.
    ///
    /// The teardown itself runs on its own task, so dropping this future
    /// part way never leaves a connection marked closed but still registered.
    pub async fn close_connection(&self, connection: &Arc<Connection>) {
        if !connection.begin_close() {
            debug!("Connection {} is already closing", connection.name());
            connection.closed().await;
            return;
        }

        info!("Closing connection {}", connection.name());
        let teardown = tokio::spawn(Self::teardown(
            Arc::clone(&self.state),
            self.disconnected_tx.clone(),
            Arc::clone(connection),
        ));

        if let Err(e) = teardown.await {
            error!("Teardown of {} failed: {}", connection.name(), e);
            connection.finish_close();
        }
    }

    async fn teardown(
        state: Arc<RwLock<RegistryState>>,
        disconnected_tx: mpsc::UnboundedSender<Arc<Connection>>,
        connection: Arc<Connection>,
    ) {
        connection.shutdown().await;

        {
            let mut state = state.write().await;
            if !state.remove(&connection) {
                warn!("Connection {} was not registered", connection.name());
            }

            let attributes = connection.attributes();
            if !attributes.is_empty() {
                state.save_attributes(connection.name(), attributes);
            }
        }

        if disconnected_tx.send(Arc::clone(&connection)).is_err() {
            debug!("Nobody is listening for disconnect events");
        }
        connection.finish_close();
    }

    /// Closes every live connection.
    pub async fn close_all(&self) {
        let connections = self.connections().await;
        debug!("Closing {} connections", connections.len());
        join_all(connections.iter().map(|c| self.close_connection(c))).await;
    }

    /// Snapshot of the live connections in admission order.
    pub async fn connections(&self) -> Vec<Arc<Connection>> {
        self.state.read().await.connections()
    }

    pub async fn connection(&self, name: &str) -> Option<Arc<Connection>> {
        self.state.read().await.get(name)
    }

    pub async fn saved_attributes(&self, name: &str) -> Option<Attributes> {
        self.state.read().await.saved_attributes(name).cloned()
    }
}
