use crate::input::Answers;
use log::{debug, info, warn};
use shared::{LineReader, LineWriter, ServerMessage, HELLO, QUIT};
use std::net::SocketAddr;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// A text client for the game server.
pub struct Client {
    reader: LineReader<OwnedReadHalf>,
    writer: LineWriter<OwnedWriteHalf>,
    server_addr: SocketAddr,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = TcpStream::connect(server_addr).await?;
        let server_addr = stream.peer_addr()?;
        info!("Connected to {}", server_addr);

        let (reader, writer) = stream.into_split();
        Ok(Client {
            reader: LineReader::new(reader),
            writer: LineWriter::new(writer),
            server_addr,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    /// Sends the greeting that starts the name handshake.
    pub async fn hello(&mut self) -> bool {
        self.send(HELLO).await
    }

    pub async fn send(&mut self, line: &str) -> bool {
        let sent = self.writer.write_line(line).await;
        if !sent {
            warn!("Write to {} was not successful", self.server_addr);
        }
        sent
    }

    /// Next line from the server that is not a keepalive ping.
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        loop {
            let line = self.reader.read_line().await?;
            match ServerMessage::parse(&line) {
                ServerMessage::Ping => debug!("PING"),
                message => return Some(message),
            }
        }
    }

    /// Greets the server and plays until it sends `quit`, closes the
    /// connection, or `answers` runs dry. Returns everything the server
    /// said, pings excluded.
    pub async fn run(&mut self, answers: &mut Answers) -> Vec<ServerMessage> {
        let mut transcript = Vec::new();

        if !self.hello().await {
            return transcript;
        }

        loop {
            let Some(message) = self.next_message().await else {
                info!("No message from server");
                break;
            };

            match &message {
                ServerMessage::Quit => {
                    info!("Quit command received");
                    transcript.push(message);
                    break;
                }
                ServerMessage::Prompt(prompt) => {
                    println!("{}", prompt);
                    let reply = answers.answer(prompt).await;
                    transcript.push(message);

                    let Some(reply) = reply else {
                        self.send(QUIT).await;
                        break;
                    };
                    if !self.send(&reply).await {
                        break;
                    }
                }
                ServerMessage::Notice(text) | ServerMessage::Text(text) => {
                    println!("{}", text);
                    transcript.push(message);
                }
                ServerMessage::Ping => {}
            }
        }

        self.close().await;
        transcript
    }

    pub async fn close(&mut self) {
        info!("Closing the connection");
        self.writer.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accepts one client and replays a fixed script, returning what the
    /// client sent.
    async fn scripted_server(script: &'static [&'static str]) -> (String, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (reader, writer) = stream.into_split();
            let mut reader = LineReader::new(reader);
            let mut writer = LineWriter::new(writer);
            let mut received = Vec::new();

            received.push(reader.read_line().await.unwrap());
            for line in script {
                writer.write_line(line).await;
                if line.starts_with("Y: ") {
                    received.push(reader.read_line().await.unwrap());
                }
            }
            received
        });

        (addr, server)
    }

    #[tokio::test]
    async fn test_plays_scripted_session() {
        let (addr, server) = scripted_server(&[
            "Y: What is your name?",
            "PING",
            "N: Welcome",
            "Y: Rock, Paper, or Scissors?",
            "quit",
        ])
        .await;

        let mut client = Client::connect(&addr).await.unwrap();
        let mut answers = Answers::fixed(Some("alice".into()), vec!["Rock".into()]);
        let transcript = client.run(&mut answers).await;

        assert_eq!(server.await.unwrap(), ["HELLO", "alice", "Rock"]);
        assert_eq!(
            transcript,
            [
                ServerMessage::Prompt("What is your name?".into()),
                ServerMessage::Notice("Welcome".into()),
                ServerMessage::Prompt("Rock, Paper, or Scissors?".into()),
                ServerMessage::Quit,
            ]
        );
    }

    #[tokio::test]
    async fn test_quits_when_out_of_answers() {
        let (addr, server) = scripted_server(&["Y: What is your name?"]).await;

        let mut client = Client::connect(&addr).await.unwrap();
        let mut answers = Answers::fixed(None, Vec::new());
        client.run(&mut answers).await;

        assert_eq!(server.await.unwrap(), ["HELLO", "quit"]);
    }

    #[tokio::test]
    async fn test_stops_at_end_of_stream() {
        let (addr, server) = scripted_server(&["N: bye"]).await;

        let mut client = Client::connect(&addr).await.unwrap();
        let mut answers = Answers::fixed(None, vec!["x".into()]);
        let transcript = client.run(&mut answers).await;

        server.await.unwrap();
        assert_eq!(transcript, [ServerMessage::Notice("bye".into())]);
    }
}
