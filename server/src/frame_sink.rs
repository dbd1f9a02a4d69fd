//! Consumer side of the orchestrator's frame stream
//!
//! Frames arrive as tagged lines (`FRAME ...` or `KEYFRAME ...`). A
//! [`FrameSink`] presents each one and says how long to hold it before the
//! next is shown. Rendering is not part of this crate; [`LogFrameSink`] is a
//! headless sink that writes frames to the log.

use async_trait::async_trait;
use log::{debug, info};
use shared::{Frame, FrameError, LobbyStatus};
use std::time::Duration;
use tokio::sync::mpsc;

#[async_trait]
pub trait FrameSink: Send {
    /// Shows one frame and returns how long it should stay up.
    async fn present(&mut self, frame: &Frame) -> Duration;
}

/// Writes frames to the log without holding them.
#[derive(Debug, Default)]
pub struct LogFrameSink {
    game_name: String,
    presented: u64,
}

impl LogFrameSink {
    pub fn new(game_name: impl Into<String>) -> Self {
        Self {
            game_name: game_name.into(),
            presented: 0,
        }
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

#[async_trait]
impl FrameSink for LogFrameSink {
    async fn present(&mut self, frame: &Frame) -> Duration {
        self.presented += 1;

        match LobbyStatus::parse(&frame.payload) {
            Some(LobbyStatus::Waiting { required, names }) => {
                debug!(
                    "[{}] waiting to start, {}/{} players connected {:?}",
                    self.game_name,
                    names.len(),
                    required,
                    names
                );
            }
            Some(LobbyStatus::Countdown { seconds, names }) => {
                info!("[{}] starting in {}... {:?}", self.game_name, seconds, names);
            }
            Some(LobbyStatus::Starting { names }) => {
                info!("[{}] starting {:?}", self.game_name, names);
            }
            None if frame.is_key() => debug!("[{}] key frame {}", self.game_name, frame.payload),
            None => info!("[{}] {}", self.game_name, frame.payload),
        }

        Duration::ZERO
    }
}

/// Presents frames in order until the channel closes.
///
/// A line without a frame tag is a defect upstream and ends the loop with
/// an error.
pub async fn run_frame_sink<S: FrameSink>(
    mut sink: S,
    mut frames: mpsc::UnboundedReceiver<String>,
) -> Result<(), FrameError> {
    while let Some(line) = frames.recv().await {
        let frame = Frame::parse(&line)?;
        let hold = sink.present(&frame).await;
        if !hold.is_zero() {
            tokio::time::sleep(hold).await;
        }
    }

    info!("Frame stream closed");
    Ok(())
}
