//! Control message types for control → render communication.
//!
//! Messages arrive on the control thread (from an engine, a socket, a UI
//! port) and are applied to the [`RelayPublisher`]. Only the relay slot ever
//! crosses to the render thread; messages themselves never do.

use crate::error::RelayError;
use crate::relay::{AudioFrameBlock, RelayPublisher};
use tracing::{debug, warn};

/// Control messages handled on the control thread.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlMsg {
    /// Deliver a stereo block. A message missing either channel is ignored.
    Data {
        left: Option<Vec<f32>>,
        right: Option<Vec<f32>>,
    },
}

/// What applying a message did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Published { frames: usize },
    Ignored,
}

impl ControlMsg {
    pub fn data(left: Vec<f32>, right: Vec<f32>) -> Self {
        ControlMsg::Data {
            left: Some(left),
            right: Some(right),
        }
    }

    /// Returns the command tag (for debugging and wire framing).
    pub fn command(&self) -> &'static str {
        match self {
            ControlMsg::Data { .. } => "data",
        }
    }

    /// Apply this message to the relay.
    ///
    /// A half-filled data message is a no-op; unequal channel lengths are
    /// rejected and nothing is published.
    pub fn apply(self, publisher: &mut RelayPublisher) -> Result<Applied, RelayError> {
        match self {
            ControlMsg::Data {
                left: Some(left),
                right: Some(right),
            } => {
                let block = AudioFrameBlock::new(left, right).inspect_err(|err| {
                    warn!(%err, "dropping malformed data message");
                })?;
                let frames = block.len();
                publisher.publish(block);
                Ok(Applied::Published { frames })
            }
            ControlMsg::Data { .. } => {
                debug!("data message without both channels ignored");
                Ok(Applied::Ignored)
            }
        }
    }
}
