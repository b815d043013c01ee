//! Buffer relay: single-slot, last-write-wins handoff of stereo blocks from
//! the control thread to the render thread.
//!
//! The slot is an [`ArcSwapOption`]: `Some` is READY, `None` is EMPTY, and
//! one atomic swap moves both the block and the ready state. The render side
//! takes the block with `swap(None)` so a block is never played twice.
//!
//! Consumed blocks travel back to the publisher over an `rtrb` queue and are
//! dropped (or reused) there, so the render thread never frees memory.
//!
//! Delivery policy is whole-block replacement: a block longer than the
//! quantum has its tail discarded, a shorter one is padded with silence.

use crate::error::RelayError;
use arc_swap::ArcSwapOption;
use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::Arc;
use tracing::trace;

/// Capacity of the recycle queue (render → control, memory only).
/// Generous enough that the publisher can fall far behind before the render
/// side has to drop a block itself.
pub const RECYCLE_QUEUE_CAPACITY: usize = 64;

/// A stereo block of equal-length channels, any length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioFrameBlock {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl AudioFrameBlock {
    pub fn new(left: Vec<f32>, right: Vec<f32>) -> Result<Self, RelayError> {
        if left.len() != right.len() {
            return Err(RelayError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        Ok(Self { left, right })
    }

    /// A block with the same signal on both channels.
    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            right: samples.clone(),
            left: samples,
        }
    }

    pub fn silence(frames: usize) -> Self {
        Self {
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn into_channels(self) -> (Vec<f32>, Vec<f32>) {
        (self.left, self.right)
    }
}

/// What one quantum received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantumOutcome {
    /// A pending block was copied; `frames` per channel came from it.
    Delivered { frames: usize },
    /// Nothing was pending; every channel is silent.
    Silence,
}

impl QuantumOutcome {
    pub fn is_delivered(self) -> bool {
        matches!(self, QuantumOutcome::Delivered { .. })
    }
}

/// An owned quantum, for callers outside the render path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuantum {
    pub channels: Vec<Vec<f32>>,
    pub outcome: QuantumOutcome,
}

impl RenderedQuantum {
    pub fn is_silent(&self) -> bool {
        self.channels.iter().flatten().all(|&s| s == 0.0)
    }
}

/// Creates a connected relay pair.
///
/// Returns (publisher for the control thread, consumer for the render thread).
pub fn relay() -> (RelayPublisher, RelayConsumer) {
    let slot = Arc::new(ArcSwapOption::empty());
    let (recycle_tx, recycle_rx) = RingBuffer::new(RECYCLE_QUEUE_CAPACITY);
    (
        RelayPublisher {
            slot: Arc::clone(&slot),
            recycled: recycle_rx,
        },
        RelayConsumer {
            slot,
            recycle: recycle_tx,
        },
    )
}

/// Control-side end of the relay.
pub struct RelayPublisher {
    slot: Arc<ArcSwapOption<AudioFrameBlock>>,
    recycled: Consumer<Arc<AudioFrameBlock>>,
}

impl RelayPublisher {
    /// Replace whatever is pending with `block` and mark the slot ready.
    ///
    /// Never blocks. An unconsumed block is overwritten, not queued.
    pub fn publish(&mut self, block: AudioFrameBlock) {
        self.collect_garbage();
        if let Some(replaced) = self.slot.swap(Some(Arc::new(block))) {
            trace!(frames = replaced.len(), "unconsumed block overwritten");
        }
    }

    /// Publish from borrowed samples, reusing a consumed block's allocation
    /// when one with enough capacity is available.
    pub fn publish_from(&mut self, left: &[f32], right: &[f32]) -> Result<(), RelayError> {
        if left.len() != right.len() {
            return Err(RelayError::ChannelLengthMismatch {
                left: left.len(),
                right: right.len(),
            });
        }
        let mut block = self.reclaim().unwrap_or_default();
        block.left.clear();
        block.left.extend_from_slice(left);
        block.right.clear();
        block.right.extend_from_slice(right);
        self.publish(block);
        Ok(())
    }

    /// True while a published block has not been consumed.
    pub fn is_pending(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Withdraw a pending block without it being played.
    pub fn clear(&mut self) -> Option<AudioFrameBlock> {
        self.slot
            .swap(None)
            .map(|block| Arc::try_unwrap(block).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Drop every block the render side has handed back.
    pub fn collect_garbage(&mut self) -> usize {
        let mut dropped = 0;
        while self.recycled.pop().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn reclaim(&mut self) -> Option<AudioFrameBlock> {
        while let Ok(block) = self.recycled.pop() {
            if let Ok(block) = Arc::try_unwrap(block) {
                return Some(block);
            }
        }
        None
    }
}

/// Render-side end of the relay.
pub struct RelayConsumer {
    slot: Arc<ArcSwapOption<AudioFrameBlock>>,
    recycle: Producer<Arc<AudioFrameBlock>>,
}

impl RelayConsumer {
    /// Drain the slot into `outputs`, one `Vec` per channel.
    ///
    /// # RT Safety
    /// - No allocation; the taken block goes back to the publisher
    /// - No locking
    /// - Channel 0 gets left, 1 gets right, any further channel silence
    pub fn consume_into(&mut self, outputs: &mut [Vec<f32>]) -> QuantumOutcome {
        let Some(block) = self.slot.swap(None) else {
            for channel in outputs.iter_mut() {
                channel.fill(0.0);
            }
            return QuantumOutcome::Silence;
        };

        let mut frames = 0;
        for (index, channel) in outputs.iter_mut().enumerate() {
            let source = match index {
                0 => block.left(),
                1 => block.right(),
                _ => {
                    channel.fill(0.0);
                    continue;
                }
            };
            let n = source.len().min(channel.len());
            channel[..n].copy_from_slice(&source[..n]);
            channel[n..].fill(0.0);
            frames = frames.max(n);
        }

        // Queue full means the publisher stopped collecting; dropping here is
        // the only option left.
        let _ = self.recycle.push(block);

        QuantumOutcome::Delivered { frames }
    }

    /// Drain the slot into an interleaved buffer of `channel_count` channels.
    pub fn consume_interleaved(&mut self, out: &mut [f32], channel_count: usize) -> QuantumOutcome {
        let Some(block) = self.slot.swap(None) else {
            out.fill(0.0);
            return QuantumOutcome::Silence;
        };
        if channel_count == 0 {
            out.fill(0.0);
            let _ = self.recycle.push(block);
            return QuantumOutcome::Delivered { frames: 0 };
        }

        let frame_count = out.len() / channel_count;
        let n = block.len().min(frame_count);
        for (i, frame) in out.chunks_mut(channel_count).enumerate() {
            for (ch, sample) in frame.iter_mut().enumerate() {
                *sample = match ch {
                    0 if i < n => block.left()[i],
                    1 if i < n => block.right()[i],
                    _ => 0.0,
                };
            }
        }

        let _ = self.recycle.push(block);
        QuantumOutcome::Delivered { frames: n }
    }

    /// Allocating convenience for offline use and tests.
    pub fn consume(&mut self, frame_count: usize, channel_count: usize) -> RenderedQuantum {
        let mut channels = vec![vec![0.0; frame_count]; channel_count];
        let outcome = self.consume_into(&mut channels);
        RenderedQuantum { channels, outcome }
    }

    pub fn is_ready(&self) -> bool {
        self.slot.load().is_some()
    }
}
