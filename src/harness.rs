//! RT Proof Harness: drives both ends of a relay from one thread so tests can
//! script publish/quantum interleavings deterministically.

use crate::invariant_rt::{drain_invariant_signals, new_invariant_queue};
use crate::relay::{relay, AudioFrameBlock, RelayPublisher};
use crate::rt::{process_safe, RenderCallback};
use rtrb::Consumer;

pub struct RtHarness {
    publisher: RelayPublisher,
    callback: RenderCallback,
    outputs: Vec<Vec<f32>>,
    signals: Consumer<u8>,
}

impl RtHarness {
    pub fn new(quantum: usize, channel_count: usize) -> Self {
        let (publisher, consumer) = relay();
        let (inv_tx, signals) = new_invariant_queue();
        Self {
            publisher,
            callback: RenderCallback::with_invariants(consumer, inv_tx),
            outputs: vec![vec![0.0; quantum]; channel_count],
            signals,
        }
    }

    pub fn publish(&mut self, block: AudioFrameBlock) {
        self.publisher.publish(block);
    }

    pub fn publisher(&mut self) -> &mut RelayPublisher {
        &mut self.publisher
    }

    /// Run one quantum; returns whether it carried a published block.
    pub fn run_quantum(&mut self) -> bool {
        let before = self.callback.delivered();
        process_safe(&mut self.callback, &mut self.outputs);
        self.callback.delivered() > before
    }

    pub fn channel(&self, index: usize) -> &[f32] {
        &self.outputs[index]
    }

    pub fn outputs(&self) -> &[Vec<f32>] {
        &self.outputs
    }

    pub fn is_silent(&self) -> bool {
        self.outputs.iter().flatten().all(|&s| s == 0.0)
    }

    pub fn drain_signals(&mut self) -> Vec<u8> {
        drain_invariant_signals(&mut self.signals)
    }
}
