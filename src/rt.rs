//! RT module: the fixed-quantum render callback and the drivers that call it.

// IMPORTANT: Do not call assert_invariant or any tracing macro in RT paths to avoid locks/allocs.

use crate::invariant_rt::{
    signal_invariant, INV_BLOCK_DELIVERED, INV_EXTRA_CHANNELS_SILENCED, INV_PANIC_CONTAINED,
    INV_RT_CALLBACK_CLEAN, INV_SILENCE_FILLED, INV_SLOT_CLEARED,
};
use crate::relay::{AudioFrameBlock, QuantumOutcome, RelayConsumer, RelayPublisher};
use rtrb::Producer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Frames per quantum when nothing else is configured.
pub const DEFAULT_QUANTUM: usize = 128;

/// The render-thread consumer of the relay.
pub struct RenderCallback {
    consumer: RelayConsumer,
    invariants: Option<Producer<u8>>,
    quanta: u64,
    delivered: u64,
    #[cfg(test)]
    fail_next: bool,
}

impl RenderCallback {
    pub fn new(consumer: RelayConsumer) -> Self {
        Self {
            consumer,
            invariants: None,
            quanta: 0,
            delivered: 0,
            #[cfg(test)]
            fail_next: false,
        }
    }

    /// Same as [`new`](Self::new), signalling RT invariants on `tx`.
    pub fn with_invariants(consumer: RelayConsumer, tx: Producer<u8>) -> Self {
        Self {
            invariants: Some(tx),
            ..Self::new(consumer)
        }
    }

    /// Render one quantum into `outputs` (one `Vec` per channel, each the
    /// quantum length). Always returns `true`: the session is only ever
    /// stopped from outside.
    pub fn process(&mut self, outputs: &mut [Vec<f32>]) -> bool {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next) {
            panic!("injected render fault");
        }

        let outcome = self.consumer.consume_into(outputs);
        self.quanta += 1;

        if outcome.is_delivered() {
            self.delivered += 1;
        }

        if let Some(tx) = self.invariants.as_mut() {
            match outcome {
                QuantumOutcome::Delivered { .. } => {
                    signal_invariant(tx, INV_BLOCK_DELIVERED);
                    if outputs.len() > 2 && outputs[2..].iter().all(|ch| ch.iter().all(|&s| s == 0.0)) {
                        signal_invariant(tx, INV_EXTRA_CHANNELS_SILENCED);
                    }
                }
                QuantumOutcome::Silence => {
                    if outputs.iter().all(|ch| ch.iter().all(|&s| s == 0.0)) {
                        signal_invariant(tx, INV_SILENCE_FILLED);
                    }
                }
            }
            if !self.consumer.is_ready() {
                signal_invariant(tx, INV_SLOT_CLEARED);
            }
            signal_invariant(tx, INV_RT_CALLBACK_CLEAN);
        }

        true
    }

    /// Quanta rendered so far.
    pub fn quanta(&self) -> u64 {
        self.quanta
    }

    /// Quanta that carried a published block.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

/// Run `process` with panic containment.
pub fn process_safe(callback: &mut RenderCallback, outputs: &mut [Vec<f32>]) -> bool {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        callback.process(outputs);
    }));
    if result.is_err() {
        // Fail closed: silence output
        for channel in outputs.iter_mut() {
            channel.fill(0.0);
        }
        if let Some(tx) = callback.invariants.as_mut() {
            signal_invariant(tx, INV_PANIC_CONTAINED);
        }
    }
    true
}

/// Render offline: publish each block, then run exactly one quantum.
///
/// Returns interleaved samples, `quantum * channel_count` per block.
pub fn render_offline<I>(
    publisher: &mut RelayPublisher,
    callback: &mut RenderCallback,
    blocks: I,
    quantum: usize,
    channel_count: usize,
) -> Vec<f32>
where
    I: IntoIterator<Item = AudioFrameBlock>,
{
    let mut outputs = vec![vec![0.0; quantum]; channel_count];
    let mut interleaved = Vec::new();
    for block in blocks {
        publisher.publish(block);
        process_safe(callback, &mut outputs);
        interleave_into(&outputs, &mut interleaved);
    }
    interleaved
}

/// Append planar channels to an interleaved buffer.
pub fn interleave_into(channels: &[Vec<f32>], out: &mut Vec<f32>) {
    let frames = channels.first().map_or(0, Vec::len);
    out.reserve(frames * channels.len());
    for i in 0..frames {
        for channel in channels {
            out.push(channel.get(i).copied().unwrap_or(0.0));
        }
    }
}

/// A dedicated thread invoking the callback once per quantum period.
///
/// Stands in for the audio device's scheduler; the callback is handed back
/// when the thread stops.
pub struct RenderThread {
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<RenderCallback>>,
}

impl RenderThread {
    /// Spawn the render thread. `sink` receives each rendered quantum.
    pub fn spawn<S>(
        mut callback: RenderCallback,
        quantum: usize,
        channel_count: usize,
        period: Duration,
        mut sink: S,
    ) -> std::io::Result<Self>
    where
        S: FnMut(&[Vec<f32>]) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let handle = thread::Builder::new()
            .name("zmusic-render".to_string())
            .spawn(move || {
                let mut outputs = vec![vec![0.0; quantum]; channel_count];
                let mut deadline = Instant::now();
                while flag.load(Ordering::Acquire) {
                    process_safe(&mut callback, &mut outputs);
                    sink(&outputs);

                    deadline += period;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        // Overran; resynchronise instead of bursting.
                        deadline = now;
                    }
                }
                callback
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the thread and take back the callback.
    pub fn stop(mut self) -> Option<RenderCallback> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Option<RenderCallback> {
        self.running.store(false, Ordering::Release);
        self.handle.take().and_then(|handle| handle.join().ok())
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

/// Wall-clock length of one quantum.
pub fn quantum_period(quantum: usize, sample_rate: u32) -> Duration {
    Duration::from_secs_f64(quantum as f64 / f64::from(sample_rate.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invariant_rt::{contract_test_rt, drain_invariant_signals, new_invariant_queue};
    use crate::relay::relay;

    #[test]
    fn callback_always_continues() {
        let (_tx, rx) = relay();
        let mut callback = RenderCallback::new(rx);
        let mut outputs = vec![vec![1.0; 64]; 2];
        assert!(callback.process(&mut outputs));
        assert!(outputs.iter().flatten().all(|&s| s == 0.0));
        assert_eq!(callback.quanta(), 1);
        assert_eq!(callback.delivered(), 0);
    }

    #[test]
    fn callback_signals_facts() {
        let (mut tx, rx) = relay();
        let (inv_tx, mut inv_rx) = new_invariant_queue();
        let mut callback = RenderCallback::with_invariants(rx, inv_tx);
        let mut outputs = vec![vec![0.0; 32]; 3];

        tx.publish(AudioFrameBlock::mono(vec![0.5; 32]));
        callback.process(&mut outputs);
        callback.process(&mut outputs);

        let signals = drain_invariant_signals(&mut inv_rx);
        contract_test_rt(
            "deliver then silence",
            &signals,
            &[
                INV_BLOCK_DELIVERED,
                INV_EXTRA_CHANNELS_SILENCED,
                INV_SILENCE_FILLED,
                INV_SLOT_CLEARED,
                INV_RT_CALLBACK_CLEAN,
            ],
        );
    }

    #[test]
    fn panic_is_contained_and_silenced() {
        let (mut tx, rx) = relay();
        let (inv_tx, mut inv_rx) = new_invariant_queue();
        let mut callback = RenderCallback::with_invariants(rx, inv_tx);
        let mut outputs = vec![vec![0.7; 32]; 2];

        tx.publish(AudioFrameBlock::mono(vec![0.5; 32]));
        callback.fail_next = true;
        assert!(process_safe(&mut callback, &mut outputs));
        assert!(outputs.iter().flatten().all(|&s| s == 0.0));
        assert_eq!(callback.quanta(), 0);

        let signals = drain_invariant_signals(&mut inv_rx);
        contract_test_rt("panic contained", &signals, &[INV_PANIC_CONTAINED]);
        assert!(!signals.contains(&INV_RT_CALLBACK_CLEAN));

        // The faulted quantum never took the block; the next one plays it.
        assert!(process_safe(&mut callback, &mut outputs));
        assert!(outputs.iter().flatten().all(|&s| s == 0.5));
        assert_eq!(callback.delivered(), 1);
    }

    #[test]
    fn offline_render_interleaves() {
        let (mut tx, rx) = relay();
        let mut callback = RenderCallback::new(rx);
        let blocks = vec![
            AudioFrameBlock::new(vec![1.0, 2.0], vec![3.0, 4.0]).unwrap(),
            AudioFrameBlock::new(vec![5.0, 6.0], vec![7.0, 8.0]).unwrap(),
        ];
        let out = render_offline(&mut tx, &mut callback, blocks, 2, 2);
        assert_eq!(out, vec![1.0, 3.0, 2.0, 4.0, 5.0, 7.0, 6.0, 8.0]);
        assert_eq!(callback.delivered(), 2);
    }

    #[test]
    fn quantum_period_at_48k() {
        let period = quantum_period(128, 48_000);
        assert!((period.as_secs_f64() - 128.0 / 48_000.0).abs() < 1e-9);
    }
}
