//! RT-safe invariant signaling for the render callback.
//!
//! This module provides a two-tier invariant system:
//! - **Tier 1 (RT-safe)**: Lock-free signaling of invariant IDs from the render callback
//! - **Tier 2 (Non-RT)**: Verification and contract testing on the control thread
//!
//! RT code **signals facts**. Non-RT code **judges correctness**.
//!
//! # Example
//!
//! ```ignore
//! // Render callback signals a block was copied out
//! signal_invariant(&mut invariant_tx, INV_BLOCK_DELIVERED);
//!
//! // Control thread verifies contracts
//! let signals = drain_invariant_signals(&mut invariant_rx);
//! assert!(signals.contains(&INV_BLOCK_DELIVERED));
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

// ============================================================================
// RT-Safe Invariant IDs (Tier 1)
// ============================================================================

/// A pending block was copied into the output channels.
pub const INV_BLOCK_DELIVERED: u8 = 1;

/// No block was pending and every channel was filled with silence.
pub const INV_SILENCE_FILLED: u8 = 2;

/// Output channels beyond stereo were silenced.
pub const INV_EXTRA_CHANNELS_SILENCED: u8 = 3;

/// The relay slot was empty after the quantum.
pub const INV_SLOT_CLEARED: u8 = 4;

/// Render callback executed without panic.
pub const INV_RT_CALLBACK_CLEAN: u8 = 5;

/// A panic inside the callback was contained and the output silenced.
pub const INV_PANIC_CONTAINED: u8 = 6;

// ============================================================================
// Invariant Signal Queue
// ============================================================================

/// Capacity for invariant signal queue.
pub const INVARIANT_QUEUE_CAPACITY: usize = 256;

/// Creates a new invariant signal queue pair.
///
/// Returns (producer for RT, consumer for control thread).
pub fn new_invariant_queue() -> (Producer<u8>, Consumer<u8>) {
    RingBuffer::new(INVARIANT_QUEUE_CAPACITY)
}

/// Signals an invariant was checked in the RT path.
///
/// # RT Safety
/// - No allocation
/// - No locking
/// - No panics
/// - If queue is full, signal is dropped (preferable to blocking)
#[inline]
pub fn signal_invariant(tx: &mut Producer<u8>, id: u8) {
    let _ = tx.push(id);
}

// ============================================================================
// Non-RT Verification (Tier 2)
// ============================================================================

/// Drains all pending invariant signals from the queue.
pub fn drain_invariant_signals(rx: &mut Consumer<u8>) -> Vec<u8> {
    let mut signals = Vec::with_capacity(INVARIANT_QUEUE_CAPACITY);
    while let Ok(id) = rx.pop() {
        signals.push(id);
    }
    signals
}

/// Counts occurrences of each invariant ID in a signal list.
pub fn count_invariant_signals(signals: &[u8]) -> [usize; 256] {
    let mut counts = [0usize; 256];
    for &id in signals {
        counts[id as usize] += 1;
    }
    counts
}

/// Contract verification: asserts that required invariants were signaled.
///
/// # Panics
/// Panics if any required invariant was not signaled at least once.
pub fn contract_test_rt(contract_name: &str, signals: &[u8], required: &[u8]) {
    let counts = count_invariant_signals(signals);
    let missing: Vec<&str> = required
        .iter()
        .filter(|&&id| counts[id as usize] == 0)
        .map(|&id| invariant_name(id))
        .collect();

    if !missing.is_empty() {
        let present: Vec<&str> = signals
            .iter()
            .map(|&id| invariant_name(id))
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        panic!(
            "RT Contract '{}' missing invariants: {:?}. Present: {:?}",
            contract_name, missing, present
        );
    }
}

/// Maps invariant ID to human-readable name (for diagnostics only).
pub const fn invariant_name(id: u8) -> &'static str {
    match id {
        INV_BLOCK_DELIVERED => "BLOCK_DELIVERED",
        INV_SILENCE_FILLED => "SILENCE_FILLED",
        INV_EXTRA_CHANNELS_SILENCED => "EXTRA_CHANNELS_SILENCED",
        INV_SLOT_CLEARED => "SLOT_CLEARED",
        INV_RT_CALLBACK_CLEAN => "RT_CALLBACK_CLEAN",
        INV_PANIC_CONTAINED => "PANIC_CONTAINED",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invariant_queue_roundtrip() {
        let (mut tx, mut rx) = new_invariant_queue();

        signal_invariant(&mut tx, INV_BLOCK_DELIVERED);
        signal_invariant(&mut tx, INV_SILENCE_FILLED);
        signal_invariant(&mut tx, INV_BLOCK_DELIVERED);

        let signals = drain_invariant_signals(&mut rx);
        assert_eq!(
            signals,
            vec![INV_BLOCK_DELIVERED, INV_SILENCE_FILLED, INV_BLOCK_DELIVERED]
        );
    }

    #[test]
    fn test_count_invariant_signals() {
        let counts = count_invariant_signals(&[
            INV_SILENCE_FILLED,
            INV_SILENCE_FILLED,
            INV_SLOT_CLEARED,
        ]);
        assert_eq!(counts[INV_SILENCE_FILLED as usize], 2);
        assert_eq!(counts[INV_SLOT_CLEARED as usize], 1);
        assert_eq!(counts[INV_BLOCK_DELIVERED as usize], 0);
    }

    #[test]
    #[should_panic(expected = "missing invariants")]
    fn test_contract_fails_when_invariants_missing() {
        contract_test_rt(
            "incomplete contract",
            &[INV_SILENCE_FILLED],
            &[INV_SILENCE_FILLED, INV_BLOCK_DELIVERED],
        );
    }

    #[test]
    fn test_queue_handles_overflow_gracefully() {
        let (mut tx, mut rx) = new_invariant_queue();
        for _ in 0..INVARIANT_QUEUE_CAPACITY + 100 {
            signal_invariant(&mut tx, INV_SILENCE_FILLED);
        }
        assert_eq!(drain_invariant_signals(&mut rx).len(), INVARIANT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_invariant_names() {
        assert_eq!(invariant_name(INV_BLOCK_DELIVERED), "BLOCK_DELIVERED");
        assert_eq!(invariant_name(255), "UNKNOWN");
    }
}
