//! Reference playback engine.
//!
//! Renders each note event as a quarter-note sine tone (octave 4) at the
//! blob's tempo, rests as silence, and slices the result into quantum-sized
//! stereo blocks ready for the relay.

use crate::compiler::{compile, CompilerOptions};
use crate::engine::{EnginePayload, PlaybackEngine};
use crate::error::EngineError;
use crate::format::{BinaryBlob, Note};
use crate::relay::AudioFrameBlock;
use std::f32::consts::TAU;
use tracing::debug;

/// Longest performance the engine will render, in seconds.
pub const MAX_SECONDS: f64 = 600.0;

/// Fade applied at both ends of every tone, in seconds.
const FADE_SECONDS: f32 = 0.005;

pub struct ToneEngine {
    sample_rate: u32,
    quantum: usize,
    amplitude: f32,
    compiler: CompilerOptions,
    installed: bool,
}

impl ToneEngine {
    pub fn new(sample_rate: u32, quantum: usize) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            quantum: quantum.max(1),
            amplitude: 0.25,
            compiler: CompilerOptions::default(),
            installed: false,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Options used when the payload is text rather than a blob.
    pub fn with_compiler(mut self, compiler: CompilerOptions) -> Self {
        self.compiler = compiler;
        self
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Frames per quarter note at `tempo` BPM.
    pub fn frames_per_note(&self, tempo: u32) -> usize {
        (60.0 * f64::from(self.sample_rate) / f64::from(tempo)).round() as usize
    }

    /// Render a note sequence to one mono signal.
    pub fn render_notes(&self, tempo: u32, notes: &[Note]) -> Result<Vec<f32>, EngineError> {
        if tempo == 0 {
            return Err(EngineError::Rejected("tempo must be positive".to_string()));
        }
        let per_note = self.frames_per_note(tempo);
        let total = per_note.saturating_mul(notes.len());
        if total as f64 > MAX_SECONDS * f64::from(self.sample_rate) {
            return Err(EngineError::Rejected(format!(
                "performance longer than {} seconds",
                MAX_SECONDS
            )));
        }

        let fade = ((FADE_SECONDS * self.sample_rate as f32) as usize).min(per_note / 2).max(1);
        let mut signal = Vec::with_capacity(total);
        let mut phase = 0.0f32;
        for &note in notes {
            let Some(freq) = frequency(note) else {
                signal.extend(std::iter::repeat(0.0).take(per_note));
                continue;
            };
            let step = TAU * freq / self.sample_rate as f32;
            for i in 0..per_note {
                let edge = i.min(per_note - 1 - i);
                let envelope = (edge as f32 / fade as f32).min(1.0);
                signal.push(phase.sin() * self.amplitude * envelope);
                phase = (phase + step) % TAU;
            }
        }
        Ok(signal)
    }

    /// Slice a mono signal into stereo blocks of exactly one quantum.
    pub fn slice_blocks(&self, signal: &[f32]) -> Vec<AudioFrameBlock> {
        signal
            .chunks(self.quantum)
            .map(|chunk| {
                let mut samples = chunk.to_vec();
                samples.resize(self.quantum, 0.0);
                AudioFrameBlock::mono(samples)
            })
            .collect()
    }
}

impl PlaybackEngine for ToneEngine {
    fn install(&mut self) -> Result<(), EngineError> {
        self.installed = true;
        Ok(())
    }

    fn compile_and_play(
        &mut self,
        payload: EnginePayload<'_>,
    ) -> Result<Vec<AudioFrameBlock>, EngineError> {
        if !self.installed {
            return Err(EngineError::NotReady("uninitialized"));
        }
        let (tempo, notes) = match payload {
            EnginePayload::Text(text) => {
                let compiled = compile(text, &self.compiler)?;
                (compiled.tempo, compiled.notes)
            }
            EnginePayload::Blob(blob) => {
                let decoded = BinaryBlob::decode(blob.as_bytes())?;
                (decoded.tempo, decoded.notes)
            }
        };
        let signal = self.render_notes(tempo, &notes)?;
        let blocks = self.slice_blocks(&signal);
        debug!(tempo, notes = notes.len(), blocks = blocks.len(), "tone engine rendered");
        Ok(blocks)
    }
}

/// Octave-4 equal-tempered pitch; `None` for a rest.
pub fn frequency(note: Note) -> Option<f32> {
    let midi = match note {
        Note::C => 60,
        Note::D => 62,
        Note::E => 64,
        Note::F => 65,
        Note::G => 67,
        Note::A => 69,
        Note::B => 71,
        Note::R => return None,
    };
    Some(440.0 * 2f32.powf((midi as f32 - 69.0) / 12.0))
}
