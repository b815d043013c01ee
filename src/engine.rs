//! Engine boundary: an opaque playback engine behind an explicit lifecycle.
//!
//! The engine turns a payload into stereo blocks. It never sees the relay;
//! the handle's caller publishes what comes back, so a failed `play` leaves
//! the relay untouched.

use crate::error::EngineError;
use crate::format::BinaryBlob;
use crate::invariant_ppt::{assert_invariant, ENGINE_LIFECYCLE};
use crate::relay::AudioFrameBlock;
use crate::sanitize::SanitizedText;
use tracing::{error, info, warn};

/// What an engine is asked to play.
#[derive(Debug, Clone, Copy)]
pub enum EnginePayload<'a> {
    Text(&'a SanitizedText),
    Blob(&'a BinaryBlob),
}

/// The capability surface of a playback engine.
pub trait PlaybackEngine: Send {
    /// One-time initialization.
    fn install(&mut self) -> Result<(), EngineError>;

    /// Compile the payload and render it to stereo blocks.
    fn compile_and_play(
        &mut self,
        payload: EnginePayload<'_>,
    ) -> Result<Vec<AudioFrameBlock>, EngineError>;

    /// Unmute after a user gesture, for outputs that start suspended.
    fn resume(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Ready,
    Failed(String),
}

impl EngineState {
    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Failed(_) => "failed",
        }
    }
}

/// Owns an engine and tracks its lifecycle.
pub struct EngineHandle<E> {
    engine: E,
    state: EngineState,
}

impl<E: PlaybackEngine> EngineHandle<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            state: EngineState::Uninitialized,
        }
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EngineState::Ready
    }

    /// Install the engine. Idempotent once ready; a failed engine stays failed.
    pub fn install(&mut self) -> Result<(), EngineError> {
        match &self.state {
            EngineState::Ready => return Ok(()),
            EngineState::Failed(reason) => {
                return Err(EngineError::InstallFailed(reason.clone()));
            }
            EngineState::Uninitialized => {}
        }

        match self.engine.install() {
            Ok(()) => {
                info!("playback engine installed");
                self.state = EngineState::Ready;
                Ok(())
            }
            Err(err) => {
                error!(%err, "playback engine install failed");
                self.state = EngineState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    /// Render a payload. Requires the engine to be ready.
    pub fn play(&mut self, payload: EnginePayload<'_>) -> Result<Vec<AudioFrameBlock>, EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady(self.state.name()));
        }
        let blocks = self.engine.compile_and_play(payload).inspect_err(|err| {
            warn!(%err, "playback failed");
        })?;

        assert_invariant(
            ENGINE_LIFECYCLE,
            self.is_ready(),
            "engine stays ready across play",
            None,
        );

        info!(blocks = blocks.len(), "playback rendered");
        Ok(blocks)
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        if !self.is_ready() {
            return Err(EngineError::NotReady(self.state.name()));
        }
        self.engine.resume()
    }

    /// Release the engine. A new handle around it starts `Uninitialized`.
    pub fn teardown(self) -> E {
        info!("playback engine torn down");
        self.engine
    }
}
