//! zmusic: MML text → sanitized text → binary blob, and a real-time-safe relay
//! carrying rendered stereo blocks from the control thread to the render
//! callback.
//!
//! ```ignore
//! let compiled = zmusic::compiler::compile_text("T150 cdefgab", &Default::default())?;
//! let (mut publisher, consumer) = zmusic::relay::relay();
//! let mut callback = zmusic::rt::RenderCallback::new(consumer);
//! ```

pub mod compiler;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod format;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod invariant_rt;
pub mod relay;
pub mod rt;
pub mod sanitize;
pub mod tone;

pub use compiler::{compile, compile_text, Compiled, CompilerOptions, NoteCase};
pub use error::{Error, Result};
pub use format::{BinaryBlob, DecodedBlob, Note, TempoWidth};
pub use relay::{relay, AudioFrameBlock, RelayConsumer, RelayPublisher};
pub use sanitize::{sanitize, SanitizationWarning, Sanitized, SanitizedText};
