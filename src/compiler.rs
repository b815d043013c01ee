//! Binary compiler: coarse framing of sanitized MML into a [`BinaryBlob`].
//!
//! This is not a full MML parser. It honors the first `T<digits>` tempo and
//! keeps the note letters `C D E F G A B R` in order; octave, length and
//! volume directives are dropped.

use crate::error::FormatError;
use crate::format::{BinaryBlob, Note, TempoWidth, DEFAULT_TEMPO};
use crate::invariant_ppt::{assert_invariant, COMPILE_NOTES_ALPHABET, COMPILE_TEMPO_FITS};
use crate::sanitize::{sanitize, SanitizationWarning, SanitizedText};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tracing::{debug, info};

lazy_static! {
    static ref TEMPO: Regex = Regex::new(r"T(\d+)").unwrap();
}

/// How lowercase note letters are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteCase {
    /// `c` and `C` are both note C.
    #[default]
    Fold,
    /// Only uppercase letters are notes.
    Exact,
}

/// Framing options for [`compile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerOptions {
    pub tempo_width: TempoWidth,
    pub note_case: NoteCase,
    /// Treat `;` through end of line as a comment.
    pub strip_comments: bool,
    pub max_notes: usize,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            tempo_width: TempoWidth::U8,
            note_case: NoteCase::Fold,
            strip_comments: true,
            max_notes: u16::MAX as usize,
        }
    }
}

/// A compiled blob together with the values that went into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compiled {
    pub blob: BinaryBlob,
    pub tempo: u32,
    pub notes: Vec<Note>,
    /// Diagnostics from sanitizing, when compiled from raw text.
    pub warnings: Vec<SanitizationWarning>,
}

/// Compile sanitized text into a blob.
pub fn compile(text: &SanitizedText, options: &CompilerOptions) -> Result<Compiled, FormatError> {
    let body = if options.strip_comments {
        strip_comments(text.as_str())
    } else {
        Cow::Borrowed(text.as_str())
    };

    let tempo = extract_tempo(&body)?;
    let notes = extract_notes(&body, options.note_case);

    if notes.len() > options.max_notes {
        return Err(FormatError::TooManyNotes {
            count: notes.len(),
            max: options.max_notes,
        });
    }

    let blob = BinaryBlob::encode(tempo, &notes, options.tempo_width)?;

    assert_invariant(
        COMPILE_TEMPO_FITS,
        tempo <= options.tempo_width.max_tempo(),
        "compiled tempo fits the tempo field",
        None,
    );
    assert_invariant(
        COMPILE_NOTES_ALPHABET,
        notes.len() <= body.len(),
        "at most one note per source character",
        None,
    );

    debug!(tempo, notes = notes.len(), bytes = blob.len(), "compiled MML");

    Ok(Compiled {
        blob,
        tempo,
        notes,
        warnings: Vec::new(),
    })
}

/// Sanitize raw text, then compile it.
pub fn compile_text(raw: &str, options: &CompilerOptions) -> Result<Compiled, FormatError> {
    let (text, warnings) = sanitize(raw).into_parts();
    let mut compiled = compile(&text, options)?;
    if !warnings.is_empty() {
        info!(count = warnings.len(), "compiling input that needed extra sanitizing");
    }
    compiled.warnings = warnings;
    Ok(compiled)
}

/// First `T<digits>` wins; no match means the default tempo.
pub fn extract_tempo(text: &str) -> Result<u32, FormatError> {
    let Some(caps) = TEMPO.captures(text) else {
        return Ok(DEFAULT_TEMPO);
    };
    let digits = &caps[1];
    digits.parse::<u32>().map_err(|_| FormatError::TempoOutOfRange {
        tempo: digits.parse::<u64>().unwrap_or(u64::MAX),
        width_bits: u32::BITS,
        max: u32::MAX,
    })
}

pub fn extract_notes(text: &str, case: NoteCase) -> Vec<Note> {
    text.chars()
        .filter_map(|c| match case {
            NoteCase::Fold => Note::from_char(c.to_ascii_uppercase()),
            NoteCase::Exact => Note::from_char(c),
        })
        .collect()
}

fn strip_comments(text: &str) -> Cow<'_, str> {
    if !text.contains(';') {
        return Cow::Borrowed(text);
    }
    let stripped = text
        .split('\n')
        .map(|line| line.split_once(';').map_or(line, |(code, _)| code))
        .collect::<Vec<_>>()
        .join("\n");
    Cow::Owned(stripped)
}
