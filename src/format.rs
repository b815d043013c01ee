//! Binary blob format consumed by the playback engine.
//!
//! Layout (version 1):
//!
//! ```text
//! b"ZMUSIC" | version: u8 | tempo width tag: u8 | tempo (1 or 2 bytes, BE) | note codes...
//! ```
//!
//! Note codes are the ASCII bytes of `C D E F G A B R`.

use crate::error::FormatError;
use crate::invariant_ppt::{assert_invariant, BLOB_LAYOUT, DECODE_HEADER};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Magic bytes at the start of every blob.
pub const MAGIC: &[u8; 6] = b"ZMUSIC";

/// Current (and only) blob format version.
pub const FORMAT_VERSION: u8 = 1;

/// Magic + version + width tag.
pub const HEADER_LEN: usize = MAGIC.len() + 2;

pub const DEFAULT_TEMPO: u32 = 120;

/// Width of the serialized tempo field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempoWidth {
    /// One byte, tempos 0..=255.
    #[default]
    U8,
    /// Two bytes big-endian, tempos 0..=65535.
    U16,
}

impl TempoWidth {
    pub const fn tag(self) -> u8 {
        match self {
            TempoWidth::U8 => 0x01,
            TempoWidth::U16 => 0x02,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(TempoWidth::U8),
            0x02 => Some(TempoWidth::U16),
            _ => None,
        }
    }

    pub const fn bytes(self) -> usize {
        match self {
            TempoWidth::U8 => 1,
            TempoWidth::U16 => 2,
        }
    }

    pub const fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }

    pub const fn max_tempo(self) -> u32 {
        match self {
            TempoWidth::U8 => u8::MAX as u32,
            TempoWidth::U16 => u16::MAX as u32,
        }
    }
}

/// A single retained note event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Note {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
    /// Rest.
    R,
}

impl Note {
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'C' => Some(Note::C),
            'D' => Some(Note::D),
            'E' => Some(Note::E),
            'F' => Some(Note::F),
            'G' => Some(Note::G),
            'A' => Some(Note::A),
            'B' => Some(Note::B),
            'R' => Some(Note::R),
            _ => None,
        }
    }

    pub const fn from_code(byte: u8) -> Option<Self> {
        Self::from_char(byte as char)
    }

    /// The character code written to the blob.
    pub const fn code(self) -> u8 {
        match self {
            Note::C => b'C',
            Note::D => b'D',
            Note::E => b'E',
            Note::F => b'F',
            Note::G => b'G',
            Note::A => b'A',
            Note::B => b'B',
            Note::R => b'R',
        }
    }

    pub const fn is_rest(self) -> bool {
        matches!(self, Note::R)
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code() as char)
    }
}

/// An encoded blob. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryBlob {
    bytes: Vec<u8>,
}

impl BinaryBlob {
    /// Serialize tempo and notes. Fails rather than truncating a tempo that
    /// does not fit `width`.
    pub fn encode(tempo: u32, notes: &[Note], width: TempoWidth) -> Result<Self, FormatError> {
        if tempo > width.max_tempo() {
            return Err(FormatError::TempoOutOfRange {
                tempo: u64::from(tempo),
                width_bits: width.bits(),
                max: width.max_tempo(),
            });
        }

        let mut bytes = Vec::with_capacity(HEADER_LEN + width.bytes() + notes.len());
        bytes.extend_from_slice(MAGIC);
        bytes.push(FORMAT_VERSION);
        bytes.push(width.tag());
        match width {
            TempoWidth::U8 => bytes.push(tempo as u8),
            TempoWidth::U16 => bytes.extend_from_slice(&(tempo as u16).to_be_bytes()),
        }
        bytes.extend(notes.iter().map(|n| n.code()));

        assert_invariant(
            BLOB_LAYOUT,
            bytes.len() == HEADER_LEN + width.bytes() + notes.len(),
            "blob length is header + tempo field + one byte per note",
            None,
        );

        Ok(Self { bytes })
    }

    /// Wrap bytes read from elsewhere, after checking they decode.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FormatError> {
        Self::decode(&bytes)?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Parse and validate a blob.
    pub fn decode(bytes: &[u8]) -> Result<DecodedBlob, FormatError> {
        if bytes.len() < HEADER_LEN {
            return Err(FormatError::Truncated {
                len: bytes.len(),
                needed: HEADER_LEN,
            });
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(FormatError::BadMagic);
        }
        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }
        let tag = bytes[MAGIC.len() + 1];
        let width = TempoWidth::from_tag(tag).ok_or(FormatError::UnknownTempoWidth(tag))?;

        let notes_start = HEADER_LEN + width.bytes();
        if bytes.len() < notes_start {
            return Err(FormatError::Truncated {
                len: bytes.len(),
                needed: notes_start,
            });
        }
        let tempo = match width {
            TempoWidth::U8 => u32::from(bytes[HEADER_LEN]),
            TempoWidth::U16 => {
                u32::from(u16::from_be_bytes([bytes[HEADER_LEN], bytes[HEADER_LEN + 1]]))
            }
        };

        let notes = bytes[notes_start..]
            .iter()
            .enumerate()
            .map(|(i, &byte)| {
                Note::from_code(byte).ok_or(FormatError::InvalidNote {
                    offset: notes_start + i,
                    byte,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        assert_invariant(
            DECODE_HEADER,
            tempo <= width.max_tempo(),
            "decoded tempo fits its field",
            None,
        );

        Ok(DecodedBlob {
            version,
            tempo_width: width,
            tempo,
            notes,
        })
    }
}

impl AsRef<[u8]> for BinaryBlob {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// The fields recovered from a blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedBlob {
    pub version: u8,
    pub tempo_width: TempoWidth,
    pub tempo: u32,
    pub notes: Vec<Note>,
}

impl DecodedBlob {
    pub fn note_string(&self) -> String {
        self.notes.iter().map(|n| n.code() as char).collect()
    }
}
