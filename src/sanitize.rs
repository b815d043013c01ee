//! Sanitizer: normalizes untrusted MML text into the printable-ASCII subset
//! both compile paths accept.
//!
//! Three rules apply: drop the all-zero `$0b00` escape (any case), drop the
//! rest of the `$0b<hex><hex>` family, and strip everything outside
//! 0x20..=0x7E except newline. Removing one piece can join its neighbours
//! into a new escape (`$0$0b00b00`, or `$\x010b00`), so the rules are applied
//! until none matches.
//!
//! The output buffer doubles as a stack. An escape is five printable bytes
//! starting with `$`, and `$` never occurs inside one, so a new escape can
//! only ever form at the end of the buffer. Checking the tail after each push
//! reaches the same result as re-running the passes, in one scan.

use crate::invariant_ppt::{
    assert_invariant, SANITIZE_FIXPOINT, SANITIZE_NO_FORBIDDEN, SANITIZE_PRINTABLE,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

lazy_static! {
    static ref FORBIDDEN_TOKEN: Regex = Regex::new(r"(?i)\$0b00").unwrap();
    static ref HEX_ESCAPE: Regex = Regex::new(r"\$0b[0-9A-Fa-f]{2}").unwrap();
    static ref ESCAPE_PREFIX: Regex = Regex::new(r"(?i)\$0b").unwrap();
    static ref NON_PRINTABLE: Regex = Regex::new(r"[^\x20-\x7E\n]").unwrap();
}

const ESCAPE_LEN: usize = 5;

/// Non-fatal diagnostics about input that needed more than plain deletion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SanitizationWarning {
    /// `$0b` prefixes that are not a removable escape and stay in the text.
    #[error("{occurrences} `$0b` escape prefix(es) remain in the sanitized text")]
    ResidualEscapePrefix { occurrences: usize },

    /// Escapes that only formed once an inner escape was removed.
    #[error("{occurrences} escape(s) formed after removing a nested escape")]
    NestedEscape { occurrences: usize },

    /// Escapes that only formed once non-printable characters were stripped.
    #[error("{occurrences} escape(s) formed after stripping non-printable characters")]
    SplicedEscape { occurrences: usize },
}

/// Text guaranteed printable ASCII (plus newline) and free of forbidden escapes.
///
/// Only [`sanitize`] constructs it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of sanitizing: the text plus any diagnostics worth surfacing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    text: SanitizedText,
    warnings: Vec<SanitizationWarning>,
}

impl Sanitized {
    pub fn text(&self) -> &SanitizedText {
        &self.text
    }

    pub fn warnings(&self) -> &[SanitizationWarning] {
        &self.warnings
    }

    pub fn into_text(self) -> SanitizedText {
        self.text
    }

    pub fn into_parts(self) -> (SanitizedText, Vec<SanitizationWarning>) {
        (self.text, self.warnings)
    }
}

/// Where a kept byte came from.
#[derive(Clone, Copy)]
struct Origin {
    /// Byte offset in the raw input.
    offset: usize,
    /// Non-printable characters stripped before this byte.
    stripped: usize,
}

/// Sanitize raw MML text. Total, deterministic and linear in the input.
pub fn sanitize(raw: &str) -> Sanitized {
    if FORBIDDEN_TOKEN.is_match(raw) {
        warn!("forbidden escape sequence $0b00 detected; removing it");
    }

    let mut out = String::with_capacity(raw.len());
    let mut origins: Vec<Origin> = Vec::with_capacity(raw.len());
    let mut stripped = 0;
    let mut nested = 0;
    let mut spliced = 0;

    for (offset, c) in raw.char_indices() {
        if !is_printable_char(c) {
            stripped += 1;
            continue;
        }
        out.push(c);
        origins.push(Origin { offset, stripped });

        let Some(start) = out.len().checked_sub(ESCAPE_LEN) else {
            continue;
        };
        if !is_escape(&out.as_bytes()[start..]) {
            continue;
        }
        let first = origins[start];
        let last = origins[origins.len() - 1];
        if last.stripped > first.stripped {
            spliced += 1;
        } else if last.offset - first.offset != ESCAPE_LEN - 1 {
            nested += 1;
        }
        out.truncate(start);
        origins.truncate(start);
    }

    let mut warnings = Vec::new();
    if nested > 0 {
        warn!(occurrences = nested, "escape sequence re-formed after removing a nested escape");
        warnings.push(SanitizationWarning::NestedEscape { occurrences: nested });
    }
    if spliced > 0 {
        warn!(
            occurrences = spliced,
            "escape sequence re-formed after stripping non-printable characters"
        );
        warnings.push(SanitizationWarning::SplicedEscape { occurrences: spliced });
    }
    let residual = ESCAPE_PREFIX.find_iter(&out).count();
    if residual > 0 {
        warn!(
            occurrences = residual,
            "sanitized text still contains $0b escape prefixes"
        );
        warnings.push(SanitizationWarning::ResidualEscapePrefix {
            occurrences: residual,
        });
    }

    assert_invariant(
        SANITIZE_PRINTABLE,
        out.bytes().all(is_printable_byte),
        "sanitized text is printable ASCII or newline",
        None,
    );
    assert_invariant(
        SANITIZE_NO_FORBIDDEN,
        !FORBIDDEN_TOKEN.is_match(&out) && !HEX_ESCAPE.is_match(&out),
        "sanitized text contains no forbidden escape",
        None,
    );
    assert_invariant(
        SANITIZE_FIXPOINT,
        regex_round(&out) == out,
        "another round of the sanitizer passes leaves the text unchanged",
        None,
    );

    debug!(
        raw_len = raw.len(),
        sanitized_len = out.len(),
        "sanitized MML text"
    );

    Sanitized {
        text: SanitizedText(out),
        warnings,
    }
}

/// `$0b00` in any case, or `$0b<hex><hex>` with a lowercase `b`.
fn is_escape(tail: &[u8]) -> bool {
    match tail {
        [b'$', b'0', b'b', x, y] if x.is_ascii_hexdigit() && y.is_ascii_hexdigit() => true,
        [b'$', b'0', b'B', b'0', b'0'] => true,
        _ => false,
    }
}

/// One application of the three passes as regexes, in their original order.
fn regex_round(text: &str) -> String {
    let without_forbidden = FORBIDDEN_TOKEN.replace_all(text, "");
    let without_escapes = HEX_ESCAPE.replace_all(&without_forbidden, "");
    NON_PRINTABLE.replace_all(&without_escapes, "").into_owned()
}

fn is_printable_char(c: char) -> bool {
    c == '\n' || (' '..='~').contains(&c)
}

fn is_printable_byte(b: u8) -> bool {
    b == b'\n' || (0x20..=0x7E).contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_text_is_unchanged() {
        let raw = "; comment\nT150 o5 cdefgab>c";
        let out = sanitize(raw);
        assert_eq!(out.text().as_str(), raw);
        assert!(out.warnings().is_empty());
    }

    #[test]
    fn forbidden_token_removed_any_case() {
        let out = sanitize("T90 c$0b00d$0B00e$0b00");
        assert_eq!(out.text().as_str(), "T90 cde");
    }

    #[test]
    fn hex_escape_family_removed() {
        let out = sanitize("c$0b7Fd$0bA1e");
        assert_eq!(out.text().as_str(), "cde");
    }

    #[test]
    fn control_characters_stripped() {
        let out = sanitize("c\td\r\ne\u{7f}f\u{e9}g\u{1F3B5}");
        assert_eq!(out.text().as_str(), "cd\nefg");
    }

    #[test]
    fn residual_prefix_is_reported() {
        let out = sanitize("c $0bzz d");
        assert_eq!(out.text().as_str(), "c $0bzz d");
        assert_eq!(
            out.warnings(),
            &[SanitizationWarning::ResidualEscapePrefix { occurrences: 1 }]
        );
    }

    #[test]
    fn spliced_escape_is_removed_and_reported() {
        // The control byte hides the escape until it is stripped.
        let out = sanitize("c$\u{1}0b00d");
        assert_eq!(out.text().as_str(), "cd");
        assert_eq!(
            out.warnings(),
            &[SanitizationWarning::SplicedEscape { occurrences: 1 }]
        );
    }

    #[test]
    fn nested_escape_collapses() {
        let out = sanitize("$0$0b00b00");
        assert_eq!(out.text().as_str(), "");
        assert_eq!(
            out.warnings(),
            &[SanitizationWarning::NestedEscape { occurrences: 1 }]
        );
    }

    #[test]
    fn plain_escapes_raise_no_warning() {
        let out = sanitize("c$0b00d$0b1fe");
        assert_eq!(out.text().as_str(), "cde");
        assert!(out.warnings().is_empty());
    }

    #[test]
    fn removal_can_complete_a_hex_escape() {
        // Removing the inner `$0b00` leaves `$0b01`.
        let out = sanitize("$0b0$0b001x");
        assert_eq!(out.text().as_str(), "x");
    }

    #[test]
    fn uppercase_b_only_forbidden_for_zero() {
        let out = sanitize("$0B1f $0B00");
        assert_eq!(out.text().as_str(), "$0B1f ");
        assert_eq!(
            out.warnings(),
            &[SanitizationWarning::ResidualEscapePrefix { occurrences: 1 }]
        );
    }

    #[test]
    fn escape_matcher() {
        assert!(is_escape(b"$0b00"));
        assert!(is_escape(b"$0B00"));
        assert!(is_escape(b"$0bA9"));
        assert!(!is_escape(b"$0BA9"));
        assert!(!is_escape(b"$0bzz"));
        assert!(!is_escape(b"$0b0"));
    }

    #[test]
    fn empty_input() {
        let out = sanitize("");
        assert!(out.text().is_empty());
        assert!(out.warnings().is_empty());
    }
}
