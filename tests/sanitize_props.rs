use proptest::prelude::*;
use regex::Regex;
use std::time::Instant;
use zmusic::sanitize::{sanitize, SanitizationWarning};

/// The three passes as plain regexes, repeated until nothing changes.
fn repeated_passes(raw: &str) -> String {
    let forbidden = Regex::new(r"(?i)\$0b00").unwrap();
    let hex = Regex::new(r"\$0b[0-9A-Fa-f]{2}").unwrap();
    let non_printable = Regex::new(r"[^\x20-\x7E\n]").unwrap();
    let mut current = raw.to_string();
    loop {
        let step = forbidden.replace_all(&current, "");
        let step = hex.replace_all(&step, "");
        let next = non_printable.replace_all(&step, "").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

fn is_printable(text: &str) -> bool {
    text.bytes().all(|b| b == b'\n' || (0x20..=0x7E).contains(&b))
}

/// Strings salted with escape fragments and control bytes.
fn adversarial() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("$0b00".to_string()),
            Just("$0B00".to_string()),
            Just("$0b7f".to_string()),
            Just("$".to_string()),
            Just("0b".to_string()),
            Just("00".to_string()),
            Just("\u{1}".to_string()),
            Just("\t".to_string()),
            "[ -~\n]{0,4}",
            any::<char>().prop_map(|c| c.to_string()),
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn output_is_printable(raw in any::<String>()) {
        let out = sanitize(&raw);
        prop_assert!(is_printable(out.text().as_str()));
    }

    #[test]
    fn adversarial_output_is_clean(raw in adversarial()) {
        let out = sanitize(&raw);
        let text = out.text().as_str();
        prop_assert!(is_printable(text));
        prop_assert!(!text.to_ascii_lowercase().contains("$0b00"));
    }

    #[test]
    fn sanitize_is_idempotent(raw in adversarial()) {
        let once = sanitize(&raw).into_text();
        let twice = sanitize(once.as_str()).into_text();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn single_scan_matches_repeated_passes(raw in adversarial()) {
        let sanitized = sanitize(&raw);
        let expected = repeated_passes(&raw);
        prop_assert_eq!(sanitized.text().as_str(), expected.as_str());
    }

    #[test]
    fn printable_input_without_escapes_is_untouched(raw in "[ -#%-~\n]{0,64}") {
        // No `$`, so no escape can exist.
        let out = sanitize(&raw);
        prop_assert_eq!(out.text().as_str(), raw.as_str());
        prop_assert!(out.warnings().is_empty());
    }

    #[test]
    fn forbidden_token_is_removed_anywhere(
        prefix in "[ -#%-~]{0,16}",
        suffix in "[ -#%-~]{0,16}",
    ) {
        let raw = format!("{prefix}$0b00{suffix}");
        let out = sanitize(&raw);
        prop_assert_eq!(out.text().as_str(), format!("{prefix}{suffix}"));
    }
}

#[test]
fn deeply_nested_escapes_sanitize_in_linear_time() {
    // Every `$0` pairs with a `b00` only after the escape inside it is gone.
    let k = 20_000;
    let raw = format!("{}{}", "$0".repeat(k), "b00".repeat(k));
    assert_eq!(raw.len(), 100_000);

    let start = Instant::now();
    let out = sanitize(&raw);
    let duration = start.elapsed();

    assert!(out.text().is_empty());
    assert_eq!(
        out.warnings(),
        &[SanitizationWarning::NestedEscape { occurrences: k - 1 }]
    );
    // Assert bounded: one scan, not one round per nesting level
    assert!(duration.as_millis() < 1000, "Sanitizing took too long: {:?}", duration);
}
