use proptest::prelude::*;
use zmusic::compiler::{compile_text, CompilerOptions, NoteCase};
use zmusic::format::{BinaryBlob, Note, TempoWidth};
use zmusic::sanitize::sanitize;

fn exact() -> CompilerOptions {
    CompilerOptions {
        tempo_width: TempoWidth::U16,
        note_case: NoteCase::Exact,
        strip_comments: false,
        ..CompilerOptions::default()
    }
}

fn note() -> impl Strategy<Value = Note> {
    prop::sample::select(vec![
        Note::C,
        Note::D,
        Note::E,
        Note::F,
        Note::G,
        Note::A,
        Note::B,
        Note::R,
    ])
}

proptest! {
    #[test]
    fn tempo_token_is_honored(
        prefix in "[a-gr<> olv0-9]{0,12}",
        tempo in 0u32..=255,
        suffix in "[ -~]{0,12}",
    ) {
        let compiled = compile_text(
            &format!("{prefix}T{tempo} {suffix}"),
            &CompilerOptions::default(),
        ).unwrap();
        prop_assert_eq!(compiled.tempo, tempo);
    }

    #[test]
    fn missing_tempo_defaults(text in "[ -SU-~\n]{0,64}") {
        let compiled = compile_text(&text, &exact()).unwrap();
        prop_assert_eq!(compiled.tempo, 120);
    }

    #[test]
    fn exact_note_count_matches_alphabet(text in "[ -SU-~\n]{0,64}") {
        let compiled = compile_text(&text, &exact()).unwrap();
        let sanitized = sanitize(&text).into_text();
        let expected: Vec<Note> = sanitized.as_str().chars().filter_map(Note::from_char).collect();
        let alphabet_count = sanitized
            .as_str()
            .chars()
            .filter(|c| "CDEFGABR".contains(*c))
            .count();
        prop_assert_eq!(compiled.notes.len(), alphabet_count);
        prop_assert_eq!(compiled.notes, expected);
    }

    #[test]
    fn blob_decodes_to_its_inputs(
        tempo in 0u32..=u16::MAX as u32,
        notes in prop::collection::vec(note(), 0..64),
    ) {
        let blob = BinaryBlob::encode(tempo, &notes, TempoWidth::U16).unwrap();
        let decoded = BinaryBlob::decode(blob.as_bytes()).unwrap();
        prop_assert_eq!(decoded.tempo, tempo);
        prop_assert_eq!(decoded.notes, notes);
    }

    #[test]
    fn u8_width_never_truncates(tempo in 256u32..100_000) {
        let result = compile_text(&format!("T{tempo} c"), &CompilerOptions::default());
        prop_assert!(result.is_err());
    }
}

#[test]
fn t45_scenario() {
    let compiled = compile_text("o4 T45 cde", &CompilerOptions::default()).unwrap();
    assert_eq!(compiled.tempo, 45);
    let decoded = BinaryBlob::decode(compiled.blob.as_bytes()).unwrap();
    assert_eq!(decoded.tempo, 45);
    assert_eq!(decoded.note_string(), "CDE");
}
