/* ------------------------------------------------------------------ */
/* Corpus loading and text normalization                              */
/* ------------------------------------------------------------------ */
//
// The corpus is read whole — classical verse corpora are a few MB at
// most, so there is nothing to stream.

use std::fs;
use std::path::Path;

use crate::error::Result;

/// Zero-width non-joiner, common in Persian orthography. Stripped
/// everywhere so it never becomes a token of its own.
pub const ZWNJ: char = '\u{200C}';

/// Verse-half delimiter glyph used by the corpus.
pub const VERSE_DELIM: char = '|';

/// Read the whole corpus file, validating UTF-8 explicitly so a bad
/// encoding surfaces as Error::Encoding rather than a lossy decode.
pub fn load(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8(bytes)?)
}

/// Strip the zero-width joiner. Applied to the corpus once and to every
/// seed fragment at encode time, so both sides see the same text.
pub fn normalize(text: &str) -> String {
    text.chars().filter(|&c| c != ZWNJ).collect()
}

/// Word-mode pre-tokenization: surround the verse delimiter and every
/// newline with single spaces so both survive space-splitting as
/// first-class tokens.
pub fn mark_sentinels(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            VERSE_DELIM | '\n' => {
                out.push(' ');
                out.push(c);
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_zwnj() {
        let text = "می\u{200C}روم";
        assert_eq!(normalize(text), "میروم");
        assert_eq!(normalize("abc"), "abc");
    }

    #[test]
    fn sentinels_become_space_separated() {
        let marked = mark_sentinels("|ab\ncd");
        let tokens: Vec<&str> = marked.split(' ').filter(|t| !t.is_empty()).collect();
        assert_eq!(tokens, vec!["|", "ab", "\n", "cd"]);
    }

    #[test]
    fn load_rejects_invalid_utf8() {
        let path = std::env::temp_dir().join("shahgen_bad_utf8_test.txt");
        std::fs::write(&path, [0xFFu8, 0xFE, 0x41]).unwrap();
        let err = load(&path).unwrap_err();
        assert!(matches!(err, crate::error::Error::Encoding(_)));
        let _ = std::fs::remove_file(&path);
    }
}
