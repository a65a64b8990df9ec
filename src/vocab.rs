/* ------------------------------------------------------------------ */
/* Vocabulary: char-level (default) or word-level (--word flag)       */
/* ------------------------------------------------------------------ */
//
// Public interface is identical for both modes:
//   Vocabulary::chars(text)            → char-level
//   Vocabulary::words(text, max_size)  → word-level, frequency-capped
//   Vocabulary::load(path)             → load saved vocab
//   vocab.encode(text)        → Vec<usize>   (OOV maps to the unknown id)
//   vocab.encode_corpus(text) → Vec<usize>   (line-parallel, word mode)
//   vocab.decode(ids)         → String
//   vocab.len()               → usize
//
// The vocabulary is built once from the full corpus and never grows.
// Ids must be identical between training and generation, so word-level
// ordering is pinned: descending frequency, ties by first occurrence.
// The vocab is saved/loaded as JSON (serde_json).

use std::collections::HashMap;
use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::corpus::{mark_sentinels, normalize};
use crate::error::{Error, Result};

/// Unknown sentinel in char mode. U+FFFD never appears in a clean
/// corpus, and decodes to a visible "something was off" glyph.
pub const UNKNOWN_CHAR: char = '\u{FFFD}';
/// Unknown sentinel in word mode, fixed at id 1.
pub const UNKNOWN_WORD: &str = "[UNK]";
/// Word mode reserves id 0 (empty/padding) and id 1 (unknown).
const RESERVED_WORDS: usize = 2;

// ── Shared public struct ───────────────────────────────────────────────────

pub struct Vocabulary {
    mode: Mode,
}

enum Mode {
    Char(CharVocab),
    Word(WordVocab),
}

impl Vocabulary {
    // ── Constructors ─────────────────────────────────────────────────

    /// Char-level: sorted distinct characters of the normalized text,
    /// unknown sentinel prepended at id 0.
    pub fn chars(text: &str) -> Self {
        Self { mode: Mode::Char(CharVocab::from_text(text)) }
    }

    /// Word-level: the most frequent space-separated tokens of the
    /// normalized, sentinel-marked text, capped at `max_size` entries
    /// including the two reserved ids.
    pub fn words(text: &str, max_size: usize) -> Result<Self> {
        if max_size <= RESERVED_WORDS {
            return Err(Error::InvalidConfig(format!(
                "word vocabulary cap must exceed {RESERVED_WORDS} reserved ids, got {max_size}"
            )));
        }
        Ok(Self { mode: Mode::Word(WordVocab::from_text(text, max_size)) })
    }

    pub fn len(&self) -> usize {
        match &self.mode {
            Mode::Char(cv) => cv.id_to_char.len(),
            Mode::Word(wv) => wv.id_to_token.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fixed id of the unknown sentinel; the sampler masks it out.
    pub fn unk_id(&self) -> usize {
        match &self.mode {
            Mode::Char(_) => 0,
            Mode::Word(_) => 1,
        }
    }

    pub fn is_word(&self) -> bool {
        matches!(self.mode, Mode::Word(_))
    }

    pub fn granularity(&self) -> &'static str {
        if self.is_word() { "word" } else { "char" }
    }

    // ── encode / decode ──────────────────────────────────────────────

    /// Encode a text fragment. Tokens absent from the vocabulary map to
    /// the unknown id — never an error.
    pub fn encode(&self, text: &str) -> Vec<usize> {
        match &self.mode {
            Mode::Char(cv) => cv.encode(text),
            Mode::Word(wv) => wv.encode(text),
        }
    }

    /// Encode the whole corpus. Word mode splits on newlines and
    /// encodes lines in parallel, re-inserting the newline token at
    /// each boundary.
    pub fn encode_corpus(&self, text: &str) -> Vec<usize> {
        match &self.mode {
            Mode::Char(cv) => cv.encode(text),
            Mode::Word(wv) => {
                let text = normalize(text);
                let nl = wv.id("\n").unwrap_or(wv.unk_id);
                let mut ids: Vec<usize> = text
                    .split('\n')
                    .collect::<Vec<&str>>()
                    .par_iter()
                    .flat_map(|line| {
                        let mut chunk = wv.encode(line);
                        chunk.push(nl);
                        chunk
                    })
                    .collect();
                // drop the newline appended after the final line
                if ids.last() == Some(&nl) {
                    ids.pop();
                }
                ids
            }
        }
    }

    pub fn decode(&self, ids: &[usize]) -> String {
        let mut out = String::new();
        for &id in ids {
            self.append_token(&mut out, id);
        }
        out
    }

    /// Append one decoded token using the granularity's join rule:
    /// char mode concatenates; word mode separates tokens with a single
    /// space and renders the newline sentinel as a literal line break
    /// with no surrounding spaces.
    pub fn append_token(&self, buf: &mut String, id: usize) {
        match &self.mode {
            Mode::Char(cv) => {
                if let Some(&c) = cv.id_to_char.get(id) {
                    buf.push(c);
                }
            }
            Mode::Word(wv) => {
                let Some(tok) = wv.id_to_token.get(id) else { return };
                if tok.is_empty() {
                    return; // reserved padding renders as nothing
                }
                if tok == "\n" {
                    buf.push('\n');
                    return;
                }
                if !buf.is_empty() && !buf.ends_with('\n') {
                    buf.push(' ');
                }
                buf.push_str(tok);
            }
        }
    }

    /// First N vocab entries as display strings, for the startup print.
    pub fn sample_tokens(&self, n: usize) -> Vec<String> {
        let cap = n.min(self.len());
        match &self.mode {
            Mode::Char(cv) => cv.id_to_char[..cap].iter().map(|c| format!("{c:?}")).collect(),
            Mode::Word(wv) => wv.id_to_token[..cap].iter().map(|s| format!("{s:?}")).collect(),
        }
    }

    // ── Save / Load ──────────────────────────────────────────────────

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = match &self.mode {
            Mode::Char(cv) => VocabFile {
                granularity: "char".to_string(),
                tokens: cv.id_to_char.iter().map(|c| c.to_string()).collect(),
            },
            Mode::Word(wv) => VocabFile {
                granularity: "word".to_string(),
                tokens: wv.id_to_token.clone(),
            },
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file: VocabFile = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        match file.granularity.as_str() {
            "char" => {
                let mut chars = Vec::with_capacity(file.tokens.len());
                for t in &file.tokens {
                    let mut it = t.chars();
                    match (it.next(), it.next()) {
                        (Some(c), None) => chars.push(c),
                        _ => {
                            return Err(Error::InvalidConfig(format!(
                                "char vocabulary entry {t:?} is not a single character"
                            )))
                        }
                    }
                }
                Ok(Self { mode: Mode::Char(CharVocab::from_ordered(chars)) })
            }
            "word" => Ok(Self { mode: Mode::Word(WordVocab::from_ordered(file.tokens)) }),
            other => Err(Error::InvalidConfig(format!("unknown vocabulary granularity {other:?}"))),
        }
    }
}

// Serialisable vocab file format
#[derive(Serialize, Deserialize)]
struct VocabFile {
    granularity: String, // "char" | "word"
    tokens: Vec<String>, // token_id → token text
}

// ── Char-level vocabulary ──────────────────────────────────────────────────

struct CharVocab {
    char_to_id: HashMap<char, usize>,
    id_to_char: Vec<char>,
}

impl CharVocab {
    fn from_text(text: &str) -> Self {
        let text = normalize(text);
        let mut chars: Vec<char> = text.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        chars.retain(|&c| c != UNKNOWN_CHAR);

        let mut id_to_char = vec![UNKNOWN_CHAR]; // unknown = 0
        id_to_char.extend(chars);
        Self::from_ordered(id_to_char)
    }

    fn from_ordered(id_to_char: Vec<char>) -> Self {
        let char_to_id = id_to_char.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        Self { char_to_id, id_to_char }
    }

    fn encode(&self, text: &str) -> Vec<usize> {
        normalize(text)
            .chars()
            .map(|c| self.char_to_id.get(&c).copied().unwrap_or(0))
            .collect()
    }
}

// ── Word-level vocabulary ──────────────────────────────────────────────────

struct WordVocab {
    token_to_id: HashMap<String, usize>,
    id_to_token: Vec<String>,
    unk_id: usize,
}

impl WordVocab {
    fn from_text(text: &str, max_size: usize) -> Self {
        let text = mark_sentinels(&normalize(text));

        // count occurrences, remembering each token's first position so
        // frequency ties resolve the same way on every rebuild
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (i, tok) in text.split(' ').filter(|t| !t.is_empty()).enumerate() {
            if tok == UNKNOWN_WORD {
                continue; // reserved spelling stays reserved
            }
            let entry = counts.entry(tok).or_insert((0, i));
            entry.0 += 1;
        }

        let mut entries: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        entries.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        entries.truncate(max_size - RESERVED_WORDS);

        let mut id_to_token = vec![String::new(), UNKNOWN_WORD.to_string()];
        id_to_token.extend(entries.into_iter().map(|(t, _)| t.to_string()));
        Self::from_ordered(id_to_token)
    }

    fn from_ordered(id_to_token: Vec<String>) -> Self {
        let token_to_id: HashMap<String, usize> = id_to_token
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        let unk_id = token_to_id.get(UNKNOWN_WORD).copied().unwrap_or(1);
        Self { token_to_id, id_to_token, unk_id }
    }

    fn id(&self, token: &str) -> Option<usize> {
        self.token_to_id.get(token).copied()
    }

    fn encode(&self, text: &str) -> Vec<usize> {
        mark_sentinels(&normalize(text))
            .split(' ')
            .filter(|t| !t.is_empty())
            .map(|t| self.id(t).unwrap_or(self.unk_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aab_yields_two_tokens_plus_unknown() {
        let v = Vocabulary::chars("aab");
        assert_eq!(v.len(), 3);
        assert_eq!(v.unk_id(), 0);
        assert_eq!(v.encode("ab"), vec![1, 2]);
    }

    #[test]
    fn char_round_trip() {
        let v = Vocabulary::chars("|ab\n|cd\n");
        let ids = v.encode("|ab\n|cd\n");
        assert_eq!(v.decode(&ids), "|ab\n|cd\n");
    }

    #[test]
    fn char_oov_maps_to_unknown_not_error() {
        let v = Vocabulary::chars("ab");
        assert_eq!(v.encode("axb"), vec![1, v.unk_id(), 2]);
    }

    #[test]
    fn building_twice_is_identical() {
        let corpus = "به نام خداوند جان و خرد | کزین برتر اندیشه برنگذرد\n";
        let a = Vocabulary::words(corpus, 64).unwrap();
        let b = Vocabulary::words(corpus, 64).unwrap();
        for id in 0..a.len() {
            assert_eq!(a.sample_tokens(a.len())[id], b.sample_tokens(b.len())[id]);
        }
        let c = Vocabulary::chars(corpus);
        let d = Vocabulary::chars(corpus);
        assert_eq!(c.encode(corpus), d.encode(corpus));
    }

    #[test]
    fn word_ids_follow_frequency_then_first_seen() {
        // "b" appears three times, "a" twice, "c" once
        let v = Vocabulary::words("b a c b a b", 16).unwrap();
        assert_eq!(v.encode("b"), vec![2]);
        assert_eq!(v.encode("a"), vec![3]);
        assert_eq!(v.encode("c"), vec![4]);
        assert_eq!(v.encode("zzz"), vec![v.unk_id()]);
    }

    #[test]
    fn word_cap_is_enforced() {
        let v = Vocabulary::words("a b c d e f g h", 5).unwrap();
        assert_eq!(v.len(), 5);
        assert!(Vocabulary::words("a", 2).is_err());
    }

    #[test]
    fn word_round_trip_with_sentinels() {
        let v = Vocabulary::words("به نام | خرد\nجان و", 64).unwrap();
        let text = "به نام | خرد\nجان و";
        assert_eq!(v.decode(&v.encode(text)), text);
    }

    #[test]
    fn word_corpus_encoding_matches_sequential() {
        let corpus = "a b | c\nd e\nf\n";
        let v = Vocabulary::words(corpus, 64).unwrap();
        assert_eq!(v.encode_corpus(corpus), v.encode(corpus));
    }

    #[test]
    fn zwnj_never_reaches_the_vocabulary() {
        let v = Vocabulary::chars("a\u{200C}b");
        assert_eq!(v.len(), 3); // unknown + a + b
        assert_eq!(v.encode("a\u{200C}b"), vec![1, 2]);
    }

    #[test]
    fn save_load_round_trip() {
        let corpus = "به نام خداوند جان و خرد\n";
        let path = std::env::temp_dir().join("shahgen_vocab_test.json");

        let v = Vocabulary::words(corpus, 64).unwrap();
        v.save(&path).unwrap();
        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.len(), v.len());
        assert_eq!(loaded.encode(corpus), v.encode(corpus));

        let c = Vocabulary::chars(corpus);
        c.save(&path).unwrap();
        let loaded = Vocabulary::load(&path).unwrap();
        assert_eq!(loaded.encode(corpus), c.encode(corpus));

        let _ = std::fs::remove_file(&path);
    }
}
