// File: src/core/vocabulary.rs
use crate::core::types::{ConsumedWords, Length, LengthPolicy, Rank, ReferenceWord, Symbol};
use crate::error::{Result, SolverError};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

/// A ranked list of plaintext words, most frequent first.
///
/// Equal ranks keep the order the words were supplied in.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    pub name: String,
    words: Vec<ReferenceWord>,
}

impl Vocabulary {
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            words: Vec::new(),
        }
    }

    /// Builds a vocabulary from (word, rank) pairs in insertion order.
    /// Words are lower-cased; a repeated word keeps its first rank.
    pub fn from_ranked<I, S>(name: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Rank)>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut words: Vec<ReferenceWord> = pairs
            .into_iter()
            .map(|(word, rank)| ReferenceWord::new(word.as_ref().trim(), rank))
            .filter(|w| !w.text.is_empty() && seen.insert(w.text.clone()))
            .collect();
        // stable: insertion order survives among equal ranks
        words.sort_by_key(|w| w.rank);
        Self {
            name: name.into(),
            words,
        }
    }

    /// Parses a JSON object mapping each word to its rank.
    pub fn from_json_str(name: &str, json: &str) -> Result<Self> {
        let malformed = |reason: String| SolverError::MalformedVocabulary {
            name: name.to_string(),
            reason,
        };
        let value: Value = serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(entries) = value else {
            return Err(malformed("expected an object of word -> rank".into()));
        };

        let mut pairs = Vec::with_capacity(entries.len());
        for (word, rank) in entries {
            let rank = rank
                .as_u64()
                .ok_or_else(|| malformed(format!("rank of {word:?} is not a non-negative integer")))?;
            pairs.push((word, rank));
        }
        Ok(Self::from_ranked(name, pairs))
    }

    /// Parses a plain word list: one `word` or `word rank` per line.
    /// Without an explicit rank, the line position is the rank.
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_word_list(name: &str, text: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let word = fields.next().unwrap_or_default();
            let rank = match fields.next() {
                Some(raw) => raw.parse::<Rank>().map_err(|_| SolverError::MalformedVocabulary {
                    name: name.to_string(),
                    reason: format!("line {}: rank {raw:?} is not an integer", line_no + 1),
                })?,
                None => line_no as Rank + 1,
            };
            pairs.push((word.to_string(), rank));
        }
        Ok(Self::from_ranked(name, pairs))
    }

    /// Reads a vocabulary file; `.json` files are word -> rank objects,
    /// anything else is a word list.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(SolverError::MissingInputFile(path.to_path_buf()));
        }
        let name = path.display().to_string();
        let content = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&name, &content)
        } else {
            Self::from_word_list(&name, &content)
        }
    }

    /// Like [`Vocabulary::load`], but an unusable file degrades to an empty
    /// vocabulary after a single warning so the run can continue.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(vocabulary) => {
                info!("Loaded vocabulary {} ({} words)", vocabulary.name, vocabulary.len());
                vocabulary
            }
            Err(e) => {
                warn!("Ignoring vocabulary {}: {}", path.display(), e);
                Self::empty(path.display().to_string())
            }
        }
    }

    pub fn words(&self) -> &[ReferenceWord] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    word: ReferenceWord,
    symbols: Vec<Symbol>,
    source: usize,
}

/// A reference word offered for a token, with its aligned plain symbols.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub word: &'a ReferenceWord,
    pub symbols: &'a [Symbol],
    pub vocabulary: &'a str,
}

/// Prioritised vocabularies, pre-split by Length.
///
/// Per-length lists hold every word in priority order: vocabularies in the
/// order given, each in rank order. A word present in several vocabularies
/// appears once, at the position of its earliest vocabulary.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    policy: LengthPolicy,
    names: Vec<String>,
    by_length: BTreeMap<Length, Vec<IndexEntry>>,
    known: HashSet<String>,
}

impl ReferenceIndex {
    pub fn new(vocabularies: Vec<Vocabulary>, policy: LengthPolicy) -> Self {
        let mut by_length: BTreeMap<Length, Vec<IndexEntry>> = BTreeMap::new();
        let mut known = HashSet::new();
        let mut names = Vec::with_capacity(vocabularies.len());

        for (source, vocabulary) in vocabularies.into_iter().enumerate() {
            names.push(vocabulary.name);
            for word in vocabulary.words {
                let symbols = policy.plain_symbols(&word.text);
                if symbols.is_empty() || !known.insert(word.text.clone()) {
                    continue;
                }
                by_length.entry(symbols.len()).or_default().push(IndexEntry {
                    word,
                    symbols,
                    source,
                });
            }
        }

        Self {
            policy,
            names,
            by_length,
            known,
        }
    }

    pub fn policy(&self) -> LengthPolicy {
        self.policy
    }

    /// The `position`-th word of `length` (0-based) that is not in `excluded`.
    ///
    /// The exclusion set is applied on every call, so the same position can
    /// name a different word once more words have been consumed.
    pub fn candidate_at(
        &self,
        length: Length,
        position: usize,
        excluded: &ConsumedWords,
    ) -> Option<Candidate<'_>> {
        self.entries(length)
            .iter()
            .filter(|entry| !excluded.contains(&entry.word.text))
            .nth(position)
            .map(|entry| self.candidate(entry))
    }

    /// Every word of `length` not in `excluded`, in priority order.
    pub fn candidates<'a>(
        &'a self,
        length: Length,
        excluded: &'a ConsumedWords,
    ) -> impl Iterator<Item = Candidate<'a>> + 'a {
        self.entries(length)
            .iter()
            .filter(move |entry| !excluded.contains(&entry.word.text))
            .map(move |entry| self.candidate(entry))
    }

    fn entries(&self, length: Length) -> &[IndexEntry] {
        self.by_length.get(&length).map(Vec::as_slice).unwrap_or(&[])
    }

    fn candidate<'a>(&'a self, entry: &'a IndexEntry) -> Candidate<'a> {
        Candidate {
            word: &entry.word,
            symbols: &entry.symbols,
            vocabulary: &self.names[entry.source],
        }
    }

    /// Number of words of `length` across all vocabularies, consumed or not.
    pub fn count(&self, length: Length) -> usize {
        self.by_length.get(&length).map_or(0, Vec::len)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.known.contains(&word.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(vocabs: Vec<Vocabulary>) -> ReferenceIndex {
        ReferenceIndex::new(vocabs, LengthPolicy::LettersOnly)
    }

    #[test]
    fn equal_ranks_keep_insertion_order() {
        let vocab = Vocabulary::from_ranked("v", [("was", 5), ("the", 1), ("and", 5), ("for", 5)]);
        let texts: Vec<&str> = vocab.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["the", "was", "and", "for"]);
    }

    #[test]
    fn json_object_preserves_document_order_on_ties() {
        let vocab = Vocabulary::from_json_str("v", r#"{"zoo": 2, "ant": 2, "THE": 1}"#).unwrap();
        let texts: Vec<&str> = vocab.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["the", "zoo", "ant"]);
    }

    #[test]
    fn non_mapping_json_is_malformed() {
        let err = Vocabulary::from_json_str("v", r#"["the", "and"]"#).unwrap_err();
        assert!(matches!(err, SolverError::MalformedVocabulary { .. }));

        let err = Vocabulary::from_json_str("v", r#"{"the": "first"}"#).unwrap_err();
        assert!(matches!(err, SolverError::MalformedVocabulary { .. }));
    }

    #[test]
    fn word_list_ranks_by_line_or_explicit_rank() {
        let vocab = Vocabulary::from_word_list("v", "# header\nof\nthe 1\n\nand\n").unwrap();
        let ranked: Vec<(&str, Rank)> = vocab
            .words()
            .iter()
            .map(|w| (w.text.as_str(), w.rank))
            .collect();
        assert_eq!(ranked, vec![("the", 1), ("of", 2), ("and", 5)]);

        assert!(Vocabulary::from_word_list("v", "the one").is_err());
    }

    #[test]
    fn load_degrades_missing_file_to_empty() {
        let vocab = Vocabulary::load_or_empty(Path::new("/definitely/not/here.json"));
        assert!(vocab.is_empty());
    }

    #[test]
    fn earlier_vocabulary_wins() {
        let primary = Vocabulary::from_ranked("primary", [("and", 9)]);
        let secondary = Vocabulary::from_ranked("secondary", [("the", 1), ("and", 2)]);
        let index = index(vec![primary, secondary]);
        let none = ConsumedWords::new();

        let first = index.candidate_at(3, 0, &none).unwrap();
        assert_eq!(first.word.text, "and");
        assert_eq!(first.vocabulary, "primary");
        assert_eq!(index.candidate_at(3, 1, &none).unwrap().word.text, "the");
        assert!(index.candidate_at(3, 2, &none).is_none());
        assert_eq!(index.count(3), 2);
    }

    #[test]
    fn candidate_at_honours_growing_exclusions() {
        let vocab = Vocabulary::from_ranked("v", [("the", 1), ("and", 2), ("for", 3)]);
        let index = index(vec![vocab]);
        let mut consumed = ConsumedWords::new();

        assert_eq!(index.candidate_at(3, 1, &consumed).unwrap().word.text, "and");
        consumed.consume("the");
        assert_eq!(index.candidate_at(3, 1, &consumed).unwrap().word.text, "for");
        assert_eq!(index.candidate_at(3, 0, &consumed).unwrap().word.text, "and");
        assert!(index.candidate_at(4, 0, &consumed).is_none());
    }

    #[test]
    fn candidates_walk_the_same_order_as_positions() {
        let primary = Vocabulary::from_ranked("primary", [("for", 4)]);
        let secondary = Vocabulary::from_ranked("secondary", [("the", 1), ("and", 2), ("for", 3)]);
        let index = index(vec![primary, secondary]);
        let consumed: ConsumedWords = ["the".to_string()].into_iter().collect();

        let walked: Vec<&str> = index
            .candidates(3, &consumed)
            .map(|c| c.word.text.as_str())
            .collect();
        assert_eq!(walked, vec!["for", "and"]);
        for (position, word) in walked.iter().enumerate() {
            assert_eq!(index.candidate_at(3, position, &consumed).unwrap().word.text, *word);
        }
        assert_eq!(index.candidates(7, &consumed).count(), 0);
    }

    #[test]
    fn lengths_follow_the_policy() {
        let vocab = Vocabulary::from_ranked("v", [("don't", 1)]);
        let letters = ReferenceIndex::new(vec![vocab.clone()], LengthPolicy::LettersOnly);
        let printable = ReferenceIndex::new(vec![vocab], LengthPolicy::AllPrintable);
        let none = ConsumedWords::new();

        assert_eq!(letters.candidate_at(4, 0, &none).unwrap().symbols, &['d', 'o', 'n', 't']);
        assert!(printable.candidate_at(4, 0, &none).is_none());
        assert_eq!(printable.candidate_at(5, 0, &none).unwrap().word.text, "don't");
    }
}
