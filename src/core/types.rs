// src/core/types.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One cipher or plain symbol.
pub type Symbol = char;

/// Token and word lengths, measured under a [`LengthPolicy`].
pub type Length = usize;

/// Rank of a reference word. Lower means more frequent.
pub type Rank = u64;

/// Which characters of a token take part in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LengthPolicy {
    /// Every printable ASCII character except space (0x21..=0x7E).
    AllPrintable,
    /// ASCII letters only; punctuation inside a token is ignored.
    #[default]
    LettersOnly,
}

impl LengthPolicy {
    pub fn counts(&self, c: char) -> bool {
        match self {
            LengthPolicy::AllPrintable => ('\u{21}'..='\u{7e}').contains(&c),
            LengthPolicy::LettersOnly => c.is_ascii_alphabetic(),
        }
    }

    pub fn length(&self, text: &str) -> Length {
        text.chars().filter(|&c| self.counts(c)).count()
    }

    /// Cipher-side symbols, normalised to upper case.
    pub fn cipher_symbols(&self, token: &str) -> Vec<Symbol> {
        text_symbols(token, *self, cipher_symbol)
    }

    /// Plain-side symbols, normalised to lower case.
    pub fn plain_symbols(&self, word: &str) -> Vec<Symbol> {
        text_symbols(word, *self, plain_symbol)
    }
}

fn text_symbols(text: &str, policy: LengthPolicy, normalise: fn(char) -> char) -> Vec<Symbol> {
    text.chars()
        .filter(|&c| policy.counts(c))
        .map(normalise)
        .collect()
}

pub fn cipher_symbol(c: char) -> Symbol {
    c.to_ascii_uppercase()
}

pub fn plain_symbol(c: char) -> Symbol {
    c.to_ascii_lowercase()
}

/// A known plaintext word from a ranked vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceWord {
    pub text: String,
    pub rank: Rank,
}

impl ReferenceWord {
    pub fn new(text: impl Into<String>, rank: Rank) -> Self {
        Self {
            text: text.into().to_lowercase(),
            rank,
        }
    }
}

/// Reference words already bound to some token.
///
/// Grows for the whole run and has no removal API: a consumed word is never
/// offered again, in any round or threshold pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumedWords(BTreeSet<String>);

impl ConsumedWords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the word was already consumed.
    pub fn consume(&mut self, word: &str) -> bool {
        self.0.insert(word.to_string())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.0.contains(word)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl FromIterator<String> for ConsumedWords {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
