// File: src/core/grouper.rs
use crate::core::types::{Length, LengthPolicy};
use crate::error::{Result, SolverError};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Ciphertext tokens bucketed by Length, original order kept inside each bucket.
#[derive(Debug, Clone, Default)]
pub struct LengthGroups {
    policy: LengthPolicy,
    groups: BTreeMap<Length, Vec<String>>,
}

impl LengthGroups {
    /// Groups an ordered token sequence. Tokens of Length 0 are dropped and a
    /// repeated token keeps only its first position.
    pub fn build<S: AsRef<str>>(tokens: &[S], policy: LengthPolicy) -> Self {
        let mut seen = HashSet::new();
        let mut groups: BTreeMap<Length, Vec<String>> = BTreeMap::new();
        for token in tokens {
            let token = token.as_ref();
            let length = policy.length(token);
            if length == 0 || !seen.insert(token) {
                continue;
            }
            groups.entry(length).or_default().push(token.to_string());
        }
        Self { policy, groups }
    }

    pub fn policy(&self) -> LengthPolicy {
        self.policy
    }

    /// Distinct Lengths, ascending.
    pub fn lengths(&self) -> impl Iterator<Item = Length> + '_ {
        self.groups.keys().copied()
    }

    pub fn tokens(&self, length: Length) -> &[String] {
        self.groups.get(&length).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Length, &[String])> {
        self.groups.iter().map(|(l, t)| (*l, t.as_slice()))
    }

    pub fn token_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Keeps only the tokens accepted by `keep`, dropping emptied groups.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> Self {
        let groups = self
            .groups
            .iter()
            .filter_map(|(length, tokens)| {
                let kept: Vec<String> = tokens.iter().filter(|t| keep(t.as_str())).cloned().collect();
                (!kept.is_empty()).then_some((*length, kept))
            })
            .collect();
        Self {
            policy: self.policy,
            groups,
        }
    }
}

/// Reads a ciphertext file. A missing file is fatal to a run.
pub fn read_ciphertext(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(SolverError::MissingInputFile(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Splits raw ciphertext into whitespace-separated tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Deduplicates a token stream and orders it by Length, then by how often
/// each token occurs (most frequent first), then case-insensitively.
pub fn prepare_tokens(text: &str, policy: LengthPolicy) -> Vec<String> {
    let stream = tokenize(text);
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut unique = Vec::new();
    for token in &stream {
        let count = counts.entry(token.as_str()).or_insert(0);
        if *count == 0 {
            unique.push(token.as_str());
        }
        *count += 1;
    }

    unique.sort_by(|a, b| {
        policy
            .length(a)
            .cmp(&policy.length(b))
            .then_with(|| counts[b].cmp(&counts[a]))
            .then_with(|| a.to_lowercase().cmp(&b.to_lowercase()))
            .then_with(|| a.cmp(b))
    });
    unique.into_iter().map(str::to_string).collect()
}
