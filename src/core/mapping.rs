// File: src/core/mapping.rs
use crate::core::types::{cipher_symbol, plain_symbol, Symbol};
use crate::error::MappingConflict;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The partial substitution table under construction.
///
/// Keeps both directions so either side of a proposed pair can be checked in
/// O(log n). Entries are only ever added; the table stays injective because
/// every insertion goes through [`MappingStore::commit`], which re-checks.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingStore {
    forward: BTreeMap<Symbol, Symbol>,
    inverse: BTreeMap<Symbol, Symbol>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a store from flat pairs, failing on the first pair that would
    /// break injectivity.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, MappingConflict>
    where
        I: IntoIterator<Item = (Symbol, Symbol)>,
    {
        let mut store = Self::new();
        for (origin, target) in pairs {
            store.commit(&[origin], &[target])?;
        }
        Ok(store)
    }

    pub fn get(&self, origin: Symbol) -> Option<Symbol> {
        self.forward.get(&cipher_symbol(origin)).copied()
    }

    /// The cipher symbol currently mapped onto `target`, if any.
    pub fn origin_of(&self, target: Symbol) -> Option<Symbol> {
        self.inverse.get(&plain_symbol(target)).copied()
    }

    pub fn is_mapped(&self, origin: Symbol) -> bool {
        self.get(origin).is_some()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, Symbol)> + '_ {
        self.forward.iter().map(|(k, v)| (*k, *v))
    }

    /// Checks whether binding `token` to `candidate` is consistent with the
    /// table, without touching it. Reports the first conflict found.
    ///
    /// Pairs earlier in the same token count as bound for the later ones, so
    /// a token can never bind two of its symbols to one target (or one
    /// symbol to two targets).
    pub fn propose(&self, token: &[Symbol], candidate: &[Symbol]) -> Result<(), MappingConflict> {
        self.new_pairs(token, candidate).map(|_| ())
    }

    /// Binds `token` to `candidate`, adding every pair whose origin is not
    /// mapped yet. Returns the pairs that were added.
    pub fn commit(
        &mut self,
        token: &[Symbol],
        candidate: &[Symbol],
    ) -> Result<Vec<(Symbol, Symbol)>, MappingConflict> {
        let added = self.new_pairs(token, candidate)?;
        for &(origin, target) in &added {
            self.forward.insert(origin, target);
            self.inverse.insert(target, origin);
        }
        Ok(added)
    }

    fn new_pairs(
        &self,
        token: &[Symbol],
        candidate: &[Symbol],
    ) -> Result<Vec<(Symbol, Symbol)>, MappingConflict> {
        if token.len() != candidate.len() {
            return Err(MappingConflict::LengthMismatch {
                token: token.len(),
                candidate: candidate.len(),
            });
        }

        let mut pending: Vec<(Symbol, Symbol)> = Vec::new();
        for (&t, &c) in token.iter().zip(candidate) {
            let (t, c) = (cipher_symbol(t), plain_symbol(c));
            let mapped = self
                .forward
                .get(&t)
                .copied()
                .or_else(|| pending.iter().find(|(o, _)| *o == t).map(|(_, v)| *v));

            match mapped {
                Some(existing) if existing == c => continue,
                Some(existing) => {
                    return Err(MappingConflict::OriginAlreadyMapped {
                        symbol: t,
                        mapped_to: existing,
                        attempted: c,
                    })
                }
                None => {}
            }

            let holder = self
                .inverse
                .get(&c)
                .copied()
                .or_else(|| pending.iter().find(|(_, v)| *v == c).map(|(o, _)| *o));
            if let Some(held_by) = holder {
                return Err(MappingConflict::TargetAlreadyTaken {
                    target: c,
                    held_by,
                    attempted_by: t,
                });
            }
            pending.push((t, c));
        }
        Ok(pending)
    }

    /// How many of `token`'s symbols are already mapped (per occurrence).
    pub fn resolved_count(&self, token: &[Symbol]) -> usize {
        token.iter().filter(|&&s| self.is_mapped(s)).count()
    }

    pub fn is_resolved(&self, token: &[Symbol]) -> bool {
        self.resolved_count(token) == token.len()
    }

    /// Applies the table to free text: mapped symbols come out lower-case,
    /// everything else is left exactly as it was.
    pub fn render(&self, text: &str) -> String {
        text.chars()
            .map(|c| self.get(c).map(plain_symbol).unwrap_or(c))
            .collect()
    }

    /// Occurrences of each mapped cipher symbol in `text`.
    pub fn occurrences(&self, text: &str) -> BTreeMap<Symbol, usize> {
        let mut counts = BTreeMap::new();
        for c in text.chars() {
            let origin = cipher_symbol(c);
            if self.forward.contains_key(&origin) {
                *counts.entry(origin).or_insert(0) += 1;
            }
        }
        counts
    }
}

impl fmt::Debug for MappingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.forward.iter()).finish()
    }
}

/// Two-row key table: cipher symbols on top, plain symbols (or `?`) below.
impl fmt::Display for MappingStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut origins: Vec<Symbol> = ('A'..='Z').collect();
        origins.extend(self.forward.keys().filter(|k| !k.is_ascii_uppercase()));
        for origin in &origins {
            write!(f, "{origin}")?;
        }
        writeln!(f)?;
        for origin in &origins {
            write!(f, "{}", self.forward.get(origin).copied().unwrap_or('?'))?;
        }
        writeln!(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Vec<Symbol> {
        s.chars().collect()
    }

    fn assert_injective(store: &MappingStore) {
        let mut targets: Vec<Symbol> = store.iter().map(|(_, t)| t).collect();
        let total = targets.len();
        targets.sort_unstable();
        targets.dedup();
        assert_eq!(targets.len(), total, "two origins share a target: {store:?}");
    }

    #[test]
    fn fresh_token_binds_every_symbol() {
        let mut store = MappingStore::new();
        assert_eq!(store.propose(&sym("XYZ"), &sym("the")), Ok(()));
        let added = store.commit(&sym("XYZ"), &sym("the")).unwrap();
        assert_eq!(added, vec![('X', 't'), ('Y', 'h'), ('Z', 'e')]);
        assert_eq!(store.get('X'), Some('t'));
        assert_eq!(store.origin_of('e'), Some('Z'));
    }

    #[test]
    fn consistent_origin_is_accepted() {
        let mut store = MappingStore::from_pairs([('X', 't')]).unwrap();
        assert_eq!(store.propose(&sym("XQR"), &sym("top")), Ok(()));
        let added = store.commit(&sym("XQR"), &sym("top")).unwrap();
        assert_eq!(added, vec![('Q', 'o'), ('R', 'p')]);
        assert_eq!(store.get('X'), Some('t'));
    }

    #[test]
    fn remapped_origin_is_rejected_without_side_effects() {
        let store = MappingStore::from_pairs([('X', 't')]).unwrap();
        let before = store.clone();
        assert_eq!(
            store.propose(&sym("XQR"), &sym("sop")),
            Err(MappingConflict::OriginAlreadyMapped {
                symbol: 'X',
                mapped_to: 't',
                attempted: 's'
            })
        );
        assert_eq!(store, before);
    }

    #[test]
    fn taken_target_is_rejected() {
        let mut store = MappingStore::from_pairs([('X', 't')]).unwrap();
        let err = store.commit(&sym("AB"), &sym("to")).unwrap_err();
        assert_eq!(
            err,
            MappingConflict::TargetAlreadyTaken {
                target: 't',
                held_by: 'X',
                attempted_by: 'A'
            }
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn conflicts_inside_one_token_are_caught() {
        let store = MappingStore::new();
        assert!(matches!(
            store.propose(&sym("AB"), &sym("oo")),
            Err(MappingConflict::TargetAlreadyTaken { target: 'o', .. })
        ));
        assert!(matches!(
            store.propose(&sym("AA"), &sym("at")),
            Err(MappingConflict::OriginAlreadyMapped { symbol: 'A', .. })
        ));
        assert_eq!(store.propose(&sym("ABA"), &sym("eve")), Ok(()));
    }

    #[test]
    fn committed_pair_proposes_cleanly_again() {
        let mut store = MappingStore::new();
        store.commit(&sym("XYZ"), &sym("the")).unwrap();
        store.commit(&sym("QY"), &sym("oh")).unwrap();
        assert_eq!(store.propose(&sym("XYZ"), &sym("the")), Ok(()));
        assert!(store.commit(&sym("XYZ"), &sym("the")).unwrap().is_empty());
        assert_injective(&store);
    }

    #[test]
    fn length_mismatch_is_a_conflict() {
        let store = MappingStore::new();
        assert_eq!(
            store.propose(&sym("AB"), &sym("abc")),
            Err(MappingConflict::LengthMismatch {
                token: 2,
                candidate: 3
            })
        );
    }

    #[test]
    fn from_pairs_rejects_shared_targets() {
        assert!(MappingStore::from_pairs([('A', 'x'), ('B', 'x')]).is_err());
    }

    #[test]
    fn render_lowercases_only_mapped_symbols() {
        let store = MappingStore::from_pairs([('X', 't'), ('Y', 'h'), ('Z', 'e')]).unwrap();
        assert_eq!(store.render("XYZ QXY, Zz"), "the Qth, ee");
        assert_eq!(store.resolved_count(&sym("XQR")), 1);
        assert!(store.is_resolved(&sym("ZYX")));
    }

    #[test]
    fn occurrences_count_mapped_origins() {
        let store = MappingStore::from_pairs([('X', 't')]).unwrap();
        let counts = store.occurrences("XAX xB");
        assert_eq!(counts.get(&'X'), Some(&3));
        assert_eq!(counts.len(), 1);
    }

    #[test]
    fn display_shows_key_rows() {
        let store = MappingStore::from_pairs([('A', 'q')]).unwrap();
        let table = store.to_string();
        let mut rows = table.lines();
        assert_eq!(rows.next(), Some("ABCDEFGHIJKLMNOPQRSTUVWXYZ"));
        assert_eq!(rows.next(), Some(format!("q{}", "?".repeat(25)).as_str()));
    }
}
