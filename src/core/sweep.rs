// File: src/core/sweep.rs
//! Escalating relaxation once the round scheduler has stalled.
//!
//! Each pass rescans every token of every Length in its original order and
//! only searches candidates for tokens whose already-resolved share is at
//! least the pass threshold. Fully resolved tokens are left alone.

use crate::core::grouper::LengthGroups;
use crate::core::mapping::MappingStore;
use crate::core::scheduler::{Attempt, AttemptOutcome};
use crate::core::types::{ConsumedWords, Length, Symbol};
use crate::core::vocabulary::ReferenceIndex;
use log::{debug, trace};

/// Result of one threshold pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdReport {
    pub threshold: u8,
    /// One entry per token that cleared the threshold.
    pub attempts: Vec<Attempt>,
    /// Tokens skipped because too little of them was resolved.
    pub below_threshold: usize,
    /// Tokens skipped because every symbol was already resolved.
    pub already_resolved: usize,
    /// Candidates rejected on conflict while searching.
    pub rejections: usize,
}

impl ThresholdReport {
    pub fn accepted(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_accepted()).count()
    }
}

/// Whether a token with `resolved` of `length` symbols mapped clears `threshold` percent.
pub fn clears_threshold(resolved: usize, length: usize, threshold: u8) -> bool {
    length > 0 && resolved * 100 >= usize::from(threshold) * length
}

pub struct ThresholdSweep<'a> {
    groups: &'a LengthGroups,
    index: &'a ReferenceIndex,
}

impl<'a> ThresholdSweep<'a> {
    pub fn new(groups: &'a LengthGroups, index: &'a ReferenceIndex) -> Self {
        Self { groups, index }
    }

    /// True while some token still has an unmapped symbol.
    pub fn has_unresolved(&self, mapping: &MappingStore) -> bool {
        let policy = self.groups.policy();
        self.groups
            .iter()
            .flat_map(|(_, tokens)| tokens)
            .any(|t| !mapping.is_resolved(&policy.cipher_symbols(t)))
    }

    /// One pass over every token at `threshold` percent.
    pub fn pass(
        &self,
        threshold: u8,
        mapping: &mut MappingStore,
        consumed: &mut ConsumedWords,
    ) -> ThresholdReport {
        let policy = self.groups.policy();
        let mut report = ThresholdReport {
            threshold,
            ..ThresholdReport::default()
        };

        for (length, tokens) in self.groups.iter() {
            for token in tokens {
                let symbols = policy.cipher_symbols(token);
                let resolved = mapping.resolved_count(&symbols);
                if resolved == symbols.len() {
                    report.already_resolved += 1;
                    continue;
                }
                if !clears_threshold(resolved, symbols.len(), threshold) {
                    report.below_threshold += 1;
                    continue;
                }

                let attempt = self.search(length, token, &symbols, mapping, consumed, &mut report.rejections);
                trace!("threshold {}% length {}: {:?}", threshold, length, attempt);
                report.attempts.push(attempt);
            }
        }

        debug!(
            "Threshold {}%: {} eligible, {} accepted, {} below threshold",
            threshold,
            report.attempts.len(),
            report.accepted(),
            report.below_threshold
        );
        report
    }

    /// Walks the candidate list from the top and binds the first word that
    /// fits the mapping.
    fn search(
        &self,
        length: Length,
        token: &str,
        symbols: &[Symbol],
        mapping: &mut MappingStore,
        consumed: &mut ConsumedWords,
        rejections: &mut usize,
    ) -> Attempt {
        let mut accepted = None;
        for candidate in self.index.candidates(length, consumed) {
            match mapping.commit(symbols, candidate.symbols) {
                Ok(added) => {
                    let vocabulary = candidate.vocabulary.to_string();
                    accepted = Some((candidate.word.text.clone(), vocabulary, added));
                    break;
                }
                Err(_) => *rejections += 1,
            }
        }

        if let Some((word, vocabulary, added)) = accepted {
            consumed.consume(&word);
            return Attempt {
                length,
                token: token.to_string(),
                candidate: Some(word),
                vocabulary: Some(vocabulary),
                outcome: AttemptOutcome::Accepted { added },
            };
        }

        Attempt {
            length,
            token: token.to_string(),
            candidate: None,
            vocabulary: None,
            outcome: AttemptOutcome::NoCandidateAvailable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LengthPolicy;
    use crate::core::vocabulary::Vocabulary;

    #[test]
    fn ratio_comparison_is_exact() {
        assert!(clears_threshold(2, 4, 50));
        assert!(!clears_threshold(2, 4, 70));
        assert!(clears_threshold(1, 3, 32));
        assert!(!clears_threshold(1, 3, 34));
        assert!(!clears_threshold(0, 0, 0));
    }

    #[test]
    fn half_resolved_token_waits_for_its_threshold() {
        let policy = LengthPolicy::LettersOnly;
        let groups = LengthGroups::build(&["ABCD"], policy);
        let vocab = Vocabulary::from_ranked("v", [("that", 1), ("than", 2)]);
        let index = ReferenceIndex::new(vec![vocab], policy);
        let sweep = ThresholdSweep::new(&groups, &index);

        let mut mapping = MappingStore::from_pairs([('A', 't'), ('B', 'h')]).unwrap();
        let mut consumed = ConsumedWords::new();

        let at_70 = sweep.pass(70, &mut mapping, &mut consumed);
        assert_eq!(at_70.below_threshold, 1);
        assert!(at_70.attempts.is_empty());
        assert_eq!(mapping.len(), 2);

        let at_50 = sweep.pass(50, &mut mapping, &mut consumed);
        assert_eq!(at_50.accepted(), 1);
        // "that" needs D -> t, which A holds
        assert_eq!(at_50.rejections, 1);
        assert_eq!(at_50.attempts[0].candidate.as_deref(), Some("than"));
        assert_eq!(mapping.render("ABCD"), "than");
        assert!(!sweep.has_unresolved(&mapping));

        let again = sweep.pass(40, &mut mapping, &mut consumed);
        assert_eq!(again.already_resolved, 1);
    }

    #[test]
    fn long_conflicting_prefix_is_walked_once() {
        let policy = LengthPolicy::LettersOnly;
        let groups = LengthGroups::build(&["ABCDE"], policy);
        // every filler word needs A -> s, but A is already t
        let mut words: Vec<(String, u64)> = (0..500u64)
            .map(|i| {
                let c = char::from(b'a' + (i % 26) as u8);
                let d = char::from(b'a' + (i / 26 % 26) as u8);
                (format!("sxy{c}{d}"), i)
            })
            .collect();
        words.push(("thezy".to_string(), 1_000));
        let vocab = Vocabulary::from_ranked("v", words);
        let index = ReferenceIndex::new(vec![vocab], policy);
        let fillers = index.count(5) - 1;
        let sweep = ThresholdSweep::new(&groups, &index);

        let mut mapping = MappingStore::from_pairs([('A', 't'), ('B', 'h'), ('C', 'e')]).unwrap();
        let mut consumed = ConsumedWords::new();
        let report = sweep.pass(60, &mut mapping, &mut consumed);

        assert_eq!(report.rejections, fillers);
        assert_eq!(report.attempts[0].candidate.as_deref(), Some("thezy"));
        assert!(consumed.contains("thezy"));
        assert_eq!(mapping.render("ABCDE"), "thezy");
    }

    #[test]
    fn pass_skips_consumed_words() {
        let policy = LengthPolicy::LettersOnly;
        let groups = LengthGroups::build(&["AQ"], policy);
        let vocab = Vocabulary::from_ranked("v", [("to", 1), ("tv", 2)]);
        let index = ReferenceIndex::new(vec![vocab], policy);
        let sweep = ThresholdSweep::new(&groups, &index);

        let mut mapping = MappingStore::from_pairs([('A', 't')]).unwrap();
        let mut consumed: ConsumedWords = ["to".to_string()].into_iter().collect();

        let report = sweep.pass(50, &mut mapping, &mut consumed);
        assert_eq!(report.attempts[0].candidate.as_deref(), Some("tv"));
        assert_eq!(report.rejections, 0);
    }
}
