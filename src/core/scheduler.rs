// File: src/core/scheduler.rs
//! Length-synchronised greedy matching.
//!
//! Each round makes at most one attempt per active Length, in ascending
//! Length order, so a family of long tokens can never starve the short ones.
//! A Length is exhausted once its token cursor runs past its last token.

use crate::core::grouper::LengthGroups;
use crate::core::mapping::MappingStore;
use crate::core::types::{ConsumedWords, Length, Symbol};
use crate::core::vocabulary::ReferenceIndex;
use crate::error::MappingConflict;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthStatus {
    Active,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LengthCursor {
    next_token: usize,
    status: LengthStatus,
}

/// Cursors of an in-progress run. Serializable so a run can be resumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundState {
    round: usize,
    cursors: BTreeMap<Length, LengthCursor>,
    /// Candidate position per token still being retried.
    candidate_positions: BTreeMap<String, usize>,
}

impl RoundState {
    pub fn new(groups: &LengthGroups) -> Self {
        let cursors = groups
            .lengths()
            .map(|length| {
                let cursor = LengthCursor {
                    next_token: 0,
                    status: LengthStatus::Active,
                };
                (length, cursor)
            })
            .collect();
        Self {
            round: 0,
            cursors,
            candidate_positions: BTreeMap::new(),
        }
    }

    /// Rounds completed so far.
    pub fn round(&self) -> usize {
        self.round
    }

    pub fn is_finished(&self) -> bool {
        self.cursors
            .values()
            .all(|c| c.status == LengthStatus::Exhausted)
    }

    pub fn status(&self, length: Length) -> Option<LengthStatus> {
        self.cursors.get(&length).map(|c| c.status)
    }

    pub fn next_token(&self, length: Length) -> Option<usize> {
        self.cursors.get(&length).map(|c| c.next_token)
    }

    pub fn candidate_position(&self, token: &str) -> usize {
        self.candidate_positions.get(token).copied().unwrap_or(0)
    }

    fn active_lengths(&self) -> Vec<Length> {
        self.cursors
            .iter()
            .filter(|(_, c)| c.status == LengthStatus::Active)
            .map(|(l, _)| *l)
            .collect()
    }

    /// Moves `length` on to its next token, exhausting it past the end.
    fn advance(&mut self, length: Length, token: &str, token_count: usize) -> bool {
        self.candidate_positions.remove(token);
        let Some(cursor) = self.cursors.get_mut(&length) else {
            return false;
        };
        cursor.next_token += 1;
        if cursor.next_token >= token_count {
            cursor.status = LengthStatus::Exhausted;
            return true;
        }
        false
    }
}

/// What happened to one token in one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Bound to the candidate; `added` holds the pairs new to the mapping.
    Accepted { added: Vec<(Symbol, Symbol)> },
    /// The candidate conflicts with the mapping; the token is retried later.
    Rejected(MappingConflict),
    /// No unconsumed word of this Length is left at the token's position.
    NoCandidateAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub length: Length,
    pub token: String,
    pub candidate: Option<String>,
    pub vocabulary: Option<String>,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Accepted { .. })
    }
}

/// Everything one round did, in the order it was done.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub round: usize,
    pub attempts: Vec<Attempt>,
    /// Lengths that became exhausted during this round.
    pub exhausted: Vec<Length>,
}

impl RoundReport {
    pub fn accepted(&self) -> usize {
        self.attempts.iter().filter(|a| a.is_accepted()).count()
    }

    pub fn added_pairs(&self) -> usize {
        self.attempts
            .iter()
            .map(|a| match &a.outcome {
                AttemptOutcome::Accepted { added } => added.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Drives rounds over a fixed set of grouped tokens.
///
/// Mapping and consumed words are owned by the caller and lent to each
/// [`RoundScheduler::step`], so they can be checkpointed between rounds.
pub struct RoundScheduler<'a> {
    groups: &'a LengthGroups,
    index: &'a ReferenceIndex,
    state: RoundState,
}

impl<'a> RoundScheduler<'a> {
    pub fn new(groups: &'a LengthGroups, index: &'a ReferenceIndex) -> Self {
        Self::with_state(groups, index, RoundState::new(groups))
    }

    pub fn with_state(groups: &'a LengthGroups, index: &'a ReferenceIndex, state: RoundState) -> Self {
        debug_assert_eq!(groups.policy(), index.policy());
        Self {
            groups,
            index,
            state,
        }
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn into_state(self) -> RoundState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// Upper bound on the rounds a fresh run can take: per Length, every
    /// token may try every same-length candidate once, plus one final
    /// no-candidate step.
    pub fn round_bound(&self) -> usize {
        self.groups
            .iter()
            .map(|(length, tokens)| tokens.len() * (self.index.count(length) + 1))
            .sum()
    }

    /// Runs one round. Returns `None` once every Length is exhausted.
    pub fn step(
        &mut self,
        mapping: &mut MappingStore,
        consumed: &mut ConsumedWords,
    ) -> Option<RoundReport> {
        if self.is_finished() {
            return None;
        }
        self.state.round += 1;
        let mut report = RoundReport {
            round: self.state.round,
            ..RoundReport::default()
        };

        let groups = self.groups;
        for length in self.state.active_lengths() {
            let tokens = groups.tokens(length);
            let idx = self.state.next_token(length).unwrap_or(0);
            let Some(token) = tokens.get(idx) else {
                if let Some(cursor) = self.state.cursors.get_mut(&length) {
                    cursor.status = LengthStatus::Exhausted;
                }
                report.exhausted.push(length);
                continue;
            };

            let attempt = self.attempt(length, token, mapping, consumed);
            trace!("round {} length {}: {:?}", report.round, length, attempt);

            let move_on = !matches!(attempt.outcome, AttemptOutcome::Rejected(_));
            if move_on {
                if self.state.advance(length, token, tokens.len()) {
                    report.exhausted.push(length);
                }
            } else {
                *self
                    .state
                    .candidate_positions
                    .entry(token.clone())
                    .or_insert(0) += 1;
            }
            report.attempts.push(attempt);
        }

        debug!(
            "Round {}: {} attempts, {} accepted, {} new pairs",
            report.round,
            report.attempts.len(),
            report.accepted(),
            report.added_pairs()
        );
        Some(report)
    }

    fn attempt(
        &self,
        length: Length,
        token: &str,
        mapping: &mut MappingStore,
        consumed: &mut ConsumedWords,
    ) -> Attempt {
        let position = self.state.candidate_position(token);
        let mut attempt = Attempt {
            length,
            token: token.to_string(),
            candidate: None,
            vocabulary: None,
            outcome: AttemptOutcome::NoCandidateAvailable,
        };

        let Some(candidate) = self.index.candidate_at(length, position, consumed) else {
            return attempt;
        };
        attempt.candidate = Some(candidate.word.text.clone());
        attempt.vocabulary = Some(candidate.vocabulary.to_string());

        let symbols = self.groups.policy().cipher_symbols(token);
        attempt.outcome = match mapping.commit(&symbols, candidate.symbols) {
            Ok(added) => {
                consumed.consume(&candidate.word.text);
                AttemptOutcome::Accepted { added }
            }
            Err(conflict) => AttemptOutcome::Rejected(conflict),
        };
        attempt
    }

    /// Steps until every Length is exhausted.
    pub fn run_to_exhaustion(
        &mut self,
        mapping: &mut MappingStore,
        consumed: &mut ConsumedWords,
    ) -> Vec<RoundReport> {
        std::iter::from_fn(|| self.step(mapping, consumed)).collect()
    }
}
