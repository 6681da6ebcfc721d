// File: src/core/engine.rs
use crate::config::SolverConfig;
use crate::core::grouper::LengthGroups;
use crate::core::hooks::{Boundary, BoundaryHook, NoPause};
use crate::core::mapping::MappingStore;
use crate::core::scheduler::{AttemptOutcome, RoundReport, RoundScheduler, RoundState};
use crate::core::sweep::{ThresholdReport, ThresholdSweep};
use crate::core::types::ConsumedWords;
use crate::core::vocabulary::ReferenceIndex;
use crate::persistence::{Checkpointer, Phase, Rearm, Session};
use log::{debug, info, log_enabled, warn, Level};
use std::ops::ControlFlow;
use std::rc::Rc;

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub rounds: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub no_candidate: usize,
    /// Threshold passes completed, in order.
    pub thresholds: Vec<u8>,
    pub checkpoint_failures: usize,
    pub stopped_early: bool,
}

impl SolveReport {
    fn absorb_round(&mut self, round: &RoundReport) {
        self.rounds += 1;
        for attempt in &round.attempts {
            match attempt.outcome {
                AttemptOutcome::Accepted { .. } => self.accepted += 1,
                AttemptOutcome::Rejected(_) => self.rejected += 1,
                AttemptOutcome::NoCandidateAvailable => self.no_candidate += 1,
            }
        }
    }

    fn absorb_threshold(&mut self, pass: &ThresholdReport) {
        self.thresholds.push(pass.threshold);
        self.accepted += pass.accepted();
        self.rejected += pass.rejections;
        self.no_candidate += pass.attempts.len() - pass.accepted();
    }
}

/// Owns the solver state for one run.
pub struct SolverEngine {
    pub index: Rc<ReferenceIndex>,
    pub mapping: MappingStore,
    pub consumed: ConsumedWords,
    config: SolverConfig,
    checkpointer: Option<Checkpointer>,
    hook: Box<dyn BoundaryHook>,
}

impl SolverEngine {
    pub fn new(index: ReferenceIndex, config: SolverConfig) -> Self {
        Self {
            index: Rc::new(index),
            mapping: MappingStore::new(),
            consumed: ConsumedWords::new(),
            config,
            checkpointer: None,
            hook: Box::new(NoPause),
        }
    }

    pub fn with_checkpoints(mut self, checkpointer: Checkpointer) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    pub fn with_hook(mut self, hook: impl BoundaryHook + 'static) -> Self {
        self.hook = Box::new(hook);
        self
    }

    /// Starts from a previously saved mapping and consumed-word set.
    pub fn with_state(mut self, mapping: MappingStore, consumed: ConsumedWords) -> Self {
        self.mapping = mapping;
        self.consumed = consumed;
        self
    }

    /// Runs the round scheduler to exhaustion, then the threshold sweep if
    /// one is configured and tokens remain unresolved.
    pub fn solve<S: AsRef<str>>(&mut self, tokens: &[S]) -> SolveReport {
        let groups = LengthGroups::build(tokens, self.config.policy);
        info!(
            "Solving {} tokens in {} length groups against {} reference words",
            groups.token_count(),
            groups.lengths().count(),
            self.index.len()
        );
        let start = Phase::Rounds(RoundState::new(&groups));
        self.run(&groups, start)
    }

    /// Continues a run from a saved session. `tokens` must be the same
    /// stream the session was started with.
    pub fn resume<S: AsRef<str>>(&mut self, tokens: &[S], session: Session) -> SolveReport {
        let groups = LengthGroups::build(tokens, self.config.policy);
        info!(
            "Resuming with {} pairs and {} consumed words",
            session.mapping.len(),
            session.consumed.len()
        );
        self.mapping = session.mapping;
        self.consumed = session.consumed;
        self.run(&groups, session.phase)
    }

    /// The current best decode of `text`.
    pub fn render(&self, text: &str) -> String {
        self.mapping.render(text)
    }

    pub fn session(&self, phase: Phase) -> Session {
        Session {
            mapping: self.mapping.clone(),
            consumed: self.consumed.clone(),
            phase,
        }
    }

    fn run(&mut self, groups: &LengthGroups, start: Phase) -> SolveReport {
        let mut report = SolveReport::default();
        let stream = snapshot_stream(groups);

        let (last_completed, pending) = match start {
            Phase::Rounds(state) => {
                let index = Rc::clone(&self.index);
                let mut scheduler = RoundScheduler::with_state(groups, &index, state);
                let flow = self.drive_rounds(&mut scheduler, &stream, &mut report, |state| {
                    match state {
                        Some(state) => Phase::Rounds(state),
                        None => Phase::Sweep {
                            last_completed: None,
                            rearm: None,
                        },
                    }
                });
                if flow.is_break() {
                    report.stopped_early = true;
                    return report;
                }
                info!(
                    "Round scheduler exhausted after {} rounds: {} pairs mapped",
                    report.rounds,
                    self.mapping.len()
                );
                (None, None)
            }
            Phase::Sweep {
                last_completed,
                rearm,
            } => (last_completed, rearm),
            Phase::Done => {
                info!("Session already complete");
                return report;
            }
        };

        if self.sweep(groups, &stream, last_completed, pending, &mut report).is_break() {
            report.stopped_early = true;
            return report;
        }

        self.checkpoint(Phase::Done, &mut report);
        info!(
            "Done: {} pairs mapped, {} words consumed",
            self.mapping.len(),
            self.consumed.len()
        );
        report
    }

    fn sweep(
        &mut self,
        groups: &LengthGroups,
        stream: &str,
        last_completed: Option<u8>,
        pending: Option<Rearm>,
        report: &mut SolveReport,
    ) -> ControlFlow<()> {
        let Some(sweep_config) = self.config.sweep.clone() else {
            return ControlFlow::Continue(());
        };

        if let Some(rearm) = pending {
            if let Some(threshold) = last_completed {
                if self.drive_rearm(rearm, threshold, stream, report).is_break() {
                    return ControlFlow::Break(());
                }
            }
        }

        if !ThresholdSweep::new(groups, &self.index).has_unresolved(&self.mapping) {
            info!("Every token resolved, skipping threshold sweep");
            return ControlFlow::Continue(());
        }

        let thresholds: Vec<u8> = sweep_config
            .thresholds()
            .into_iter()
            .filter(|t| last_completed.map_or(true, |done| *t < done))
            .collect();
        info!("Threshold sweep over {:?}", thresholds);

        for threshold in thresholds {
            let pass = ThresholdSweep::new(groups, &self.index).pass(
                threshold,
                &mut self.mapping,
                &mut self.consumed,
            );
            report.absorb_threshold(&pass);

            let rearm = (sweep_config.revisit_exhausted && pass.accepted() > 0)
                .then(|| Rearm::new(groups, &self.mapping))
                .filter(|rearm| !rearm.tokens.is_empty());
            let phase = Phase::Sweep {
                last_completed: Some(threshold),
                rearm: rearm.clone(),
            };
            if self.boundary(Boundary::Threshold(&pass), phase, stream, report).is_break() {
                return ControlFlow::Break(());
            }

            if let Some(rearm) = rearm {
                if self.drive_rearm(rearm, threshold, stream, report).is_break() {
                    return ControlFlow::Break(());
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Re-runs the scheduler over tokens a threshold pass left unresolved.
    fn drive_rearm(
        &mut self,
        rearm: Rearm,
        threshold: u8,
        stream: &str,
        report: &mut SolveReport,
    ) -> ControlFlow<()> {
        let groups = rearm.groups(self.config.policy);
        let tokens = rearm.tokens;
        debug!("Re-arming scheduler over {} unresolved tokens", tokens.len());

        let index = Rc::clone(&self.index);
        let mut scheduler = RoundScheduler::with_state(&groups, &index, rearm.state);
        self.drive_rounds(&mut scheduler, stream, report, |state| Phase::Sweep {
            last_completed: Some(threshold),
            rearm: state.map(|state| Rearm {
                tokens: tokens.clone(),
                state,
            }),
        })
    }

    /// Steps `scheduler` to exhaustion, checkpointing and calling the hook
    /// after every round. `phase_after` names the phase to record: it gets
    /// the scheduler state while rounds remain, `None` once finished.
    fn drive_rounds(
        &mut self,
        scheduler: &mut RoundScheduler<'_>,
        stream: &str,
        report: &mut SolveReport,
        phase_after: impl Fn(Option<RoundState>) -> Phase,
    ) -> ControlFlow<()> {
        while let Some(round) = scheduler.step(&mut self.mapping, &mut self.consumed) {
            report.absorb_round(&round);
            let state = (!scheduler.is_finished()).then(|| scheduler.state().clone());
            if self
                .boundary(Boundary::Round(&round), phase_after(state), stream, report)
                .is_break()
            {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Checkpoint, diagnostic snapshot, then the hook.
    fn boundary(
        &mut self,
        boundary: Boundary<'_>,
        phase: Phase,
        stream: &str,
        report: &mut SolveReport,
    ) -> ControlFlow<()> {
        self.checkpoint(phase, report);
        if log_enabled!(Level::Debug) {
            debug!("Snapshot: {}", self.mapping.render(stream));
        }
        self.hook.at_boundary(boundary, &self.mapping)
    }

    fn checkpoint(&self, phase: Phase, report: &mut SolveReport) {
        let Some(checkpointer) = &self.checkpointer else {
            return;
        };
        if let Err(e) = checkpointer.save(&self.session(phase)) {
            warn!("Checkpoint not saved, continuing in memory: {}", e);
            report.checkpoint_failures += 1;
        }
    }
}

fn snapshot_stream(groups: &LengthGroups) -> String {
    groups
        .iter()
        .flat_map(|(_, tokens)| tokens.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}
