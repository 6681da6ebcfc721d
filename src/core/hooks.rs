// File: src/core/hooks.rs
use crate::core::mapping::MappingStore;
use crate::core::scheduler::RoundReport;
use crate::core::sweep::ThresholdReport;
use std::ops::ControlFlow;

/// The point in a run at which a hook is invoked.
#[derive(Debug, Clone, Copy)]
pub enum Boundary<'a> {
    Round(&'a RoundReport),
    Threshold(&'a ThresholdReport),
}

/// Called synchronously after every round and every threshold pass, once the
/// boundary checkpoint has been written. Returning `Break` ends the run.
pub trait BoundaryHook {
    fn at_boundary(&mut self, boundary: Boundary<'_>, mapping: &MappingStore) -> ControlFlow<()>;
}

/// The default hook: never pauses, never stops.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

impl BoundaryHook for NoPause {
    fn at_boundary(&mut self, _: Boundary<'_>, _: &MappingStore) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

impl<F> BoundaryHook for F
where
    F: FnMut(Boundary<'_>, &MappingStore) -> ControlFlow<()>,
{
    fn at_boundary(&mut self, boundary: Boundary<'_>, mapping: &MappingStore) -> ControlFlow<()> {
        self(boundary, mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_hooks() {
        let report = RoundReport::default();
        let mapping = MappingStore::new();
        let mut calls = 0;
        let mut hook = |_: Boundary<'_>, _: &MappingStore| {
            calls += 1;
            if calls > 1 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        assert!(hook.at_boundary(Boundary::Round(&report), &mapping).is_continue());
        assert!(hook.at_boundary(Boundary::Round(&report), &mapping).is_break());
        assert!(NoPause.at_boundary(Boundary::Round(&report), &mapping).is_continue());
    }
}
