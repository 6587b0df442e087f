//! The injector's state vocabulary (spec.md §4.7).

use std::fmt;

/// The states [`crate::injector::inject`] passes through while
/// committing one batch. Each state either enqueues database work and
/// suspends at an `.await`, or (once its work completes) advances to
/// the next state. On failure, [`crate::injector::InjectorOutcome::state`]
/// carries whichever of these states was in progress when the failure
/// happened (not a blanket `AwaitingCompletion`), before the machine
/// transitions to `AwaitingCompletion` internally to await the rollback
/// (spec.md §4.7's failure semantics).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InjectorState {
    Inactive,
    CreatingDependencies,
    InsertingBodyparts,
    SelectingMessageIds,
    SelectingUids,
    InsertingMessages,
    AwaitingCompletion,
    Done,
}

impl fmt::Display for InjectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InjectorState::Inactive => "Inactive",
            InjectorState::CreatingDependencies => "CreatingDependencies",
            InjectorState::InsertingBodyparts => "InsertingBodyparts",
            InjectorState::SelectingMessageIds => "SelectingMessageIds",
            InjectorState::SelectingUids => "SelectingUids",
            InjectorState::InsertingMessages => "InsertingMessages",
            InjectorState::AwaitingCompletion => "AwaitingCompletion",
            InjectorState::Done => "Done",
        };
        f.write_str(name)
    }
}
