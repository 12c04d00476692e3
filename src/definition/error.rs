//! Errors raised while compiling or querying a definition.

use thiserror::Error;

/// A malformed, ambiguous, or inconsistent definition.
///
/// These are raised while compiling and are never recovered from: a machine
/// cannot be built from a definition that fails.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("definition could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("definition must be an object")]
    NotAnObject,

    #[error("definition requires an \"events\" property")]
    MissingEvents,

    #[error("\"events\" must be an object")]
    InvalidEvents,

    #[error("\"states\" must be an object if passed")]
    InvalidStates,

    #[error("definition requires at least one event")]
    NoEvents,

    #[error("event \"{event}\" must be an object")]
    InvalidEvent { event: String },

    #[error("event \"{event}\" must declare \"transition\" or \"transitions\"")]
    MissingTransitions { event: String },

    #[error("event \"{event}\" declares both \"transition\" and \"transitions\"")]
    ConflictingTransitionKeys { event: String },

    #[error("event \"{event}\" has no transitions, it needs at least one")]
    EmptyEvent { event: String },

    #[error("transition definitions for event \"{event}\" must be objects")]
    InvalidTransition { event: String },

    #[error(
        "only one from-state to to-state mapping is allowed per object, event \"{event}\" declares {count}"
    )]
    MultipleMappings { event: String, count: usize },

    #[error("a transition for event \"{event}\" does not declare a from-state and to-state")]
    MissingMapping { event: String },

    #[error("property \"{key}\" of a transition for event \"{event}\" {expected}")]
    InvalidProperty {
        event: String,
        key: String,
        expected: &'static str,
    },

    #[error("\"$same\" cannot be used as a from-state (event \"{event}\")")]
    SameAsFromState { event: String },

    #[error(
        "there is more than one unguarded transition for event \"{event}\" in state \"{state}\""
    )]
    Ambiguous { event: String, state: String },

    #[error("\"{state}\" is not a defined state")]
    UndefinedState { state: String },

    #[error("\"{state}\" is not used by any transition")]
    UnusedState { state: String },

    #[error("state property \"{key}\" {expected}")]
    InvalidStateProperty { key: String, expected: &'static str },

    #[error("lifecycle hook {phase} is declared for unknown state \"{state}\"")]
    UnknownHookState { state: String, phase: String },

    #[error("{phase} is not a state lifecycle hook, use willEnter, didEnter, willExit or didExit")]
    InvalidHookPhase { phase: String },
}

/// A query named a state or event the definition does not know.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("state \"{0}\" is not defined")]
    UnknownState(String),

    #[error("event \"{0}\" is not defined")]
    UnknownEvent(String),

    #[error("there are no states or substates defined matching \"{0}\"")]
    NoStatesMatching(String),
}
