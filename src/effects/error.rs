//! Errors raised while dispatching events and performing transitions.

use crate::definition::{LookupError, Phase};
use serde_json::{json, Value};
use thiserror::Error;

/// A guard named by a transition is not defined on the target.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("expected guard \"{guard}\" on target \"{target}\" to be defined")]
    Undefined { guard: String, target: String },
}

/// Synchronous failure of `send` or `transition_for`.
///
/// Raised before any callback runs, so the machine's state is untouched.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("unknown state event \"{event}\" try one of [{known}]")]
    UnknownEvent { event: String, known: String },

    #[error("no transition is defined for event \"{event}\" in state \"{state}\"")]
    NoTransitionDefined { event: String, state: String },

    #[error("no unguarded transition was resolved for event \"{event}\" in state \"{state}\"")]
    NoTransitionResolved { event: String, state: String },

    #[error(
        "unable to transition out of \"{from}\" state to \"{to}\" state while transitions are active: [{active}]"
    )]
    TransitionInProgress {
        from: String,
        to: String,
        active: String,
    },

    #[error(
        "event \"{event}\" was resolved from state \"{resolved_from}\" but the machine moved to \"{current}\""
    )]
    StateChanged {
        event: String,
        resolved_from: String,
        current: String,
    },

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// A named callback is not a callable member of the target.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CallbackLookupError {
    #[error("callback \"{callback}\" on target \"{target}\" is not defined, it is named by the {phase} hook of state \"{state}\"")]
    MissingStateCallback {
        callback: String,
        target: String,
        state: String,
        phase: Phase,
    },

    #[error("callback \"{callback}\" on target \"{target}\" is not defined, it is named by the {phase} list of transition {transition}")]
    MissingTransitionCallback {
        callback: String,
        target: String,
        transition: String,
        phase: Phase,
    },
}

/// Why a performed transition rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Rejection {
    /// A callback failed; carries the value it failed with.
    #[error("callback rejected with {0}")]
    Callback(Value),

    /// A phase could not gather its callbacks.
    #[error(transparent)]
    Lookup(#[from] CallbackLookupError),
}

impl Rejection {
    /// The rejection as a value, for the payload of the automatic `error`
    /// event.
    pub fn to_value(&self) -> Value {
        match self {
            Rejection::Callback(reason) => reason.clone(),
            Rejection::Lookup(err) => json!(err.to_string()),
        }
    }

    /// The callback's failure value, if a callback failed.
    pub fn reason(&self) -> Option<&Value> {
        match self {
            Rejection::Callback(reason) => Some(reason),
            Rejection::Lookup(_) => None,
        }
    }
}
