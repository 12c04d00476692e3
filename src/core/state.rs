//! Namespaced state names and the per-state index kept by a definition.
//!
//! State names are dotted paths. `active.running` lives in the `active`
//! namespace, so a machine in `active.running` is "in" both `active` and
//! `active.running`.

use crate::definition::TransitionRecord;
use serde::Serialize;
use std::sync::Arc;

/// Reserved from-state that expands to every known state.
pub const ALL_STATES: &str = "$all";

/// Reserved to-state that resolves to the record's own from-state.
pub const SAME_STATE: &str = "$same";

/// Initial state used when a definition does not name one.
pub const DEFAULT_INITIAL_STATE: &str = "initialized";

/// Terminal state targeted by the default `error` event.
pub const FAILED_STATE: &str = "failed";

/// A compiled state with its outgoing and incoming transition records.
#[derive(Clone, Debug, Serialize)]
pub struct State {
    pub name: String,
    #[serde(rename = "exitTransitions")]
    pub exit_transitions: Vec<Arc<TransitionRecord>>,
    #[serde(rename = "enterTransitions")]
    pub enter_transitions: Vec<Arc<TransitionRecord>>,
}

impl State {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exit_transitions: Vec::new(),
            enter_transitions: Vec::new(),
        }
    }

    /// True if this state is `prefix` or nested somewhere under it.
    pub fn is_within(&self, prefix: &str) -> bool {
        is_within(&self.name, prefix)
    }
}

/// True if `state` equals `prefix` or is nested under it.
///
/// ```rust
/// use statewise::core::is_within;
///
/// assert!(is_within("active.running", "active"));
/// assert!(is_within("active.running", "active.running"));
/// assert!(!is_within("activeish", "active"));
/// ```
pub fn is_within(state: &str, prefix: &str) -> bool {
    state == prefix
        || (state.len() > prefix.len()
            && state.starts_with(prefix)
            && state.as_bytes()[prefix.len()] == b'.')
}

/// Every proper namespace prefix of a dotted state name, outermost first.
///
/// `a.b.c` yields `a` and `a.b`; a name without dots yields nothing.
pub fn namespaces_of(state: &str) -> Vec<&str> {
    state
        .match_indices('.')
        .map(|(idx, _)| &state[..idx])
        .filter(|prefix| !prefix.is_empty())
        .collect()
}
