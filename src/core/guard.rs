//! Guard values that decide whether a guarded transition is eligible.
//!
//! A target exposes guards by name. A guard is either a stored value, coerced
//! to a boolean by dynamic truthiness, or a predicate evaluated against the
//! machine's current state.

use crate::utils::is_truthy;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// A named guard as read from a target.
///
/// # Example
///
/// ```rust
/// use statewise::core::Guard;
/// use serde_json::json;
///
/// let stored = Guard::value(json!(0));
/// assert!(!stored.check("off"));
///
/// let computed = Guard::new(|current: &str| current == "off");
/// assert!(computed.check("off"));
/// assert!(!computed.check("on"));
/// ```
#[derive(Clone)]
pub struct Guard {
    kind: GuardKind,
}

#[derive(Clone)]
enum GuardKind {
    Value(Value),
    Predicate(Predicate),
}

impl Guard {
    /// Create a guard from a predicate over the current state name.
    ///
    /// The predicate should be synchronous and free of heavy side effects;
    /// it may run several times while a single event is being resolved.
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Guard {
            kind: GuardKind::Predicate(Arc::new(predicate)),
        }
    }

    /// Create a guard backed by a stored value.
    pub fn value(value: impl Into<Value>) -> Self {
        Guard {
            kind: GuardKind::Value(value.into()),
        }
    }

    /// Evaluate the guard while the machine sits in `current_state`.
    pub fn check(&self, current_state: &str) -> bool {
        match &self.kind {
            GuardKind::Value(value) => is_truthy(value),
            GuardKind::Predicate(predicate) => predicate(current_state),
        }
    }
}

impl From<bool> for Guard {
    fn from(value: bool) -> Self {
        Guard::value(value)
    }
}

impl From<Value> for Guard {
    fn from(value: Value) -> Self {
        Guard::value(value)
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            GuardKind::Value(v) => f.debug_tuple("Guard::Value").field(v).finish(),
            GuardKind::Predicate(_) => f.write_str("Guard::Predicate(..)"),
        }
    }
}
