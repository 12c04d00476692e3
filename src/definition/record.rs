//! Canonical transition records produced by compilation.

use serde::Serialize;
use std::fmt;

/// One of the six callback stages of a performed transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    BeforeEvent,
    WillExit,
    WillEnter,
    DidExit,
    DidEnter,
    AfterEvent,
}

impl Phase {
    /// Phases in the order a transition performs them.
    pub const ALL: [Phase; 6] = [
        Phase::BeforeEvent,
        Phase::WillExit,
        Phase::WillEnter,
        Phase::DidExit,
        Phase::DidEnter,
        Phase::AfterEvent,
    ];

    /// Phases a state lifecycle hook may declare.
    pub const STATE_HOOKS: [Phase; 4] = [
        Phase::WillEnter,
        Phase::DidEnter,
        Phase::WillExit,
        Phase::DidExit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::BeforeEvent => "beforeEvent",
            Phase::WillExit => "willExit",
            Phase::WillEnter => "willEnter",
            Phase::DidExit => "didExit",
            Phase::DidEnter => "didEnter",
            Phase::AfterEvent => "afterEvent",
        }
    }

    /// The key used for this phase in a raw definition.
    pub fn spec_key(&self) -> &'static str {
        match self {
            Phase::BeforeEvent => "before",
            Phase::AfterEvent => "after",
            other => other.as_str(),
        }
    }

    /// Whether the phase runs hooks of the state being entered (`Some(true)`),
    /// the state being left (`Some(false)`), or no state at all.
    pub fn enters(&self) -> Option<bool> {
        match self {
            Phase::WillEnter | Phase::DidEnter => Some(true),
            Phase::WillExit | Phase::DidExit => Some(false),
            Phase::BeforeEvent | Phase::AfterEvent => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single compiled transition: one event, one source, one destination.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRecord {
    pub event: String,
    pub from_state: String,
    pub to_state: String,
    pub is_guarded: bool,
    pub do_if: Option<String>,
    pub do_unless: Option<String>,
    pub before_event: Vec<String>,
    pub will_exit: Vec<String>,
    pub will_enter: Vec<String>,
    pub did_exit: Vec<String>,
    pub did_enter: Vec<String>,
    pub after_event: Vec<String>,
}

impl TransitionRecord {
    /// Callback names declared on this record for a phase.
    pub fn callbacks(&self, phase: Phase) -> &[String] {
        match phase {
            Phase::BeforeEvent => &self.before_event,
            Phase::WillExit => &self.will_exit,
            Phase::WillEnter => &self.will_enter,
            Phase::DidExit => &self.did_exit,
            Phase::DidEnter => &self.did_enter,
            Phase::AfterEvent => &self.after_event,
        }
    }

    pub(crate) fn callbacks_mut(&mut self, phase: Phase) -> &mut Vec<String> {
        match phase {
            Phase::BeforeEvent => &mut self.before_event,
            Phase::WillExit => &mut self.will_exit,
            Phase::WillEnter => &mut self.will_enter,
            Phase::DidExit => &mut self.did_exit,
            Phase::DidEnter => &mut self.did_enter,
            Phase::AfterEvent => &mut self.after_event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_run_in_fixed_order() {
        let names: Vec<_> = Phase::ALL.iter().map(Phase::as_str).collect();
        assert_eq!(
            names,
            vec!["beforeEvent", "willExit", "willEnter", "didExit", "didEnter", "afterEvent"]
        );
    }

    #[test]
    fn event_phases_use_short_spec_keys() {
        assert_eq!(Phase::BeforeEvent.spec_key(), "before");
        assert_eq!(Phase::AfterEvent.spec_key(), "after");
        assert_eq!(Phase::DidEnter.spec_key(), "didEnter");
    }

    #[test]
    fn record_serializes_with_canonical_names() {
        let record = TransitionRecord {
            event: "run".to_string(),
            from_state: "off".to_string(),
            to_state: "on".to_string(),
            is_guarded: true,
            do_if: Some("hasPower".to_string()),
            ..TransitionRecord::default()
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fromState"], "off");
        assert_eq!(json["doIf"], "hasPower");
        assert_eq!(json["beforeEvent"], serde_json::json!([]));
    }
}
