//! The definition compiler.
//!
//! A definition is the canonical, immutable transition table compiled from a
//! raw states/events description. It never invokes callbacks; it only answers
//! questions about states, events and the records connecting them.
//!
//! # Schema
//!
//! ```json
//! {
//!   "states": {
//!     "initialState": "off",
//!     "knownStates": ["off", "on"],
//!     "on": { "didEnter": "lightUp" }
//!   },
//!   "events": {
//!     "run": {
//!       "transitions": [
//!         { "on": "$same" },
//!         { "off": "on", "unless": "isWarm" },
//!         { "from": ["off"], "to": "on", "guard": "hasPower", "after": "report" }
//!       ]
//!     }
//!   }
//! }
//! ```

mod compile;
pub mod error;
mod record;

pub use error::{DefinitionError, LookupError};
pub use record::{Phase, TransitionRecord};

use crate::core::{is_within, Callback, CallbackRef, State};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled event and its records in resolution order.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub name: String,
    pub transitions: Vec<Arc<TransitionRecord>>,
}

/// A generated `isIn<State>` accessor: its property name and the state or
/// namespace prefix it tests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateAccessor {
    pub name: String,
    pub prefix: String,
}

/// A callback attached directly to a state's lifecycle hook.
#[derive(Clone, Debug)]
pub struct InlineHook {
    pub state: String,
    pub phase: Phase,
    pub callback: Callback,
}

/// Lifecycle hooks declared on one state.
#[derive(Clone, Debug, Default)]
pub struct StateHooks {
    hooks: HashMap<Phase, Vec<CallbackRef>>,
}

impl StateHooks {
    pub fn get(&self, phase: Phase) -> &[CallbackRef] {
        self.hooks.get(&phase).map(Vec::as_slice).unwrap_or(&[])
    }

    fn push(&mut self, phase: Phase, callback: CallbackRef) {
        self.hooks.entry(phase).or_default().push(callback);
    }
}

/// Canonical transition table plus derived indexes.
///
/// # Example
///
/// ```rust
/// use statewise::definition::Definition;
/// use serde_json::json;
///
/// let def = Definition::compile(&json!({
///     "events": {
///         "one": { "transitions": { "initialized": "a" } },
///         "two": { "transitions": { "a": "b" } }
///     }
/// }))
/// .unwrap();
///
/// assert_eq!(def.initial_state(), "initialized");
/// assert_eq!(def.state_names(), ["initialized", "a", "b"]);
/// assert_eq!(def.transitions_for("one", Some("initialized")).len(), 1);
/// assert!(def.transitions_for("one", Some("b")).is_empty());
/// ```
#[derive(Clone, Debug)]
pub struct Definition {
    initial_state: String,
    state_names: Vec<String>,
    event_names: Vec<String>,
    states: Vec<State>,
    events: Vec<Event>,
    state_namespaces: Vec<String>,
    accessors: Vec<StateAccessor>,
    hooks: HashMap<String, StateHooks>,
}

impl Definition {
    /// Compile a raw definition.
    pub fn compile(spec: &Value) -> Result<Self, DefinitionError> {
        compile::compile(spec, Vec::new())
    }

    /// Compile a raw definition, attaching inline lifecycle callbacks.
    pub fn compile_with_hooks(
        spec: &Value,
        hooks: Vec<InlineHook>,
    ) -> Result<Self, DefinitionError> {
        compile::compile(spec, hooks)
    }

    /// Parse JSON text and compile it.
    pub fn from_json_str(text: &str) -> Result<Self, DefinitionError> {
        let spec: Value = serde_json::from_str(text)?;
        Self::compile(&spec)
    }

    pub fn initial_state(&self) -> &str {
        &self.initial_state
    }

    pub fn state_names(&self) -> &[String] {
        &self.state_names
    }

    pub fn event_names(&self) -> &[String] {
        &self.event_names
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Distinct dotted prefixes across all state names.
    pub fn state_namespaces(&self) -> &[String] {
        &self.state_namespaces
    }

    /// One accessor per namespace and per state, namespaces first.
    pub fn accessors(&self) -> &[StateAccessor] {
        &self.accessors
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.state_names.iter().any(|s| s == name)
    }

    pub fn has_event(&self, name: &str) -> bool {
        self.event_names.iter().any(|e| e == name)
    }

    /// Position of a state in [`state_names`](Self::state_names).
    pub fn state_index(&self, name: &str) -> Option<usize> {
        self.state_names.iter().position(|s| s == name)
    }

    /// Records registered for an event, optionally limited to one from-state,
    /// in resolution order. Unknown events yield nothing.
    pub fn transitions_for(&self, event: &str, from_state: Option<&str>) -> Vec<Arc<TransitionRecord>> {
        self.events
            .iter()
            .find(|e| e.name == event)
            .map(|e| {
                e.transitions
                    .iter()
                    .filter(|t| from_state.is_none_or(|from| t.from_state == from))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn lookup_state(&self, name: &str) -> Result<&State, LookupError> {
        self.states
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| LookupError::UnknownState(name.to_string()))
    }

    pub fn lookup_event(&self, name: &str) -> Result<&Event, LookupError> {
        self.events
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| LookupError::UnknownEvent(name.to_string()))
    }

    /// Every state equal to or nested under `prefix`.
    pub fn lookup_states(&self, prefix: &str) -> Result<Vec<&State>, LookupError> {
        let matching: Vec<&State> = self.states.iter().filter(|s| s.is_within(prefix)).collect();
        if matching.is_empty() {
            return Err(LookupError::NoStatesMatching(prefix.to_string()));
        }
        Ok(matching)
    }

    /// True if `state` is `prefix` or nested under it. Fails if `prefix`
    /// matches no known state or namespace.
    pub fn state_matches(&self, state: &str, prefix: &str) -> Result<bool, LookupError> {
        self.lookup_states(prefix)?;
        Ok(is_within(state, prefix))
    }

    /// Lifecycle hooks declared on a state for one phase.
    pub fn state_hooks(&self, state: &str, phase: Phase) -> &[CallbackRef] {
        self.hooks.get(state).map(|h| h.get(phase)).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build(transitions: Value) -> Vec<Arc<TransitionRecord>> {
        Definition::compile(&json!({
            "states": { "initialState": "a" },
            "events": { "run": { "transitions": transitions } }
        }))
        .unwrap()
        .transitions_for("run", None)
    }

    #[test]
    fn requires_an_object() {
        let result = Definition::compile(&json!(true));
        assert!(matches!(result, Err(DefinitionError::NotAnObject)));
    }

    #[test]
    fn requires_events() {
        let result = Definition::compile(&json!({ "states": {} }));
        assert!(matches!(result, Err(DefinitionError::MissingEvents)));
    }

    #[test]
    fn requires_events_to_be_an_object() {
        let result = Definition::compile(&json!({ "events": true }));
        assert!(matches!(result, Err(DefinitionError::InvalidEvents)));
    }

    #[test]
    fn requires_states_to_be_an_object_if_passed() {
        let result = Definition::compile(&json!({ "events": {}, "states": true }));
        assert!(matches!(result, Err(DefinitionError::InvalidStates)));
    }

    #[test]
    fn requires_at_least_one_event() {
        let err = Definition::compile(&json!({ "events": {} })).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn defaults_initial_state() {
        let def = Definition::compile(&json!({
            "events": { "poke": { "transitions": [{ "initialized": "annoyed" }] } }
        }))
        .unwrap();
        assert_eq!(def.initial_state(), "initialized");
    }

    #[test]
    fn rejects_unlisted_states() {
        let err = Definition::compile(&json!({
            "states": { "knownStates": ["initialized", "farting"] },
            "events": {
                "fart": { "transitions": { "initialized": "farting" } },
                "shart": { "transitions": { "farting": "soiled" } }
            }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("not a defined state"));
    }

    #[test]
    fn rejects_unused_listed_states() {
        let err = Definition::compile(&json!({
            "states": {
                "initialState": "wiggling",
                "explicitStates": ["wiggling", "wobbling", "farting"]
            },
            "events": { "wiggle": { "transitions": [{ "wiggling": "wobbling" }] } }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("is not used"));
    }

    #[test]
    fn aliases_transition_to_transitions() {
        let def = Definition::compile(&json!({
            "events": { "amaze": { "transition": { "initialized": "x" } } }
        }))
        .unwrap();
        assert_eq!(def.state_names(), ["initialized", "x"]);
    }

    #[test]
    fn rejects_both_transition_keys() {
        let result = Definition::compile(&json!({
            "events": {
                "amaze": {
                    "transition": { "initialized": "x" },
                    "transitions": [{ "x": "y" }]
                }
            }
        }));
        assert!(matches!(
            result,
            Err(DefinitionError::ConflictingTransitionKeys { .. })
        ));
    }

    #[test]
    fn rejects_events_without_transitions() {
        let result = Definition::compile(&json!({
            "events": { "nothing": { "transitions": [] } }
        }));
        assert!(matches!(result, Err(DefinitionError::EmptyEvent { .. })));
    }

    #[test]
    fn expands_all_to_every_known_state() {
        let def = Definition::compile(&json!({
            "states": { "initialState": "a" },
            "events": {
                "reset": { "transitions": { "$all": "a" } },
                "fobble": { "transitions": { "a": "x" } },
                "doggle": { "transitions": { "a": "y" } },
                "wobble": { "transitions": { "a": "z" } }
            }
        }))
        .unwrap();

        for from in ["a", "x", "y", "z"] {
            let transitions = def.transitions_for("reset", Some(from));
            assert_eq!(transitions.len(), 1);
            assert_eq!(transitions[0].from_state, from);
        }
    }

    #[test]
    fn replaces_same_with_from_state() {
        let def = Definition::compile(&json!({
            "events": {
                "toA": { "transitions": [{ "initialized": "a" }, { "a": "$same" }] }
            }
        }))
        .unwrap();

        let transitions = def.transitions_for("toA", Some("a"));
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].to_state, "a");
    }

    #[test]
    fn allows_multiple_guarded_transitions_from_one_state() {
        let def = Definition::compile(&json!({
            "states": { "initialState": "off" },
            "events": {
                "run": {
                    "transitions": [
                        { "on": "$same" },
                        { "off": "on", "unless": "isWarm" },
                        { "off": "on", "guard": "hasPower" }
                    ]
                }
            }
        }))
        .unwrap();

        let transitions = def.transitions_for("run", Some("off"));
        assert_eq!(transitions.len(), 2);
        assert!(transitions.iter().all(|t| t.is_guarded));
        assert_eq!(transitions[0].do_unless.as_deref(), Some("isWarm"));
        assert_eq!(transitions[1].do_if.as_deref(), Some("hasPower"));
    }

    #[test]
    fn rejects_multiple_mappings_per_object() {
        let err = Definition::compile(&json!({
            "events": {
                "pedal": {
                    "transitions": {
                        "initialized": "mounting",
                        "mounting": "moving.slowly",
                        "moving.slowly": "moving.quickly",
                        "moving.quickly": "$same"
                    }
                }
            }
        }))
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("only one"));
        assert!(message.contains("per object"));
    }

    #[test]
    fn rejects_mixed_explicit_and_implicit_mappings() {
        let result = Definition::compile(&json!({
            "events": {
                "go": { "transition": { "from": "initialized", "to": "a", "a": "b" } }
            }
        }));
        assert!(matches!(
            result,
            Err(DefinitionError::MultipleMappings { count: 2, .. })
        ));
    }

    #[test]
    fn rejects_duplicate_unguarded_transitions() {
        let explicit = Definition::compile(&json!({
            "states": { "initialState": "off" },
            "events": {
                "run": { "transitions": [{ "on": "$same" }, { "off": "on" }, { "off": "on" }] }
            }
        }))
        .unwrap_err();
        assert!(explicit.to_string().contains("more than one"));

        let via_all = Definition::compile(&json!({
            "states": { "initialState": "off" },
            "events": {
                "run": { "transitions": [{ "on": "$same" }, { "off": "on" }, { "$all": "on" }] }
            }
        }))
        .unwrap_err();
        assert!(via_all.to_string().contains("more than one"));
    }

    #[test]
    fn normalizes_callbacks_to_lists() {
        let t = build(json!([
            { "a": "b", "before": "doTing" },
            { "d": "e", "willEnter": "doTing" },
            { "f": "g", "didEnter": "doTing" },
            { "h": "i", "willExit": "doTing" },
            { "j": "k", "didExit": "doTing" },
            { "b": "c", "after": ["doTing", "doMore"] }
        ]));

        assert_eq!(t[0].before_event, ["doTing"]);
        assert_eq!(t[1].will_enter, ["doTing"]);
        assert_eq!(t[2].did_enter, ["doTing"]);
        assert_eq!(t[3].will_exit, ["doTing"]);
        assert_eq!(t[4].did_exit, ["doTing"]);
        assert_eq!(t[5].after_event, ["doTing", "doMore"]);
    }

    #[test]
    fn passes_guards_through() {
        let t = build(json!([
            { "a": "b", "guard": "hasTing" },
            { "b": "c", "unless": "hasTing" },
            { "c": "d", "doIf": "other" }
        ]));

        assert_eq!(t[0].do_if.as_deref(), Some("hasTing"));
        assert_eq!(t[1].do_unless.as_deref(), Some("hasTing"));
        assert_eq!(t[2].do_if.as_deref(), Some("other"));
        assert!(t.iter().all(|r| r.is_guarded));
    }

    #[test]
    fn accepts_named_from_and_to() {
        let t = build(json!({ "from": "a", "to": "b" }));
        assert_eq!(t[0].from_state, "a");
        assert_eq!(t[0].to_state, "b");
    }

    #[test]
    fn fans_out_multiple_from_states_in_order() {
        let t = build(json!({ "from": ["a", "b"], "to": "c" }));
        assert_eq!(t.len(), 2);
        assert_eq!((t[0].from_state.as_str(), t[0].to_state.as_str()), ("a", "c"));
        assert_eq!((t[1].from_state.as_str(), t[1].to_state.as_str()), ("b", "c"));
    }

    #[test]
    fn event_level_declarations_apply_to_each_record() {
        let def = Definition::compile(&json!({
            "states": { "initialState": "a" },
            "events": {
                "run": {
                    "guard": "ready",
                    "before": "announce",
                    "transitions": [
                        { "a": "b", "before": "prepare" },
                        { "b": "c", "unless": "tired" }
                    ]
                }
            }
        }))
        .unwrap();

        let t = def.transitions_for("run", None);
        assert_eq!(t[0].before_event, ["announce", "prepare"]);
        assert_eq!(t[0].do_if.as_deref(), Some("ready"));
        assert_eq!(t[1].do_if, None);
        assert_eq!(t[1].do_unless.as_deref(), Some("tired"));
    }

    #[test]
    fn provides_public_indexes() {
        let def = Definition::compile(&json!({
            "events": {
                "one": { "transitions": { "initialized": "a" } },
                "two": { "transitions": { "a": "b" } }
            }
        }))
        .unwrap();

        assert_eq!(def.event_names(), ["one", "two"]);
        assert_eq!(def.events().len(), 2);
        assert_eq!(def.state_names(), ["initialized", "a", "b"]);
        assert_eq!(def.states().len(), 3);
        assert_eq!(def.lookup_state("a").unwrap().name, "a");
        assert_eq!(def.lookup_event("one").unwrap().name, "one");
        assert_eq!(def.transitions_for("one", None).len(), 1);
        assert!(def.lookup_state("zzz").is_err());
        assert!(def.lookup_event("zzz").is_err());

        let a = def.lookup_state("a").unwrap();
        assert_eq!(a.enter_transitions.len(), 1);
        assert_eq!(a.exit_transitions.len(), 1);
        assert_eq!(a.exit_transitions[0].to_state, "b");
    }

    #[test]
    fn derives_namespaces_and_accessors() {
        let def = Definition::compile(&json!({
            "states": { "initialState": "inactive" },
            "events": {
                "run": { "transitions": { "$all": "active.running" } },
                "walk": { "transitions": { "$all": "active.walking" } }
            }
        }))
        .unwrap();

        assert_eq!(def.state_namespaces(), ["active"]);
        let names: Vec<_> = def.accessors().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["isInActive", "isInInactive", "isInActiveRunning", "isInActiveWalking"]
        );
    }

    #[test]
    fn looks_up_states_by_prefix() {
        let def = Definition::compile(&json!({
            "events": {
                "run": { "transitions": { "initialized": "active.running" } },
                "walk": { "transitions": { "active.running": "active.walking" } }
            }
        }))
        .unwrap();

        assert_eq!(def.lookup_states("active").unwrap().len(), 2);
        let err = def.lookup_states("herp").unwrap_err();
        assert!(err.to_string().contains("no states or substates"));
        assert!(def.state_matches("active.running", "active").unwrap());
        assert!(!def.state_matches("initialized", "active").unwrap());
    }

    #[test]
    fn reads_named_state_hooks() {
        let def = Definition::compile(&json!({
            "states": {
                "initialState": "okay",
                "happy": { "didEnter": ["animateSmile"], "willExit": "frown" }
            },
            "events": {
                "cuddle": { "transition": { "okay": "happy" } }
            }
        }))
        .unwrap();

        assert_eq!(def.state_hooks("happy", Phase::DidEnter).len(), 1);
        assert_eq!(def.state_hooks("happy", Phase::WillExit).len(), 1);
        assert!(def.state_hooks("okay", Phase::DidEnter).is_empty());
    }

    #[test]
    fn rejects_hooks_on_unknown_states() {
        let result = Definition::compile(&json!({
            "states": { "ghost": { "didEnter": "boo" } },
            "events": { "go": { "transition": { "initialized": "a" } } }
        }));
        assert!(matches!(
            result,
            Err(DefinitionError::UnknownHookState { .. })
        ));
    }

    #[test]
    fn rejects_empty_hook_objects_on_unknown_states() {
        let result = Definition::compile(&json!({
            "states": { "ghost": {} },
            "events": { "go": { "transition": { "initialized": "a" } } }
        }));
        assert!(matches!(
            result,
            Err(DefinitionError::UnknownHookState { ref state, .. }) if state == "ghost"
        ));
    }

    #[test]
    fn rejects_misspelled_hook_keys() {
        let result = Definition::compile(&json!({
            "states": { "a": { "didEnter": "wave", "didEntr": "boo" } },
            "events": { "go": { "transition": { "initialized": "a" } } }
        }));
        match result {
            Err(DefinitionError::InvalidStateProperty { key, .. }) => assert_eq!(key, "a.didEntr"),
            other => panic!("expected InvalidStateProperty, got {other:?}"),
        }
    }

    #[test]
    fn rejects_inline_hooks_on_event_phases() {
        let result = Definition::compile_with_hooks(
            &json!({ "events": { "go": { "transition": { "initialized": "a" } } } }),
            vec![InlineHook {
                state: "a".to_string(),
                phase: Phase::BeforeEvent,
                callback: Callback::new(|_| ()),
            }],
        );
        assert!(matches!(
            result,
            Err(DefinitionError::InvalidHookPhase { .. })
        ));
    }

    #[test]
    fn parses_json_text() {
        let def = Definition::from_json_str(
            r#"{ "events": { "go": { "transition": { "initialized": "done" } } } }"#,
        )
        .unwrap();
        assert!(def.has_state("done"));
        assert!(def.has_event("go"));

        let err = Definition::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, DefinitionError::Parse(_)));
    }

    #[test]
    fn lookups_do_not_mutate() {
        let def = Definition::compile(&json!({
            "events": { "go": { "transition": { "initialized": "done" } } }
        }))
        .unwrap();

        let first = def.transitions_for("go", Some("initialized"));
        let second = def.transitions_for("go", Some("initialized"));
        assert_eq!(first, second);
        assert_eq!(def.transitions_for("go", None).len(), 1);
    }
}
