//! Normalization of a raw, permissive definition into canonical records.
//!
//! Compilation runs in passes:
//! 1. read `states` (initial state, explicit allow-list, lifecycle hooks)
//! 2. read every event into raw records, one per from-state, in declaration order
//! 3. collect known states and check them against the allow-list
//! 4. expand `$all` and `$same`
//! 5. reject ambiguous (event, from-state) pairs
//! 6. build the per-state and per-event indexes

use super::error::DefinitionError;
use super::record::{Phase, TransitionRecord};
use super::{Definition, Event, InlineHook, StateAccessor, StateHooks};
use crate::core::{
    namespaces_of, CallbackRef, State, ALL_STATES, DEFAULT_INITIAL_STATE, SAME_STATE,
};
use crate::utils::{capital_camelize, get_first, own_properties_of, to_array};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const STATE_RESERVED_KEYS: [&str; 3] = ["initialState", "knownStates", "explicitStates"];

const TRANSITION_RESERVED_KEYS: [&str; 12] = [
    "from",
    "to",
    "guard",
    "doIf",
    "unless",
    "doUnless",
    "before",
    "after",
    "willEnter",
    "didEnter",
    "willExit",
    "didExit",
];

const IF_KEYS: [&str; 2] = ["guard", "doIf"];
const UNLESS_KEYS: [&str; 2] = ["unless", "doUnless"];

/// Guards and callbacks declared at event level, applied to each of the
/// event's transitions.
struct EventDefaults {
    do_if: Option<String>,
    do_unless: Option<String>,
    callbacks: Vec<(Phase, Vec<String>)>,
}

pub(super) fn compile(spec: &Value, inline: Vec<InlineHook>) -> Result<Definition, DefinitionError> {
    let root = spec.as_object().ok_or(DefinitionError::NotAnObject)?;

    let events = match root.get("events") {
        None | Some(Value::Null) => return Err(DefinitionError::MissingEvents),
        Some(Value::Object(events)) => events,
        Some(_) => return Err(DefinitionError::InvalidEvents),
    };

    let empty = Map::new();
    let states = match root.get("states") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(states)) => states,
        Some(_) => return Err(DefinitionError::InvalidStates),
    };

    if events.is_empty() {
        return Err(DefinitionError::NoEvents);
    }

    let initial_state = match states.get("initialState") {
        None | Some(Value::Null) => DEFAULT_INITIAL_STATE.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(_) => {
            return Err(DefinitionError::InvalidStateProperty {
                key: "initialState".to_string(),
                expected: "must be a state name",
            })
        }
    };

    let explicit = read_explicit_states(states)?;

    let mut event_names = Vec::with_capacity(events.len());
    let mut raw: Vec<(String, Vec<TransitionRecord>)> = Vec::with_capacity(events.len());
    for (name, entry) in events {
        let records = read_event(name, entry)?;
        event_names.push(name.clone());
        raw.push((name.clone(), records));
    }

    let state_names = resolve_state_names(&initial_state, explicit, &raw)?;

    let mut records_by_event = Vec::with_capacity(raw.len());
    for (event, records) in raw {
        let expanded = expand(records, &state_names);
        if expanded.is_empty() {
            return Err(DefinitionError::EmptyEvent { event });
        }
        check_ambiguity(&event, &expanded)?;
        records_by_event.push((event, expanded));
    }

    let hooks = read_state_hooks(states, &state_names, inline)?;

    let mut state_index: Vec<State> = state_names.iter().map(State::new).collect();
    let position: HashMap<&str, usize> = state_names
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let mut event_index = Vec::with_capacity(records_by_event.len());
    for (event, records) in records_by_event {
        let records: Vec<Arc<TransitionRecord>> = records.into_iter().map(Arc::new).collect();
        for record in &records {
            if let Some(&i) = position.get(record.from_state.as_str()) {
                state_index[i].exit_transitions.push(Arc::clone(record));
            }
            if let Some(&i) = position.get(record.to_state.as_str()) {
                state_index[i].enter_transitions.push(Arc::clone(record));
            }
        }
        event_index.push(Event {
            name: event,
            transitions: records,
        });
    }

    let state_namespaces = collect_namespaces(&state_names);
    let accessors = collect_accessors(&state_namespaces, &state_names);

    Ok(Definition {
        initial_state,
        state_names,
        event_names,
        states: state_index,
        events: event_index,
        state_namespaces,
        accessors,
        hooks,
    })
}

fn read_explicit_states(states: &Map<String, Value>) -> Result<Option<Vec<String>>, DefinitionError> {
    let Some(list) = get_first(states, &["knownStates", "explicitStates"]) else {
        return Ok(None);
    };

    let invalid = || DefinitionError::InvalidStateProperty {
        key: "knownStates".to_string(),
        expected: "must be a list of state names",
    };

    let items = list.as_array().ok_or_else(invalid)?;
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = item.as_str().ok_or_else(invalid)?;
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    Ok(Some(names))
}

fn read_event(name: &str, entry: &Value) -> Result<Vec<TransitionRecord>, DefinitionError> {
    let entry = entry.as_object().ok_or_else(|| DefinitionError::InvalidEvent {
        event: name.to_string(),
    })?;

    let single = entry.get("transition").filter(|v| !v.is_null());
    let many = entry.get("transitions").filter(|v| !v.is_null());
    let definitions = match (single, many) {
        (Some(_), Some(_)) => {
            return Err(DefinitionError::ConflictingTransitionKeys {
                event: name.to_string(),
            })
        }
        (Some(v), None) | (None, Some(v)) => to_array(v),
        (None, None) => {
            return Err(DefinitionError::MissingTransitions {
                event: name.to_string(),
            })
        }
    };

    if definitions.is_empty() {
        return Err(DefinitionError::EmptyEvent {
            event: name.to_string(),
        });
    }

    let defaults = EventDefaults {
        do_if: optional_name(name, entry, &IF_KEYS)?,
        do_unless: optional_name(name, entry, &UNLESS_KEYS)?,
        callbacks: Phase::ALL
            .iter()
            .map(|phase| callback_names(name, entry, phase.spec_key()).map(|names| (*phase, names)))
            .collect::<Result<_, _>>()?,
    };

    let mut records = Vec::new();
    for definition in &definitions {
        let definition = definition
            .as_object()
            .ok_or_else(|| DefinitionError::InvalidTransition {
                event: name.to_string(),
            })?;
        records.extend(read_transition(name, definition, &defaults)?);
    }
    Ok(records)
}

/// Read one transition-definition object into one record per from-state.
fn read_transition(
    event: &str,
    definition: &Map<String, Value>,
    defaults: &EventDefaults,
) -> Result<Vec<TransitionRecord>, DefinitionError> {
    let implicit: Vec<&str> = own_properties_of(definition)
        .into_iter()
        .filter(|k| !TRANSITION_RESERVED_KEYS.contains(k))
        .collect();

    let from = definition.get("from").filter(|v| !v.is_null());
    let to = definition.get("to").filter(|v| !v.is_null());
    let explicit = usize::from(from.is_some() || to.is_some());

    let count = implicit.len() + explicit;
    if count > 1 {
        return Err(DefinitionError::MultipleMappings {
            event: event.to_string(),
            count,
        });
    }

    let (from_states, to_state) = match (implicit.first(), from, to) {
        (Some(&from), _, _) => {
            let to = definition
                .get(from)
                .and_then(Value::as_str)
                .ok_or_else(|| DefinitionError::InvalidProperty {
                    event: event.to_string(),
                    key: from.to_string(),
                    expected: "must map to a state name",
                })?;
            (vec![from.to_string()], to.to_string())
        }
        (None, Some(from), Some(to)) => {
            let to = to.as_str().ok_or_else(|| DefinitionError::InvalidProperty {
                event: event.to_string(),
                key: "to".to_string(),
                expected: "must be a state name",
            })?;
            (state_list(event, "from", from)?, to.to_string())
        }
        _ => {
            return Err(DefinitionError::MissingMapping {
                event: event.to_string(),
            })
        }
    };

    if from_states.iter().any(|s| s == SAME_STATE) {
        return Err(DefinitionError::SameAsFromState {
            event: event.to_string(),
        });
    }

    let own_if = optional_name(event, definition, &IF_KEYS)?;
    let own_unless = optional_name(event, definition, &UNLESS_KEYS)?;
    let (do_if, do_unless) = if own_if.is_some() || own_unless.is_some() {
        (own_if, own_unless)
    } else {
        (defaults.do_if.clone(), defaults.do_unless.clone())
    };

    let mut template = TransitionRecord {
        event: event.to_string(),
        to_state: to_state.clone(),
        is_guarded: do_if.is_some() || do_unless.is_some(),
        do_if,
        do_unless,
        ..TransitionRecord::default()
    };
    for (phase, names) in &defaults.callbacks {
        let list = template.callbacks_mut(*phase);
        list.extend(names.iter().cloned());
        list.extend(callback_names(event, definition, phase.spec_key())?);
    }

    Ok(from_states
        .into_iter()
        .map(|from_state| TransitionRecord {
            from_state,
            ..template.clone()
        })
        .collect())
}

fn state_list(event: &str, key: &str, value: &Value) -> Result<Vec<String>, DefinitionError> {
    let invalid = || DefinitionError::InvalidProperty {
        event: event.to_string(),
        key: key.to_string(),
        expected: "must be a state name or a list of state names",
    };
    let items = to_array(value);
    if items.is_empty() {
        return Err(invalid());
    }
    items
        .iter()
        .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
        .collect()
}

fn optional_name(
    event: &str,
    object: &Map<String, Value>,
    keys: &[&str],
) -> Result<Option<String>, DefinitionError> {
    match get_first(object, keys) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(DefinitionError::InvalidProperty {
            event: event.to_string(),
            key: keys[0].to_string(),
            expected: "must be the name of a guard",
        }),
    }
}

fn callback_names(
    event: &str,
    object: &Map<String, Value>,
    key: &str,
) -> Result<Vec<String>, DefinitionError> {
    let Some(value) = object.get(key) else {
        return Ok(Vec::new());
    };
    to_array(value)
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| DefinitionError::InvalidProperty {
                    event: event.to_string(),
                    key: key.to_string(),
                    expected: "must be a callback name or a list of callback names",
                })
        })
        .collect()
}

/// Known states in first-appearance order, or the explicit allow-list after
/// checking it against every referenced state.
fn resolve_state_names(
    initial_state: &str,
    explicit: Option<Vec<String>>,
    raw: &[(String, Vec<TransitionRecord>)],
) -> Result<Vec<String>, DefinitionError> {
    let mut referenced = vec![initial_state.to_string()];
    let mut seen: HashSet<String> = referenced.iter().cloned().collect();

    for (_, records) in raw {
        for record in records {
            for state in [&record.from_state, &record.to_state] {
                if state == ALL_STATES || state == SAME_STATE {
                    continue;
                }
                if seen.insert(state.clone()) {
                    referenced.push(state.clone());
                }
            }
        }
    }

    let Some(explicit) = explicit else {
        return Ok(referenced);
    };

    if let Some(state) = referenced.iter().find(|s| !explicit.contains(s)) {
        return Err(DefinitionError::UndefinedState {
            state: state.clone(),
        });
    }
    if let Some(state) = explicit.iter().find(|s| !seen.contains(*s)) {
        return Err(DefinitionError::UnusedState {
            state: state.clone(),
        });
    }
    Ok(explicit)
}

/// Expand `$all` in place and resolve `$same`, keeping declaration order.
fn expand(records: Vec<TransitionRecord>, state_names: &[String]) -> Vec<TransitionRecord> {
    let mut expanded = Vec::with_capacity(records.len());
    for record in records {
        if record.from_state == ALL_STATES {
            for state in state_names {
                expanded.push(TransitionRecord {
                    from_state: state.clone(),
                    ..record.clone()
                });
            }
        } else {
            expanded.push(record);
        }
    }

    for record in &mut expanded {
        if record.to_state == SAME_STATE {
            record.to_state = record.from_state.clone();
        }
    }
    expanded
}

fn check_ambiguity(event: &str, records: &[TransitionRecord]) -> Result<(), DefinitionError> {
    let mut unguarded = HashSet::new();
    for record in records.iter().filter(|r| !r.is_guarded) {
        if !unguarded.insert(record.from_state.as_str()) {
            return Err(DefinitionError::Ambiguous {
                event: event.to_string(),
                state: record.from_state.clone(),
            });
        }
    }
    Ok(())
}

fn read_state_hooks(
    states: &Map<String, Value>,
    state_names: &[String],
    inline: Vec<InlineHook>,
) -> Result<HashMap<String, StateHooks>, DefinitionError> {
    let mut hooks: HashMap<String, StateHooks> = HashMap::new();

    for (state, spec) in states {
        if STATE_RESERVED_KEYS.contains(&state.as_str()) || spec.is_null() {
            continue;
        }
        let spec = spec
            .as_object()
            .ok_or_else(|| DefinitionError::InvalidStateProperty {
                key: state.clone(),
                expected: "must be an object of lifecycle hooks",
            })?;

        if let Some(key) = spec
            .keys()
            .find(|key| !Phase::STATE_HOOKS.iter().any(|p| p.spec_key() == key.as_str()))
        {
            return Err(DefinitionError::InvalidStateProperty {
                key: format!("{state}.{key}"),
                expected: "is not a lifecycle hook, use willEnter, didEnter, willExit or didExit",
            });
        }
        if !state_names.contains(state) {
            return Err(DefinitionError::UnknownHookState {
                state: state.clone(),
                phase: spec.keys().next().map_or("{}", String::as_str).to_string(),
            });
        }

        for phase in Phase::STATE_HOOKS {
            let Some(value) = spec.get(phase.spec_key()) else {
                continue;
            };
            for name in to_array(value) {
                let name = name
                    .as_str()
                    .ok_or_else(|| DefinitionError::InvalidStateProperty {
                        key: format!("{state}.{phase}"),
                        expected: "must be a callback name or a list of callback names",
                    })?;
                hooks
                    .entry(state.clone())
                    .or_default()
                    .push(phase, CallbackRef::Named(name.to_string()));
            }
        }
    }

    for hook in inline {
        if hook.phase.enters().is_none() {
            return Err(DefinitionError::InvalidHookPhase {
                phase: hook.phase.to_string(),
            });
        }
        if !state_names.contains(&hook.state) {
            return Err(DefinitionError::UnknownHookState {
                state: hook.state,
                phase: hook.phase.to_string(),
            });
        }
        hooks
            .entry(hook.state)
            .or_default()
            .push(hook.phase, CallbackRef::Inline(hook.callback));
    }

    Ok(hooks)
}

fn collect_namespaces(state_names: &[String]) -> Vec<String> {
    let mut namespaces: Vec<String> = Vec::new();
    for state in state_names {
        for prefix in namespaces_of(state) {
            if !namespaces.iter().any(|n| n == prefix) {
                namespaces.push(prefix.to_string());
            }
        }
    }
    namespaces
}

fn collect_accessors(namespaces: &[String], state_names: &[String]) -> Vec<StateAccessor> {
    let mut prefixes: Vec<&String> = namespaces.iter().collect();
    for state in state_names {
        if !prefixes.contains(&state) {
            prefixes.push(state);
        }
    }

    prefixes
        .into_iter()
        .map(|prefix| StateAccessor {
            name: format!("isIn{}", capital_camelize(prefix)),
            prefix: prefix.clone(),
        })
        .collect()
}
