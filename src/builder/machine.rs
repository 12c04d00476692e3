//! Builder for constructing machines.

use crate::builder::error::BuildError;
use crate::core::{Callback, CallbackContext, Settle, Target, ALL_STATES, FAILED_STATE};
use crate::definition::{Definition, DefinitionError, InlineHook, Phase};
use crate::effects::{Listener, Machine, StateChange, ERROR_EVENT};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Builder for constructing machines with a fluent API.
///
/// # Example
///
/// ```rust
/// use statewise::builder::MachineBuilder;
/// use statewise::core::MapTarget;
/// use statewise::definition::Phase;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// let machine = MachineBuilder::new(json!({
///     "states": { "initialState": "off" },
///     "events": {
///         "run": { "transitions": [{ "off": "on", "guard": "hasPower" }] }
///     }
/// }))
/// .target(Arc::new(MapTarget::new("heater").with_guard("hasPower", true)))
/// .state_hook("on", Phase::DidEnter, |_ctx| json!("warm"))
/// .on_state_change(|change| println!("{} -> {}", change.from, change.to))
/// .build()
/// .unwrap();
///
/// assert_eq!(machine.current_state(), "off");
/// assert!(machine.can_enter_state("on").unwrap());
/// ```
pub struct MachineBuilder {
    spec: Value,
    target: Option<Arc<dyn Target>>,
    initial_state: Option<String>,
    hooks: Vec<InlineHook>,
    listeners: Vec<Listener>,
}

impl MachineBuilder {
    /// Start from a raw definition.
    pub fn new(spec: Value) -> Self {
        Self {
            spec,
            target: None,
            initial_state: None,
            hooks: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Start from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, BuildError> {
        let spec = serde_json::from_str(text).map_err(DefinitionError::from)?;
        Ok(Self::new(spec))
    }

    /// Set the object guards and callbacks are read from.
    pub fn target(mut self, target: Arc<dyn Target>) -> Self {
        self.target = Some(target);
        self
    }

    /// Start somewhere other than the definition's initial state.
    pub fn initial_state(mut self, state: impl Into<String>) -> Self {
        self.initial_state = Some(state.into());
        self
    }

    /// Attach an inline callback to a state's lifecycle hook.
    ///
    /// Runs after any callbacks the definition names for the same hook.
    pub fn state_hook<F, R>(mut self, state: impl Into<String>, phase: Phase, func: F) -> Self
    where
        F: Fn(&CallbackContext) -> R + Send + Sync + 'static,
        R: Into<Settle>,
    {
        self.hooks.push(InlineHook {
            state: state.into(),
            phase,
            callback: Callback::new(func),
        });
        self
    }

    /// Register a listener for every committed state change.
    pub fn on_state_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(listener));
        self
    }

    /// Compile the definition and build the machine.
    ///
    /// Unless the definition declares its own `error` event, one is added
    /// that moves every state to `failed`.
    pub fn build(self) -> Result<Machine, BuildError> {
        let spec = with_default_error_event(self.spec);
        let definition = Definition::compile_with_hooks(&spec, self.hooks)?;

        let initial_state = match self.initial_state {
            Some(state) if !definition.has_state(&state) => {
                return Err(BuildError::UnknownInitialState {
                    state,
                    known: definition.state_names().join(", "),
                })
            }
            Some(state) => state,
            None => definition.initial_state().to_string(),
        };

        debug!(
            initial_state = %initial_state,
            states = definition.state_names().len(),
            events = definition.event_names().len(),
            "built machine"
        );

        let target = self.target.unwrap_or_else(Machine::empty_target);
        Ok(Machine::from_parts(
            definition,
            target,
            initial_state,
            self.listeners,
        ))
    }
}

/// Add `error: { transition: { $all: failed } }` when no `error` event exists,
/// and allow `failed` in an explicit state list.
fn with_default_error_event(mut spec: Value) -> Value {
    {
        let Some(events) = spec.get_mut("events").and_then(Value::as_object_mut) else {
            return spec;
        };
        if events.is_empty() || events.contains_key(ERROR_EVENT) {
            return spec;
        }

        let mut mapping = Map::new();
        mapping.insert(ALL_STATES.to_string(), json!(FAILED_STATE));
        events.insert(ERROR_EVENT.to_string(), json!({ "transition": mapping }));
    }

    if let Some(states) = spec.get_mut("states").and_then(Value::as_object_mut) {
        for key in ["knownStates", "explicitStates"] {
            if let Some(Value::Array(list)) = states.get_mut(key) {
                if !list.iter().any(|s| s == FAILED_STATE) {
                    list.push(json!(FAILED_STATE));
                }
            }
        }
    }

    spec
}
