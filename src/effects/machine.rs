//! The runtime engine: current state, event resolution, and the
//! single-active-transition rule.

use crate::core::{MapTarget, StateHistory, StateTransition, Target};
use crate::definition::{Definition, LookupError, StateAccessor, TransitionRecord};
use crate::effects::error::{DispatchError, GuardError, Rejection};
use crate::effects::transition::Transition;
use crate::utils::contains;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Name of the event dispatched automatically when a transition rejects.
pub const ERROR_EVENT: &str = "error";

/// The future returned by [`Machine::send`].
pub type Dispatch = BoxFuture<'static, Result<Arc<Transition>, Rejection>>;

/// Notification that the machine committed a new current state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub event: Option<String>,
    pub from: String,
    pub to: String,
}

pub(crate) type Listener = Arc<dyn Fn(&StateChange) + Send + Sync>;

struct Runtime {
    current_state: String,
    active: Vec<Arc<Transition>>,
    history: StateHistory,
}

struct Inner {
    definition: Arc<Definition>,
    target: Arc<dyn Target>,
    runtime: Mutex<Runtime>,
    listeners: Mutex<Vec<Listener>>,
}

/// A running state machine.
///
/// Cloning yields another handle to the same machine.
///
/// # Example
///
/// ```rust
/// use statewise::Machine;
/// use serde_json::json;
///
/// # futures::executor::block_on(async {
/// let machine = Machine::create(&json!({
///     "states": { "initialState": "off" },
///     "events": { "run": { "transition": { "off": "on" } } }
/// }))
/// .unwrap();
///
/// machine.send("run", vec![]).unwrap().await.unwrap();
/// assert_eq!(machine.current_state(), "on");
/// assert!(machine.in_state("on").unwrap());
/// # });
/// ```
#[derive(Clone)]
pub struct Machine {
    inner: Arc<Inner>,
}

impl Machine {
    /// Build a machine with no target. Guards and named callbacks will be
    /// reported as undefined; use [`MachineBuilder`](crate::builder::MachineBuilder)
    /// to supply one.
    pub fn create(spec: &Value) -> Result<Self, crate::builder::BuildError> {
        crate::builder::MachineBuilder::new(spec.clone()).build()
    }

    pub(crate) fn from_parts(
        definition: Definition,
        target: Arc<dyn Target>,
        initial_state: String,
        listeners: Vec<Listener>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                definition: Arc::new(definition),
                target,
                runtime: Mutex::new(Runtime {
                    current_state: initial_state,
                    active: Vec::new(),
                    history: StateHistory::new(),
                }),
                listeners: Mutex::new(listeners),
            }),
        }
    }

    pub(crate) fn empty_target() -> Arc<dyn Target> {
        Arc::new(MapTarget::default())
    }

    pub fn definition(&self) -> &Definition {
        &self.inner.definition
    }

    pub fn target(&self) -> &Arc<dyn Target> {
        &self.inner.target
    }

    pub fn current_state(&self) -> String {
        self.runtime().current_state.clone()
    }

    /// True while at least one transition is active.
    pub fn is_transitioning(&self) -> bool {
        !self.runtime().active.is_empty()
    }

    pub fn state_names(&self) -> &[String] {
        self.inner.definition.state_names()
    }

    pub fn event_names(&self) -> &[String] {
        self.inner.definition.event_names()
    }

    pub fn active_transitions(&self) -> Vec<Arc<Transition>> {
        self.runtime().active.clone()
    }

    pub fn history(&self) -> StateHistory {
        self.runtime().history.clone()
    }

    /// Dispatch an event.
    ///
    /// Unknown events, unresolvable transitions and conflicts with an active
    /// transition fail here, before any callback runs. Otherwise the resolved
    /// transition is registered as active and the returned future performs it.
    ///
    /// When the transition rejects, every other active transition is aborted
    /// and the `error` event is dispatched with `{ error, transition }` before
    /// the future yields the rejection. Rejections of the `error` event itself
    /// are not re-dispatched.
    pub fn send(&self, event: &str, args: Vec<Value>) -> Result<Dispatch, DispatchError> {
        if !contains(self.event_names(), event) {
            return Err(DispatchError::UnknownEvent {
                event: event.to_string(),
                known: self.event_names().join(", "),
            });
        }

        let transition = self.transition_for(event, args)?;

        {
            let mut runtime = self.runtime();

            // Guards ran without the lock; another handle may have committed since.
            if transition.from_state() != runtime.current_state {
                return Err(DispatchError::StateChanged {
                    event: event.to_string(),
                    resolved_from: transition.from_state().to_string(),
                    current: runtime.current_state.clone(),
                });
            }

            let same_state = transition.to_state() == runtime.current_state;

            if !runtime.active.is_empty() && !same_state {
                return Err(DispatchError::TransitionInProgress {
                    from: runtime.current_state.clone(),
                    to: transition.to_state().to_string(),
                    active: runtime
                        .active
                        .iter()
                        .map(|t| format!("{} ({} -> {})", t.event(), t.from_state(), t.to_state()))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }

            runtime.active.push(Arc::clone(&transition));
        }

        debug!(
            event,
            from = transition.from_state(),
            to = transition.to_state(),
            transition = %transition.id(),
            "dispatching event"
        );

        let machine = self.clone();
        let event = event.to_string();

        let mut registration = Registration {
            machine: self.clone(),
            transition: Arc::clone(&transition),
            settled: false,
        };

        Ok(async move {
            let outcome = Arc::clone(&transition).perform().await;
            registration.settled = true;
            drop(registration);

            match outcome {
                Ok(performed) => {
                    machine.commit(&performed);
                    Ok(performed)
                }
                Err(rejection) => {
                    machine.remove_active_transition(&transition);
                    machine.abort_active_transitions();
                    if event != ERROR_EVENT {
                        machine.dispatch_error(&rejection, &transition).await;
                    }
                    Err(rejection)
                }
            }
        }
        .boxed())
    }

    /// Resolve the transition an event would trigger from the current state,
    /// without performing it.
    pub fn transition_for(
        &self,
        event: &str,
        args: Vec<Value>,
    ) -> Result<Arc<Transition>, DispatchError> {
        let current_state = self.current_state();
        let potentials = self
            .inner
            .definition
            .transitions_for(event, Some(&current_state));

        if potentials.is_empty() {
            return Err(DispatchError::NoTransitionDefined {
                event: event.to_string(),
                state: current_state,
            });
        }

        let record = self
            .outcome_of_potential_transitions(&potentials, &current_state)?
            .ok_or_else(|| DispatchError::NoTransitionResolved {
                event: event.to_string(),
                state: current_state.clone(),
            })?;

        Ok(Arc::new(Transition::new(
            record,
            args,
            Arc::clone(&self.inner.definition),
            Arc::clone(&self.inner.target),
        )))
    }

    /// True if the current state is `prefix` or nested under it.
    pub fn in_state(&self, prefix: &str) -> Result<bool, LookupError> {
        self.inner
            .definition
            .state_matches(&self.current_state(), prefix)
    }

    /// True if some transition out of the current state into `state` would
    /// currently win guard resolution.
    pub fn can_enter_state(&self, state: &str) -> Result<bool, GuardError> {
        let current_state = self.current_state();
        let potentials: Vec<Arc<TransitionRecord>> = self
            .inner
            .definition
            .lookup_state(&current_state)
            .map(|s| {
                s.exit_transitions
                    .iter()
                    .filter(|t| t.to_state == state)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(self
            .outcome_of_potential_transitions(&potentials, &current_state)?
            .is_some())
    }

    /// Generated `isIn<State>` accessors, one per namespace and state.
    pub fn state_accessors(&self) -> &[StateAccessor] {
        self.inner.definition.accessors()
    }

    /// Evaluate a generated accessor by name against the current state.
    pub fn accessor(&self, name: &str) -> Option<bool> {
        let accessor = self.state_accessors().iter().find(|a| a.name == name)?;
        self.in_state(&accessor.prefix).ok()
    }

    /// Register a listener called every time a new current state commits.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&StateChange) + Send + Sync + 'static,
    {
        self.listeners().push(Arc::new(listener));
    }

    /// Overwrite the current state directly, for tests and initialization.
    pub fn set_current_state(&self, state: &str) -> Result<(), LookupError> {
        self.inner.definition.lookup_state(state)?;
        let from = {
            let mut runtime = self.runtime();
            std::mem::replace(&mut runtime.current_state, state.to_string())
        };
        self.notify(&StateChange {
            event: None,
            from,
            to: state.to_string(),
        });
        Ok(())
    }

    pub fn has_active_transition(&self, transition: &Transition) -> bool {
        self.runtime()
            .active
            .iter()
            .any(|t| t.id() == transition.id())
    }

    /// Abort one transition if it is active.
    pub fn abort_active_transition(&self, transition: &Transition) {
        if self.remove_active_transition(transition) {
            transition.abort();
        }
    }

    /// Abort and forget every active transition.
    pub fn abort_active_transitions(&self) {
        let aborted = std::mem::take(&mut self.runtime().active);
        for transition in aborted {
            transition.abort();
        }
    }

    fn remove_active_transition(&self, transition: &Transition) -> bool {
        let mut runtime = self.runtime();
        let before = runtime.active.len();
        runtime.active.retain(|t| t.id() != transition.id());
        runtime.active.len() != before
    }

    /// First unguarded candidate wins, otherwise the first whose guard passes.
    fn outcome_of_potential_transitions(
        &self,
        potentials: &[Arc<TransitionRecord>],
        current_state: &str,
    ) -> Result<Option<Arc<TransitionRecord>>, GuardError> {
        for potential in potentials {
            if !potential.is_guarded {
                return Ok(Some(Arc::clone(potential)));
            }
            if let Some(guard) = &potential.do_if {
                if self.check_guard(guard, current_state, false)? {
                    return Ok(Some(Arc::clone(potential)));
                }
            }
            if let Some(guard) = &potential.do_unless {
                if self.check_guard(guard, current_state, true)? {
                    return Ok(Some(Arc::clone(potential)));
                }
            }
        }
        Ok(None)
    }

    fn check_guard(&self, name: &str, current_state: &str, inverse: bool) -> Result<bool, GuardError> {
        let guard = self
            .inner
            .target
            .guard(name)
            .ok_or_else(|| GuardError::Undefined {
                guard: name.to_string(),
                target: self.inner.target.describe(),
            })?;
        Ok(guard.check(current_state) != inverse)
    }

    fn commit(&self, transition: &Transition) {
        let change = {
            let mut runtime = self.runtime();
            let before = runtime.active.len();
            runtime.active.retain(|t| t.id() != transition.id());

            // Aborted transitions were already dropped from the active set.
            if before == runtime.active.len() || transition.is_aborted() {
                debug!(
                    transition = %transition.id(),
                    "aborted transition settled, state left unchanged"
                );
                return;
            }

            let from = std::mem::replace(
                &mut runtime.current_state,
                transition.to_state().to_string(),
            );
            runtime.history = runtime.history.record(StateTransition {
                event: transition.event().to_string(),
                from: from.clone(),
                to: transition.to_state().to_string(),
                timestamp: Utc::now(),
            });

            StateChange {
                event: Some(transition.event().to_string()),
                from,
                to: transition.to_state().to_string(),
            }
        };

        debug!(from = %change.from, to = %change.to, "state committed");
        self.notify(&change);
    }

    async fn dispatch_error(&self, rejection: &Rejection, transition: &Transition) {
        let payload = json!({
            "error": rejection.to_value(),
            "transition": transition.to_value(),
        });

        match self.send(ERROR_EVENT, vec![payload]) {
            Ok(dispatch) => {
                if let Err(err) = dispatch.await {
                    warn!(error = %err, "error event rejected");
                }
            }
            Err(err) => {
                warn!(error = %err, failed = %rejection, "could not dispatch error event");
            }
        }
    }

    fn notify(&self, change: &StateChange) {
        let listeners = self.listeners().clone();
        for listener in listeners {
            listener(change);
        }
    }

    fn runtime(&self) -> MutexGuard<'_, Runtime> {
        self.inner
            .runtime
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn listeners(&self) -> MutexGuard<'_, Vec<Listener>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Keeps a dispatched transition's place in the active set tied to its
/// future: dropping the future before `perform` settles aborts the transition.
struct Registration {
    machine: Machine,
    transition: Arc<Transition>,
    settled: bool,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if !self.settled {
            debug!(
                transition = %self.transition.id(),
                "dispatch dropped before settling, aborting transition"
            );
            self.machine.abort_active_transition(&self.transition);
        }
    }
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let runtime = self.runtime();
        f.debug_struct("Machine")
            .field("current_state", &runtime.current_state)
            .field("active", &runtime.active)
            .field("events", &self.inner.definition.event_names())
            .finish()
    }
}
