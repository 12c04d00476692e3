//! One in-flight state change and its callback protocol.

use crate::core::{Callback, CallbackContext, CallbackRef, Target};
use crate::definition::{Definition, Phase, TransitionRecord};
use crate::effects::error::{CallbackLookupError, Rejection};
use crate::utils::with_promise;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;
use uuid::Uuid;

/// Results or first errors of each callback, keyed by phase, then by
/// qualified callback identifier.
pub type PhaseOutcomes = HashMap<Phase, HashMap<String, Value>>;

/// Lifecycle of a transition.
///
/// `Pending → Resolving → Resolved | Rejected | Aborted`; the last three are
/// terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionStatus {
    #[default]
    Pending,
    Resolving,
    Resolved,
    Rejected,
    Aborted,
}

impl TransitionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Rejected | Self::Aborted)
    }
}

/// A callback gathered for a phase, with its bookkeeping identifier.
#[derive(Clone, Debug)]
pub struct PhaseCallback {
    pub id: String,
    pub callback: Callback,
}

#[derive(Default)]
struct Progress {
    status: TransitionStatus,
    is_resolving: Option<bool>,
    is_rejected: Option<bool>,
    resolutions: PhaseOutcomes,
    rejections: PhaseOutcomes,
    rejection: Option<Rejection>,
}

/// A resolved transition record bound to its event arguments and target.
///
/// Created by [`Machine::transition_for`](crate::effects::Machine::transition_for)
/// and owned by the machine that created it.
pub struct Transition {
    id: Uuid,
    record: Arc<TransitionRecord>,
    event_args: Vec<Value>,
    definition: Arc<Definition>,
    target: Arc<dyn Target>,
    progress: Mutex<Progress>,
}

impl Transition {
    pub(crate) fn new(
        record: Arc<TransitionRecord>,
        event_args: Vec<Value>,
        definition: Arc<Definition>,
        target: Arc<dyn Target>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            record,
            event_args,
            definition,
            target,
            progress: Mutex::new(Progress::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn record(&self) -> &TransitionRecord {
        &self.record
    }

    pub fn event(&self) -> &str {
        &self.record.event
    }

    pub fn from_state(&self) -> &str {
        &self.record.from_state
    }

    pub fn to_state(&self) -> &str {
        &self.record.to_state
    }

    pub fn is_guarded(&self) -> bool {
        self.record.is_guarded
    }

    pub fn event_args(&self) -> &[Value] {
        &self.event_args
    }

    pub fn status(&self) -> TransitionStatus {
        self.progress().status
    }

    pub fn is_aborted(&self) -> bool {
        self.status() == TransitionStatus::Aborted
    }

    /// `None` before the first phase starts, `Some(true)` while phases are
    /// running, `Some(false)` once they have all settled.
    pub fn is_resolving(&self) -> Option<bool> {
        self.progress().is_resolving
    }

    /// `None` until the transition settles.
    pub fn is_rejected(&self) -> Option<bool> {
        self.progress().is_rejected
    }

    pub fn resolutions(&self) -> PhaseOutcomes {
        self.progress().resolutions.clone()
    }

    pub fn rejections(&self) -> PhaseOutcomes {
        self.progress().rejections.clone()
    }

    /// What a single callback resolved with.
    pub fn resolution(&self, phase: Phase, id: &str) -> Option<Value> {
        self.progress()
            .resolutions
            .get(&phase)
            .and_then(|by_id| by_id.get(id))
            .cloned()
    }

    /// The first error a single callback rejected with.
    pub fn rejected_with(&self, phase: Phase, id: &str) -> Option<Value> {
        self.progress()
            .rejections
            .get(&phase)
            .and_then(|by_id| by_id.get(id))
            .cloned()
    }

    /// The rejection that stopped `perform`, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        self.progress().rejection.clone()
    }

    /// Stop treating this transition as active.
    ///
    /// Bookkeeping only: callbacks already running keep running and the
    /// `perform` future still settles on its own.
    pub fn abort(&self) {
        trace!(transition = %self.id, "aborting transition");
        self.progress().status = TransitionStatus::Aborted;
    }

    /// Gather the callbacks of a phase: lifecycle hooks of the state being
    /// entered or left first, then the callbacks named by the record.
    pub fn callbacks_for(&self, phase: Phase) -> Result<Vec<PhaseCallback>, CallbackLookupError> {
        let mut callbacks = Vec::new();

        if let Some(enters) = phase.enters() {
            let state = if enters {
                &self.record.to_state
            } else {
                &self.record.from_state
            };
            let state_index = self.definition.state_index(state).unwrap_or_default();

            for (position, hook) in self.definition.state_hooks(state, phase).iter().enumerate() {
                match hook {
                    CallbackRef::Named(name) => {
                        let callback = self.target.callback(name).ok_or_else(|| {
                            CallbackLookupError::MissingStateCallback {
                                callback: name.clone(),
                                target: self.target.describe(),
                                state: state.clone(),
                                phase,
                            }
                        })?;
                        callbacks.push(PhaseCallback {
                            id: format!("state:{name}"),
                            callback,
                        });
                    }
                    CallbackRef::Inline(callback) => callbacks.push(PhaseCallback {
                        id: format!("state:_inline:{state_index}-{position}_"),
                        callback: callback.clone(),
                    }),
                }
            }
        }

        for name in self.record.callbacks(phase) {
            let callback = self.target.callback(name).ok_or_else(|| {
                CallbackLookupError::MissingTransitionCallback {
                    callback: name.clone(),
                    target: self.target.describe(),
                    transition: self.label(),
                    phase,
                }
            })?;
            callbacks.push(PhaseCallback {
                id: format!("transition:{name}"),
                callback,
            });
        }

        Ok(callbacks)
    }

    /// Run every callback of a phase and wait for all of them to settle.
    ///
    /// Outcomes are recorded by identifier as they settle. If any callback
    /// rejects, the phase rejects with the value of the last rejecting
    /// callback in enumeration order.
    pub async fn callback(&self, phase: Phase) -> Result<(), Rejection> {
        let callbacks = self.callbacks_for(phase)?;

        {
            let mut progress = self.progress();
            progress.is_resolving = Some(true);
            if progress.status == TransitionStatus::Pending {
                progress.status = TransitionStatus::Resolving;
            }
        }

        trace!(
            transition = %self.id,
            %phase,
            count = callbacks.len(),
            "running callbacks"
        );

        let ctx = self.context(phase);
        let pending = callbacks.into_iter().map(|entry| {
            let settling = with_promise(entry.callback.invoke(&ctx));
            async move {
                let outcome = settling.await;
                self.record_outcome(phase, entry.id, &outcome);
                outcome.err()
            }
        });

        let last_failure = join_all(pending).await.into_iter().flatten().last();

        match last_failure {
            Some(reason) => Err(Rejection::Callback(reason)),
            None => Ok(()),
        }
    }

    /// Run all six phases in order, each after the previous one settles.
    ///
    /// Resolves to the transition itself. The first rejecting phase stops the
    /// sequence and becomes the transition's rejection.
    pub async fn perform(self: Arc<Self>) -> Result<Arc<Self>, Rejection> {
        for phase in Phase::ALL {
            if let Err(rejection) = self.callback(phase).await {
                let mut progress = self.progress();
                progress.is_resolving = Some(false);
                progress.is_rejected = Some(true);
                progress.rejection = Some(rejection.clone());
                if progress.status != TransitionStatus::Aborted {
                    progress.status = TransitionStatus::Rejected;
                }
                return Err(rejection);
            }
        }

        {
            let mut progress = self.progress();
            progress.is_resolving = Some(false);
            progress.is_rejected = Some(false);
            if progress.status != TransitionStatus::Aborted {
                progress.status = TransitionStatus::Resolved;
            }
        }

        Ok(self)
    }

    /// Summary used as the `transition` field of the automatic `error` event.
    pub fn to_value(&self) -> Value {
        json!({
            "id": self.id.to_string(),
            "event": self.record.event,
            "fromState": self.record.from_state,
            "toState": self.record.to_state,
            "eventArgs": self.event_args,
        })
    }

    fn label(&self) -> String {
        format!(
            "\"{}\" ({} -> {})",
            self.record.event, self.record.from_state, self.record.to_state
        )
    }

    fn context(&self, phase: Phase) -> CallbackContext {
        CallbackContext {
            event: self.record.event.clone(),
            from_state: self.record.from_state.clone(),
            to_state: self.record.to_state.clone(),
            phase,
            args: self.event_args.clone(),
        }
    }

    fn record_outcome(&self, phase: Phase, id: String, outcome: &Result<Value, Value>) {
        let mut progress = self.progress();
        match outcome {
            Ok(value) => {
                progress
                    .resolutions
                    .entry(phase)
                    .or_default()
                    .insert(id, value.clone());
            }
            Err(reason) => {
                progress
                    .rejections
                    .entry(phase)
                    .or_default()
                    .entry(id)
                    .or_insert_with(|| reason.clone());
            }
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("event", &self.record.event)
            .field("from_state", &self.record.from_state)
            .field("to_state", &self.record.to_state)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn flag(value: Option<bool>) -> &'static str {
            match value {
                None => "null",
                Some(true) => "true",
                Some(false) => "false",
            }
        }

        let (is_resolving, is_rejected) = {
            let progress = self.progress();
            (progress.is_resolving, progress.is_rejected)
        };

        writeln!(f, "Transition {{")?;
        writeln!(f, "  event: {},", self.record.event)?;
        writeln!(f, "  eventArgs: {},", Value::from(self.event_args.clone()))?;
        writeln!(f, "  fromState: \"{}\",", self.record.from_state)?;
        writeln!(f, "  toState: \"{}\",", self.record.to_state)?;
        writeln!(f, "  isResolving: {},", flag(is_resolving))?;
        writeln!(f, "  isRejected: {}", flag(is_rejected))?;
        write!(f, "}}")
    }
}
