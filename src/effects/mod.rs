//! Runtime side of the engine.
//!
//! The [`Machine`] owns the current state and the set of active transitions;
//! each [`Transition`] drives the six callback phases of one state change
//! against the target.
//!
//! Dispatch is split in two: everything that can be decided without running
//! a callback fails synchronously from [`Machine::send`], and everything else
//! surfaces through the returned [`Dispatch`] future.

pub mod error;
mod machine;
mod transition;

pub use error::{CallbackLookupError, DispatchError, GuardError, Rejection};
pub use machine::{Dispatch, Machine, StateChange, ERROR_EVENT};
pub use transition::{PhaseCallback, PhaseOutcomes, Transition, TransitionStatus};

pub(crate) use machine::Listener;
