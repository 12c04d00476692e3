//! Leaf types shared by the definition compiler and the runtime.
//!
//! - State names, namespaces and the reserved state tokens
//! - Guards and callbacks, the two things a target supplies
//! - The `Target` capability trait
//! - History of committed state changes

mod callback;
mod guard;
mod history;
mod state;
mod target;

pub use callback::{Callback, CallbackContext, CallbackRef, Settle};
pub use guard::Guard;
pub use history::{StateHistory, StateTransition};
pub use state::{
    is_within, namespaces_of, State, ALL_STATES, DEFAULT_INITIAL_STATE, FAILED_STATE, SAME_STATE,
};
pub use target::{MapTarget, Target};
