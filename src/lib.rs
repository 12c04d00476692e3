//! Statewise: a declarative finite-state-machine engine
//!
//! A machine is described as data: states, events, and guarded transitions
//! between them. Statewise compiles that description into a canonical
//! transition table, resolves which transition an event triggers, keeps at
//! most one state-changing transition active at a time, and drives an
//! asynchronous callback protocol around every state change.
//!
//! # Core Concepts
//!
//! - **Definition**: the compiled transition table, with `$all`/`$same`
//!   expansion, guard ordering and ambiguity checks
//! - **Target**: whatever hosts the machine; it supplies guards and callbacks
//!   by name
//! - **Transition**: one state change, run in six phases (`beforeEvent`,
//!   `willExit`, `willEnter`, `didExit`, `didEnter`, `afterEvent`)
//! - **Machine**: current state, event dispatch, and automatic `error`
//!   handling when a transition rejects
//!
//! # Example
//!
//! ```rust
//! use statewise::builder::MachineBuilder;
//! use statewise::core::MapTarget;
//! use statewise::utils::reject;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # futures::executor::block_on(async {
//! let target = MapTarget::new("heater")
//!     .with_guard("hasPower", true)
//!     .with_callback("report", |ctx| json!(format!("now {}", ctx.to_state)))
//!     .with_callback("overheat", |_| reject("too hot"));
//!
//! let machine = MachineBuilder::new(json!({
//!     "states": { "initialState": "off" },
//!     "events": {
//!       "run": {
//!         "transitions": [
//!           { "on": "$same" },
//!           { "from": ["off"], "to": "on", "guard": "hasPower", "after": "report" }
//!         ]
//!       },
//!       "boost": { "transition": { "on": "hot", "willEnter": "overheat" } }
//!     }
//! }))
//! .target(Arc::new(target))
//! .build()
//! .unwrap();
//!
//! machine.send("run", vec![]).unwrap().await.unwrap();
//! assert_eq!(machine.current_state(), "on");
//!
//! // A rejected transition sends the machine through the `error` event.
//! let rejection = machine.send("boost", vec![]).unwrap().await.unwrap_err();
//! assert_eq!(rejection.reason(), Some(&json!("too hot")));
//! assert_eq!(machine.current_state(), "failed");
//! # });
//! ```

pub mod builder;
pub mod core;
pub mod definition;
pub mod effects;
pub mod utils;

// Re-export commonly used types
pub use crate::builder::{BuildError, MachineBuilder};
pub use crate::core::{Callback, CallbackContext, Guard, MapTarget, Settle, StateHistory, Target};
pub use crate::definition::{Definition, DefinitionError, Phase, TransitionRecord};
pub use crate::effects::{DispatchError, Machine, Rejection, StateChange, Transition};
pub use crate::utils::reject;
