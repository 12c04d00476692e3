//! Builder API for constructing machines.
//!
//! A [`MachineBuilder`] takes a raw definition and wires in what the
//! definition cannot express: the target, an initial state override, inline
//! lifecycle callbacks and state-change listeners.

pub mod error;
pub mod machine;

pub use error::BuildError;
pub use machine::MachineBuilder;
