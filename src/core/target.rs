//! The object a machine drives: it supplies guard values and callback
//! implementations by name.

use super::callback::{Callback, CallbackContext, Settle};
use super::guard::Guard;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Capability interface for whatever hosts the state machine.
///
/// The machine never owns domain state; it reads guards and invokes callbacks
/// through this trait.
pub trait Target: Send + Sync {
    /// Read a guard by name. `None` means the guard is not defined.
    fn guard(&self, name: &str) -> Option<Guard>;

    /// Look up a callback by name. `None` means no callable member exists.
    fn callback(&self, name: &str) -> Option<Callback>;

    /// Human-readable name used in error messages.
    fn describe(&self) -> String {
        "target".to_string()
    }
}

/// In-memory target backed by name maps.
///
/// Guards can be replaced after the machine is built, which is how a host
/// flips a guard between two sends.
///
/// # Example
///
/// ```rust
/// use statewise::core::{MapTarget, Target};
/// use serde_json::json;
///
/// let target = MapTarget::new("heater")
///     .with_guard("hasPower", true)
///     .with_callback("warmUp", |_ctx| json!("warm"));
///
/// assert!(target.guard("hasPower").is_some());
/// assert!(target.callback("warmUp").is_some());
/// target.set_guard("hasPower", false);
/// assert!(!target.guard("hasPower").unwrap().check("off"));
/// ```
#[derive(Debug, Default)]
pub struct MapTarget {
    name: String,
    guards: RwLock<HashMap<String, Guard>>,
    callbacks: RwLock<HashMap<String, Callback>>,
}

impl MapTarget {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_guard(self, name: impl Into<String>, guard: impl Into<Guard>) -> Self {
        self.set_guard(name, guard);
        self
    }

    pub fn with_callback<F, R>(self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&CallbackContext) -> R + Send + Sync + 'static,
        R: Into<Settle>,
    {
        self.set_callback(name, Callback::new(func));
        self
    }

    pub fn set_guard(&self, name: impl Into<String>, guard: impl Into<Guard>) {
        self.guards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), guard.into());
    }

    pub fn set_callback(&self, name: impl Into<String>, callback: Callback) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), callback);
    }

    pub fn remove_guard(&self, name: &str) -> Option<Guard> {
        self.guards
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }
}

impl Target for MapTarget {
    fn guard(&self, name: &str) -> Option<Guard> {
        self.guards
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn callback(&self, name: &str) -> Option<Callback> {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn describe(&self) -> String {
        if self.name.is_empty() {
            "target".to_string()
        } else {
            self.name.clone()
        }
    }
}
