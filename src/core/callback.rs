//! Callback functions supplied by a target, and the normalization of
//! whatever they return.

use crate::definition::Phase;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of invoking a callback.
///
/// A callback may finish synchronously with a value, fail synchronously, or
/// hand back a future that settles later. `utils::with_promise` turns all three
/// into a single future shape.
pub enum Settle {
    /// Synchronous return value.
    Value(Value),
    /// Synchronous failure.
    Error(Value),
    /// Settles later.
    Pending(BoxFuture<'static, Result<Value, Value>>),
}

impl Settle {
    pub fn ok(value: impl Into<Value>) -> Self {
        Settle::Value(value.into())
    }

    pub fn pending<F>(fut: F) -> Self
    where
        F: Future<Output = Result<Value, Value>> + Send + 'static,
    {
        Settle::Pending(fut.boxed())
    }
}

impl From<Value> for Settle {
    fn from(value: Value) -> Self {
        Settle::Value(value)
    }
}

impl From<()> for Settle {
    fn from(_: ()) -> Self {
        Settle::Value(Value::Null)
    }
}

impl From<Result<Value, Value>> for Settle {
    fn from(result: Result<Value, Value>) -> Self {
        match result {
            Ok(value) => Settle::Value(value),
            Err(reason) => Settle::Error(reason),
        }
    }
}

impl fmt::Debug for Settle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Settle::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Settle::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Settle::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// What a callback is told about the transition invoking it.
#[derive(Clone, Debug)]
pub struct CallbackContext {
    pub event: String,
    pub from_state: String,
    pub to_state: String,
    pub phase: Phase,
    pub args: Vec<Value>,
}

/// A callable transition callback.
///
/// Cloning is cheap; the function is shared.
#[derive(Clone)]
pub struct Callback {
    func: Arc<dyn Fn(&CallbackContext) -> Settle + Send + Sync>,
}

impl Callback {
    /// Wrap any function whose return converts into a [`Settle`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use statewise::core::{Callback, Settle};
    /// use serde_json::json;
    ///
    /// let sync = Callback::new(|_ctx| json!("done"));
    /// let pending = Callback::new(|_ctx| Settle::pending(async { Ok(json!(1)) }));
    /// let failing = Callback::new(|_ctx| Err::<serde_json::Value, _>(json!("nope")));
    /// ```
    pub fn new<F, R>(func: F) -> Self
    where
        F: Fn(&CallbackContext) -> R + Send + Sync + 'static,
        R: Into<Settle>,
    {
        Callback {
            func: Arc::new(move |ctx| func(ctx).into()),
        }
    }

    pub fn invoke(&self, ctx: &CallbackContext) -> Settle {
        (self.func)(ctx)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

/// A callback as it appears in a state's lifecycle hook: either a name to be
/// resolved against the target, or a function attached directly.
#[derive(Clone, Debug)]
pub enum CallbackRef {
    Named(String),
    Inline(Callback),
}
