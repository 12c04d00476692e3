//! Small helpers shared by the definition compiler and the runtime.
//!
//! Most of these exist because the definition schema is dynamic: values may be
//! a scalar or a list, guard values may be any JSON value, and callbacks may
//! return a value, a pending future, or fail outright.

use crate::core::Settle;
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::{Map, Value};

/// Dynamic truthiness of a stored value.
///
/// `null`, `false`, `0`, `NaN` and the empty string are falsy; everything else
/// (including empty arrays and objects) is truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Camelize a string on `.`, `-`, `_` and whitespace boundaries, then
/// capitalize the first letter.
///
/// ```
/// use statewise::utils::capital_camelize;
///
/// assert_eq!(capital_camelize("hello.world"), "HelloWorld");
/// assert_eq!(capital_camelize("big-funThings"), "BigFunThings");
/// ```
pub fn capital_camelize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut upper_next = true;

    for c in input.chars() {
        if c == '.' || c == '-' || c == '_' || c.is_whitespace() {
            upper_next = true;
            continue;
        }
        if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}

/// Wrap a scalar in a one-element list; lists pass through and `null` becomes
/// an empty list.
pub fn to_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Turn whatever a callback produced into a future.
///
/// Synchronous values resolve immediately, synchronous errors reject
/// immediately, and pending futures are adopted as they are.
pub fn with_promise(settle: Settle) -> BoxFuture<'static, Result<Value, Value>> {
    match settle {
        Settle::Value(value) => future::ready(Ok(value)).boxed(),
        Settle::Error(reason) => future::ready(Err(reason)).boxed(),
        Settle::Pending(fut) => fut,
    }
}

/// Build a rejecting callback outcome.
pub fn reject(reason: impl Into<Value>) -> Settle {
    Settle::Error(reason.into())
}

/// Keys of an object whose values are not `null`, in declaration order.
pub fn own_properties_of(object: &Map<String, Value>) -> Vec<&str> {
    object
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, _)| k.as_str())
        .collect()
}

/// The value of the first listed key that is present and not `null`.
pub fn get_first<'a>(object: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|v| !v.is_null())
}

pub fn contains<T: PartialEq + ?Sized, U: AsRef<T>>(items: &[U], item: &T) -> bool {
    items.iter().any(|i| i.as_ref() == item)
}
