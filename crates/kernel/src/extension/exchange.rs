//! Data threaded through an extension point.

use serde_json::{Map, Value};

/// A value that may not have been set yet.
///
/// Distinct from `Option<Value>`: a result of JSON `null` is a real result,
/// while `Unset` means "nobody produced one".
#[derive(Debug)]
pub enum Slot<T> {
    Unset,
    Set(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unset
    }
}

impl<T> Slot<T> {
    pub fn is_set(&self) -> bool {
        matches!(self, Slot::Set(_))
    }

    pub fn set(&mut self, value: T) {
        *self = Slot::Set(value);
    }

    pub fn clear(&mut self) {
        *self = Slot::Unset;
    }

    /// Take the value out, leaving the slot unset.
    pub fn take(&mut self) -> Option<T> {
        match std::mem::take(self) {
            Slot::Set(value) => Some(value),
            Slot::Unset => None,
        }
    }

    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Slot::Set(value) => Some(value),
            Slot::Unset => None,
        }
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        match self {
            Slot::Set(value) => Some(value),
            Slot::Unset => None,
        }
    }
}

/// Arguments of an intercepted call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Positional argument `index` as a string.
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }

    /// Keyword argument as a string.
    pub fn str_kwarg(&self, key: &str) -> Option<&str> {
        self.kwargs.get(key).and_then(Value::as_str)
    }
}

/// Input and outcome of an intercepted call.
///
/// `-start` extensions may rewrite `args`/`kwargs`, set `result` to skip the
/// call, or set `error` to abort. `-end` extensions may rewrite `result` or
/// replace and clear `error`.
#[derive(Debug, Default)]
pub struct ExchangeRecord {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
    pub result: Slot<Value>,
    pub error: Slot<anyhow::Error>,
}

impl ExchangeRecord {
    pub fn new(call: CallArgs) -> Self {
        Self {
            args: call.args,
            kwargs: call.kwargs,
            result: Slot::Unset,
            error: Slot::Unset,
        }
    }

    /// Current arguments, as the operation will see them.
    pub fn call_args(&self) -> CallArgs {
        CallArgs {
            args: self.args.clone(),
            kwargs: self.kwargs.clone(),
        }
    }
}

/// Payload handed to every extension at a point.
///
/// `values` is free-form and shared by all implementations of the point.
/// Intercepted calls additionally carry an [`ExchangeRecord`].
#[derive(Debug, Default)]
pub struct ExtensionData {
    pub values: Map<String, Value>,
    pub(crate) exchange: Option<ExchangeRecord>,
}

impl ExtensionData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with_exchange(exchange: ExchangeRecord) -> Self {
        Self {
            values: Map::new(),
            exchange: Some(exchange),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// The call record, when the point wraps an intercepted call.
    pub fn exchange(&self) -> Option<&ExchangeRecord> {
        self.exchange.as_ref()
    }

    pub fn exchange_mut(&mut self) -> Option<&mut ExchangeRecord> {
        self.exchange.as_mut()
    }
}
