//! Per-row values routed through dataframe columns
//!
//! The engine never interprets a [`Value`]; it only routes, caches, and
//! counts them. Payloads owned by an external collaborator travel as a
//! shared [`Handle`], so the cache borrows them for its lifetime while the
//! producer keeps responsibility for the final release.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tensor::Tensor;

/// Shared handle to an externally owned payload
#[derive(Clone)]
pub struct Handle(Arc<dyn Any + Send + Sync>);

impl Handle {
    /// Wrap a payload in a shared handle
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self(Arc::new(payload))
    }

    /// Wrap an already shared payload
    pub fn from_arc<T: Any + Send + Sync>(payload: Arc<T>) -> Self {
        Self(payload)
    }

    /// Borrow the payload if it has type `T`
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }

    /// Number of strong references to the payload
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:p})", Arc::as_ptr(&self.0))
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// An opaque unit of per-row data
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// No data (e.g. a missing CSV field)
    #[default]
    Null,

    /// Boolean
    Bool(bool),

    /// Signed integer
    Int(i64),

    /// Floating point
    Float(f64),

    /// Shared UTF-8 string
    Str(Arc<str>),

    /// Shared dense tensor
    Tensor(Arc<Tensor>),

    /// Composite value produced by a tuple column
    Tuple(Arc<[Value]>),

    /// Externally owned payload
    Handle(Handle),
}

impl Value {
    /// Build a tuple value
    pub fn tuple(members: Vec<Value>) -> Self {
        Value::Tuple(members.into())
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tensor(_) => "tensor",
            Value::Tuple(_) => "tuple",
            Value::Handle(_) => "handle",
        }
    }

    /// Check for [`Value::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the integer payload
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get a numeric payload widened to `f64`
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Bool(v) => Some(f64::from(u8::from(*v))),
            _ => None,
        }
    }

    /// Get the string payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get the tensor payload
    pub fn as_tensor(&self) -> Option<&Arc<Tensor>> {
        match self {
            Value::Tensor(t) => Some(t),
            _ => None,
        }
    }

    /// Get the tuple members
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(members) => Some(members),
            _ => None,
        }
    }

    /// Get the external handle
    pub fn as_handle(&self) -> Option<&Handle> {
        match self {
            Value::Handle(h) => Some(h),
            _ => None,
        }
    }

    /// Get one member of a tuple value
    pub fn member(&self, index: usize) -> Result<&Value> {
        let members = self.as_tuple().ok_or_else(|| {
            Error::TypeMismatch(format!("expected tuple, found {}", self.kind()))
        })?;
        members
            .get(index)
            .ok_or_else(|| Error::out_of_range(index, members.len()))
    }

    /// Get the integer payload or fail with a type mismatch
    pub fn expect_int(&self) -> Result<i64> {
        self.as_int()
            .ok_or_else(|| Error::TypeMismatch(format!("expected int, found {}", self.kind())))
    }

    /// Get the tensor payload or fail with a type mismatch
    pub fn expect_tensor(&self) -> Result<&Arc<Tensor>> {
        self.as_tensor()
            .ok_or_else(|| Error::TypeMismatch(format!("expected tensor, found {}", self.kind())))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.into())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v.into())
    }
}

impl From<Tensor> for Value {
    fn from(t: Tensor) -> Self {
        Value::Tensor(Arc::new(t))
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Self {
        Value::Handle(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_of_tuple() {
        let value = Value::tuple(vec![Value::Int(1), Value::from("b")]);
        assert_eq!(value.member(0).unwrap(), &Value::Int(1));
        assert_eq!(value.member(1).unwrap().as_str(), Some("b"));
        assert!(matches!(
            value.member(2),
            Err(Error::IndexOutOfRange { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_member_of_scalar_is_type_mismatch() {
        assert!(matches!(Value::Int(3).member(0), Err(Error::TypeMismatch(_))));
    }

    #[test]
    fn test_handle_equality_is_identity() {
        let payload = Arc::new(vec![1u8, 2, 3]);
        let a = Handle::from_arc(payload.clone());
        let b = Handle::from_arc(payload);
        let c = Handle::new(vec![1u8, 2, 3]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.downcast_ref::<Vec<u8>>().map(Vec::len), Some(3));
        assert_eq!(a.strong_count(), 2);
    }
}
