//! # Entity Contract
//!
//! The repository is parameterized over caller-defined record types. An
//! implementation of [`Entity`] tells the layer two things: how to project
//! the primary key out of a record, and how to read a named attribute so
//! that parameter-bound selections can be evaluated against it.

use std::fmt::Debug;
use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A caller-defined record type persistable through a [`Repository`].
///
/// Entities are owned by the caller, not by the repository; the layer only
/// ever clones them in and out of the backing store.
///
/// [`Repository`]: crate::Repository
pub trait Entity: Clone + Send + Sync + 'static {
    /// Primary key type
    type Key: Clone + Eq + Hash + Debug + Send + Sync + 'static;

    /// Storage name for this entity kind (table, collection, ...)
    const KIND: &'static str;

    /// Project the primary key out of the record
    fn key(&self) -> Self::Key;

    /// Read a named attribute for parameter binding.
    ///
    /// Returns `None` when the entity has no attribute of that name; a
    /// present-but-null attribute is `Some(Value::Null)`.
    fn attribute(&self, name: &str) -> Option<Value>;
}

/// Attribute value bound into a parameterized selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(7), Value::Int(7));
        assert_eq!(Value::from("open"), Value::Text("open".to_string()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some(3.5)), Value::Float(3.5));
    }

    #[test]
    fn test_null_equals_null() {
        assert_eq!(Value::Null, Value::Null);
        assert_ne!(Value::Null, Value::Int(0));
    }
}
