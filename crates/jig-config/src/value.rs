//! Field values and ordered value maps.
//!
//! A [`ValueSet`] serves two roles that share one shape: the accumulated
//! `field → value` state of an evaluation, and a *scope* (a map selecting
//! a point in the project hierarchy, e.g. `{workspaces: W1}`). Keys are
//! interned [`Field`] handles, never raw strings, and insertion order is
//! preserved.

use crate::field::Field;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single field value: one scalar or an ordered collection of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Scalar(String),
    Items(Vec<String>),
}

impl Value {
    pub fn scalar(s: impl Into<String>) -> Value {
        Value::Scalar(s.into())
    }

    pub fn items<I, S>(items: I) -> Value
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Items(items.into_iter().map(Into::into).collect())
    }

    /// View the value as a slice of items; a scalar is a one-item slice.
    pub fn as_items(&self) -> &[String] {
        match self {
            Value::Scalar(s) => std::slice::from_ref(s),
            Value::Items(v) => v,
        }
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::Items(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Value::Scalar(_) => false,
            Value::Items(v) => v.is_empty(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Scalar(s.to_string())
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Value {
        Value::Items(v)
    }
}

/// An insertion-ordered `Field → Value` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueSet {
    entries: IndexMap<Field, Value>,
}

impl ValueSet {
    pub fn new() -> ValueSet {
        ValueSet::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, field: Field) -> Option<&Value> {
        self.entries.get(&field)
    }

    /// Items stored for `field`, or the empty slice when absent.
    pub fn items(&self, field: Field) -> &[String] {
        self.get(field).map(Value::as_items).unwrap_or_default()
    }

    /// Insert or overwrite without merge semantics.
    pub fn set(&mut self, field: Field, value: impl Into<Value>) {
        self.entries.insert(field, value.into());
    }

    /// Combine `incoming` into this map through the field's merge
    /// operator.
    pub fn merge_value(&mut self, field: Field, incoming: &Value) {
        let merged = field.merge(self.entries.get(&field), incoming);
        self.entries.insert(field, merged);
    }

    /// Subtract items matching `patterns` through the field's remove
    /// operator. Returns the concrete items removed; an emptied entry is
    /// dropped from the map.
    pub fn remove_value(&mut self, field: Field, patterns: &Value) -> Vec<String> {
        let (new, removed) = field.remove(self.entries.get(&field), patterns);
        match new {
            Some(value) => {
                self.entries.insert(field, value);
            }
            None => {
                self.entries.shift_remove(&field);
            }
        }
        removed
    }

    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &Value)> {
        self.entries.iter().map(|(f, v)| (*f, v))
    }

    /// Split the map into single-entry maps, one per field, in insertion
    /// order. This is the "layers of potential values" shape the
    /// evaluator feeds to conflict detection: each accumulated field is
    /// considered in isolation, with every other field unconstrained.
    pub fn layers(&self) -> Vec<ValueSet> {
        self.entries
            .iter()
            .map(|(f, v)| {
                let mut layer = ValueSet::new();
                layer.entries.insert(*f, v.clone());
                layer
            })
            .collect()
    }
}

impl FromIterator<(Field, Value)> for ValueSet {
    fn from_iter<I: IntoIterator<Item = (Field, Value)>>(iter: I) -> ValueSet {
        ValueSet {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Extend<(Field, Value)> for ValueSet {
    fn extend<I: IntoIterator<Item = (Field, Value)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}
