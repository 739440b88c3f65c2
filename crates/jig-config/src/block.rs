//! Configuration blocks: conditional bundles of field assignments.

use crate::condition::Condition;
use crate::field::Field;
use crate::value::{Value, ValueSet};
use serde::{Deserialize, Serialize};

/// What a block does to the fields it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Merge the block's data into the accumulated values.
    Add,
    /// Subtract items matching the block's data from the accumulated
    /// values.
    Remove,
}

/// An `(operation, condition, data)` record.
///
/// Blocks are ordered by declaration in the source script; that order is
/// preserved through evaluation. Compensation blocks synthesized during
/// evaluation carry the empty condition and data computed from other
/// blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    operation: Operation,
    condition: Condition,
    data: ValueSet,
}

impl Block {
    pub fn new(operation: Operation, condition: Condition, data: ValueSet) -> Block {
        Block {
            operation,
            condition,
            data,
        }
    }

    /// An empty-condition block with no data yet; values arrive through
    /// [`Block::receive`].
    pub fn unconditional(operation: Operation) -> Block {
        Block::new(operation, Condition::always(), ValueSet::new())
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn condition(&self) -> &Condition {
        &self.condition
    }

    pub fn data(&self) -> &ValueSet {
        &self.data
    }

    /// Append a single value into `data[field]` through the field's merge
    /// operator.
    pub fn receive(&mut self, field: Field, value: impl Into<String>) {
        self.data
            .merge_value(field, &Value::Scalar(value.into()));
    }
}
