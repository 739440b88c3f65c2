//! Replay of an evaluated block list into a final value map.
//!
//! [`crate::Query::evaluate`] returns blocks stripped down to an
//! operation and data; this is the thin accumulator that replays them for
//! an emitter. Kept separate from evaluation on purpose: emitters that
//! stream blocks directly (or diff two results) skip it entirely.

use crate::block::{Block, Operation};
use crate::value::ValueSet;

/// Replay `blocks` in order over `initial`, merging adds and subtracting
/// removes through each field's own semantics.
pub fn apply_blocks(initial: ValueSet, blocks: &[Block]) -> ValueSet {
    let mut values = initial;
    for block in blocks {
        for (field, value) in block.data().iter() {
            match block.operation() {
                Operation::Add => values.merge_value(field, value),
                Operation::Remove => {
                    values.remove_value(field, value);
                }
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Condition;
    use crate::field::{Field, FieldKind, FieldSpec};
    use crate::value::Value;

    fn defines() -> Field {
        Field::define(FieldSpec::new("defines", FieldKind::List)).unwrap()
    }

    fn block(op: Operation, field: Field, items: &[&str]) -> Block {
        let mut data = ValueSet::new();
        data.set(field, Value::items(items.iter().copied()));
        Block::new(op, Condition::always(), data)
    }

    #[test]
    fn adds_then_removes_in_order() {
        let defines = defines();
        let blocks = vec![
            block(Operation::Add, defines, &["A", "B", "C"]),
            block(Operation::Remove, defines, &["B"]),
            block(Operation::Add, defines, &["D"]),
        ];
        let result = apply_blocks(ValueSet::new(), &blocks);
        assert_eq!(result.items(defines), &["A", "C", "D"]);
    }

    #[test]
    fn readding_a_removed_value_restores_it() {
        let defines = defines();
        let blocks = vec![
            block(Operation::Add, defines, &["A", "B"]),
            block(Operation::Remove, defines, &["B"]),
            block(Operation::Add, defines, &["B"]),
        ];
        let result = apply_blocks(ValueSet::new(), &blocks);
        assert_eq!(result.items(defines), &["A", "B"]);
    }

    #[test]
    fn initial_values_seed_the_replay() {
        let defines = defines();
        let mut initial = ValueSet::new();
        initial.set(defines, Value::items(["SEED"]));
        let blocks = vec![block(Operation::Add, defines, &["A"])];
        let result = apply_blocks(initial, &blocks);
        assert_eq!(result.items(defines), &["SEED", "A"]);
    }
}
