//! Query evaluation: the fixed-point walk over a block list.
//!
//! A query names a target scope chain (with per-level inheritance flags)
//! and asks which blocks are effectively enabled there. The walk keeps
//! two value maps side by side: `target_values`, accumulated under the
//! restricted target chain, and `global_values`, accumulated under the
//! full potential inheritance. Both feed condition evaluation; whenever a
//! block's global fate is decided the scan restarts so blocks skipped
//! earlier can see the new state.
//!
//! The delicate case is a `Remove` that applies to a *sibling* of the
//! target (global says remove, target chain contradicts the condition).
//! Project-file formats are additive, so the removed values cannot simply
//! disappear at the parent and reappear here; instead the sibling's
//! remove is marked out of scope for the target and a synthetic `Add`
//! block re-supplies exactly the values the remove strips from the global
//! state, in the remove's position.

use crate::block::{Block, Operation};
use crate::condition::{self, Condition, NilMatch};
use crate::field::Field;
use crate::value::{Value, ValueSet};
use rustc_hash::FxHashSet;
use std::borrow::Cow;

/// One level of a query's target lineage.
#[derive(Debug, Clone)]
pub struct ScopeLevel {
    scope: ValueSet,
    inherit: bool,
}

impl ScopeLevel {
    /// `inherit` says whether this level inherits from its parent (the
    /// preceding level, or the global root for the first level).
    pub fn new(scope: ValueSet, inherit: bool) -> ScopeLevel {
        ScopeLevel { scope, inherit }
    }

    pub fn scope(&self) -> &ValueSet {
        &self.scope
    }

    pub fn inherit(&self) -> bool {
        self.inherit
    }
}

/// A scoped configuration query over an ordered block list.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    source_blocks: &'a [Block],
    target_scopes: Vec<ValueSet>,
    global_scopes: Vec<ValueSet>,
    initial_values: ValueSet,
}

impl<'a> Query<'a> {
    /// Build a query from a target lineage.
    ///
    /// The target chain is the final level preceded by the contiguous run
    /// of ancestors it inherits through; the root empty scope joins it
    /// when every level inherits. The global chain is the full lineage
    /// under the root scope, regardless of flags.
    pub fn new(
        source_blocks: &'a [Block],
        levels: &[ScopeLevel],
        initial_values: ValueSet,
    ) -> Query<'a> {
        Query {
            source_blocks,
            target_scopes: target_chain(levels),
            global_scopes: global_chain(levels),
            initial_values,
        }
    }

    /// Build a query from pre-derived scope chains.
    pub fn from_parts(
        source_blocks: &'a [Block],
        target_scopes: Vec<ValueSet>,
        global_scopes: Vec<ValueSet>,
        initial_values: ValueSet,
    ) -> Query<'a> {
        Query {
            source_blocks,
            target_scopes,
            global_scopes,
            initial_values,
        }
    }

    /// Widen the global chain with scopes above the query's own lineage,
    /// for evaluating a sub-tree relative to an outer root. Only the
    /// global chain changes; target scoping is untouched.
    pub fn with_global_root(mut self, roots: &[ValueSet]) -> Query<'a> {
        let at = usize::from(self.global_scopes.first().is_some_and(|s| s.is_empty()));
        self.global_scopes.splice(at..at, roots.iter().cloned());
        self
    }

    pub fn target_scopes(&self) -> &[ValueSet] {
        &self.target_scopes
    }

    pub fn global_scopes(&self) -> &[ValueSet] {
        &self.global_scopes
    }

    /// Evaluate the query into the ordered list of enabled blocks.
    ///
    /// Each returned block carries `Add` or `Remove`, the empty
    /// condition, and its source data; replaying them in order (see
    /// [`crate::apply_blocks`]) yields the effective values at the
    /// target. Pure: same inputs, same output.
    pub fn evaluate(&self) -> Vec<Block> {
        let tested = condition::all_fields_tested();
        let mut target_values = self.initial_values.clone();
        let mut global_values = self.initial_values.clone();
        let mut slots: Vec<Slot<'a>> = self
            .source_blocks
            .iter()
            .map(|block| Slot {
                target: Decision::Unknown,
                global: Decision::Unknown,
                block: Cow::Borrowed(block),
            })
            .collect();

        tracing::debug!(
            blocks = slots.len(),
            target_scopes = self.target_scopes.len(),
            global_scopes = self.global_scopes.len(),
            "evaluating query"
        );

        let mut i = 0;
        while i < slots.len() {
            if slots[i].global != Decision::Unknown {
                i += 1;
                continue;
            }
            let block = slots[i].block.as_ref();
            let (global_op, target_op) = test_block(
                block,
                &self.global_scopes,
                &global_values,
                &self.target_scopes,
                &target_values,
            );
            tracing::trace!(block = i, ?global_op, ?target_op, "tested block");

            match (global_op, target_op) {
                (Decision::Unknown, Decision::Unknown) => {
                    i += 1;
                }
                (Decision::Remove, Decision::Add) => {
                    // Sibling remove: out of scope here, compensated by a
                    // synthetic add in its place.
                    let synthetic = compensation_block(&slots, i, &target_values);
                    tracing::trace!(block = i, added = synthetic.data().len(), "compensating");
                    let data = block.data().clone();
                    slots[i].target = Decision::OutOfScope;
                    slots[i].global = Decision::Remove;
                    apply_data(&mut target_values, Operation::Add, synthetic.data(), &tested);
                    apply_data(&mut global_values, Operation::Remove, &data, &tested);
                    slots.insert(
                        i,
                        Slot {
                            target: Decision::Add,
                            global: Decision::OutOfScope,
                            block: Cow::Owned(synthetic),
                        },
                    );
                    i = 0;
                }
                (Decision::Add, Decision::Unknown) => {
                    let data = block.data().clone();
                    slots[i].global = Decision::Add;
                    apply_data(&mut global_values, Operation::Add, &data, &tested);
                    i = 0;
                }
                (Decision::Add, Decision::Add) => {
                    let data = block.data().clone();
                    slots[i].target = Decision::Add;
                    slots[i].global = Decision::Add;
                    apply_data(&mut target_values, Operation::Add, &data, &tested);
                    apply_data(&mut global_values, Operation::Add, &data, &tested);
                    i = 0;
                }
                (Decision::Remove, Decision::Remove) => {
                    let data = block.data().clone();
                    slots[i].target = Decision::Remove;
                    slots[i].global = Decision::Remove;
                    apply_data(&mut target_values, Operation::Remove, &data, &tested);
                    apply_data(&mut global_values, Operation::Remove, &data, &tested);
                    i = 0;
                }
                (global_op, target_op) => {
                    unreachable!("illegal block decision ({global_op:?}, {target_op:?})")
                }
            }
        }

        let enabled: Vec<Block> = slots
            .iter()
            .filter_map(|slot| {
                let operation = match slot.target {
                    Decision::Add => Operation::Add,
                    Decision::Remove => Operation::Remove,
                    Decision::Unknown | Decision::OutOfScope => return None,
                };
                Some(Block::new(
                    operation,
                    Condition::always(),
                    slot.block.data().clone(),
                ))
            })
            .collect();
        tracing::debug!(enabled = enabled.len(), "query evaluated");
        enabled
    }
}

/// Fate of a block at one of the two accumulation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// Not yet decided; revisit after more state accumulates.
    Unknown,
    Add,
    Remove,
    /// Terminal: never applies at this level.
    OutOfScope,
}

struct Slot<'a> {
    target: Decision,
    global: Decision,
    block: Cow<'a, Block>,
}

/// Decide a block against both accumulation levels.
fn test_block(
    block: &Block,
    global_scopes: &[ValueSet],
    global_values: &ValueSet,
    target_scopes: &[ValueSet],
    target_values: &ValueSet,
) -> (Decision, Decision) {
    let condition = block.condition();
    match block.operation() {
        Operation::Add => {
            // Global matching is open-world: an unpinned scope field may
            // still be satisfied somewhere below, so absence matches.
            // Target matching is closed-world: the block applies at the
            // queried scope only if some level of the target chain pins
            // (or some accumulated value supplies) everything the
            // condition demands. Anything looser would pull a
            // `projects:P2` block into its siblings' output.
            if condition
                .matches_scope_and_values(global_values, global_scopes, NilMatch::MatchesAny)
                .is_none()
            {
                // Precondition not satisfied anywhere yet; may come into
                // scope as more values accumulate.
                (Decision::Unknown, Decision::Unknown)
            } else if condition
                .matches_scope_and_values(target_values, target_scopes, NilMatch::Fails)
                .is_none()
            {
                (Decision::Add, Decision::Unknown)
            } else {
                (Decision::Add, Decision::Add)
            }
        }
        Operation::Remove => {
            // First probe: the accumulated potential values, one field
            // per layer. A contradiction there means the remove cannot
            // yet be shown to apply anywhere. Second probe: the direct
            // lineage; a contradiction there means the remove belongs to
            // a sibling. The argument shapes differ deliberately.
            let layers = global_values.layers();
            if condition.has_conflicting_values(&layers, global_values) {
                (Decision::Unknown, Decision::Unknown)
            } else if !condition.has_conflicting_values(global_scopes, global_values) {
                (Decision::Remove, Decision::Remove)
            } else {
                (Decision::Remove, Decision::Add)
            }
        }
    }
}

/// Build the synthetic add that offsets a sibling remove.
///
/// For each field the remove names, reconstruct its current global value
/// from the decided slots, subtract the remove's patterns, and re-supply
/// every concretely removed item the target does not already hold.
fn compensation_block(slots: &[Slot<'_>], index: usize, target_values: &ValueSet) -> Block {
    let remove = slots[index].block.as_ref();
    let mut synthetic = Block::unconditional(Operation::Add);
    for (field, patterns) in remove.data().iter() {
        let current = fetch_field(slots, field);
        let (_, removed) = field.remove(current.as_ref(), patterns);
        for item in removed {
            let retained = target_values
                .get(field)
                .is_some_and(|value| field.matches(value, &item, true));
            if !retained {
                synthetic.receive(field, item);
            }
        }
    }
    synthetic
}

/// Current global value of one field across the decided results.
///
/// Reconstructed from the slots rather than read from `global_values`:
/// the accumulator is filtered to tested fields, while compensation must
/// see every field the remove names. Synthetic slots are globally out of
/// scope and the slot under decision is still unknown, so neither
/// contributes.
fn fetch_field(slots: &[Slot<'_>], field: Field) -> Option<Value> {
    let mut current: Option<Value> = None;
    for slot in slots {
        let Some(value) = slot.block.data().get(field) else {
            continue;
        };
        match slot.global {
            Decision::Add => current = Some(field.merge(current.as_ref(), value)),
            Decision::Remove => current = field.remove(current.as_ref(), value).0,
            Decision::Unknown | Decision::OutOfScope => {}
        }
    }
    current
}

/// Merge or subtract a block's data into an accumulator, restricted to
/// fields some condition tests (others cannot influence any decision).
fn apply_data(values: &mut ValueSet, op: Operation, data: &ValueSet, tested: &FxHashSet<Field>) {
    for (field, value) in data.iter() {
        if !tested.contains(&field) {
            continue;
        }
        match op {
            Operation::Add => values.merge_value(field, value),
            Operation::Remove => {
                values.remove_value(field, value);
            }
        }
    }
}

fn target_chain(levels: &[ScopeLevel]) -> Vec<ValueSet> {
    let start = match levels.len() {
        0 => 0,
        n => {
            let mut j = n - 1;
            while j > 0 && levels[j].inherit {
                j -= 1;
            }
            j
        }
    };
    let mut chain = Vec::with_capacity(levels.len() - start + 1);
    if levels.iter().all(|level| level.inherit) {
        chain.push(ValueSet::new());
    }
    chain.extend(levels[start..].iter().map(|level| level.scope.clone()));
    chain
}

fn global_chain(levels: &[ScopeLevel]) -> Vec<ValueSet> {
    let mut chain = Vec::with_capacity(levels.len() + 1);
    chain.push(ValueSet::new());
    chain.extend(levels.iter().map(|level| level.scope.clone()));
    chain
}
