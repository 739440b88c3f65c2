//! Scoped configuration queries for the jig project generator.
//!
//! A jig script layers *configuration blocks* over nested scopes (global
//! → workspace → project → per-configuration) and may add or remove
//! values conditionally via `when` clauses. This crate answers the
//! question the emitters ask: *what is the effective set of values for a
//! field at a given scope, with or without inheritance?*
//!
//! # Key Features
//!
//! - **Strictly additive output**: IDE project formats generally cannot
//!   remove an inherited value, so a remove declared by a sibling scope
//!   is suppressed at the parent and re-added where it still applies,
//!   via synthetic compensation blocks
//! - **Interned fields**: values and scopes are keyed by [`Field`]
//!   handles with per-kind merge/remove/match semantics
//! - **Deterministic**: a query is a pure function of its inputs
//!
//! # Architecture
//!
//! The crate is organized around these concepts:
//!
//! - [`Field`]: interned field descriptor ([`FieldKind`] owns the value
//!   semantics)
//! - [`Condition`]: Boolean expression tree over `(field, pattern)`
//!   leaves, built from [`Clause`]s
//! - [`Block`]: an `(operation, condition, data)` record
//! - [`Query`]: scope chains plus the fixed-point evaluator
//! - [`apply_blocks`]: replay of an evaluated block list for an emitter
//!
//! # Example
//!
//! ```rust,no_run
//! use jig_config::{
//!     apply_blocks, Block, Clause, Condition, Field, FieldKind, FieldSpec, Operation, Query,
//!     ScopeLevel, Value, ValueSet,
//! };
//!
//! # fn main() -> Result<(), jig_config::ConfigError> {
//! let projects = Field::define(FieldSpec::new("projects", FieldKind::Set).scope())?;
//! let defines = Field::define(FieldSpec::new("defines", FieldKind::List))?;
//!
//! // defines { 'A', 'B' }; when projects:P2 → removeDefines 'B'
//! let mut data = ValueSet::new();
//! data.set(defines, Value::items(["A", "B"]));
//! let blocks = vec![
//!     Block::new(Operation::Add, Condition::always(), data),
//!     Block::new(Operation::Remove, Condition::new([Clause::keyed("projects", "P2")])?, {
//!         let mut d = ValueSet::new();
//!         d.set(defines, Value::items(["B"]));
//!         d
//!     }),
//! ];
//!
//! let mut p1 = ValueSet::new();
//! p1.set(projects, Value::scalar("P1"));
//! let levels = [ScopeLevel::new(p1, true)];
//! let enabled = Query::new(&blocks, &levels, ValueSet::new()).evaluate();
//! let effective = apply_blocks(ValueSet::new(), &enabled);
//! # Ok(())
//! # }
//! ```

mod apply;
mod block;
mod condition;
mod error;
mod field;
mod pattern;
mod query;
mod value;

pub use apply::apply_blocks;

pub use block::{Block, Operation};

pub use condition::{all_fields_tested, Clause, Condition, NilMatch};

pub use error::{ConfigError, Result};

pub use field::{Field, FieldKind, FieldSpec};

pub use query::{Query, ScopeLevel};

pub use value::{Value, ValueSet};
