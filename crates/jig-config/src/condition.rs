//! Conditions: parsed Boolean expressions over `(field, pattern)` leaves.
//!
//! A condition is built from clauses, each a pattern string attached to a
//! field (or to an explicit `field:` retarget for positional clauses).
//! Pattern strings follow a small stable grammar:
//!
//! ```text
//! pattern   := or_term ( " or " or_term )*
//! or_term   := "not " atom | atom
//! atom      := [field_name ":"] literal
//! literal   := any string, may contain "*" wildcards
//! ```
//!
//! `" or "` and a leading `"not "` are lexical; reserved substrings inside
//! a literal are the ingestion layer's problem. An atom's `field:` prefix
//! retargets the term when the prefix names a registered field; otherwise
//! the whole atom (colon included) is the literal, so path-like literals
//! survive. Multiple clauses AND together. The empty condition matches
//! everything.
//!
//! Negation binds to the leaf: a `not` term whose tested value is absent
//! still resolves through the nil policy, exactly like a positive term.
//! Hoisting the nil policy above the negation would make `not P2` fail at
//! every scope that does not pin the field, which inverts sibling
//! detection during remove handling.

use crate::error::{ConfigError, Result};
use crate::field::Field;
use crate::value::ValueSet;
use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;
use std::sync::RwLock;

/// Result of testing a value that is absent from both maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NilMatch {
    /// Absent data is a wildcard: the leaf matches.
    MatchesAny,
    /// Absent data fails the leaf.
    Fails,
}

/// One input clause for [`Condition::new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// `{ field_name → pattern_string }` pair.
    Keyed { field: String, pattern: String },
    /// Array-slot entry; the pattern must carry a `field:` retarget.
    Positional { pattern: String },
}

impl Clause {
    pub fn keyed(field: impl Into<String>, pattern: impl Into<String>) -> Clause {
        Clause::Keyed {
            field: field.into(),
            pattern: pattern.into(),
        }
    }

    pub fn positional(pattern: impl Into<String>) -> Clause {
        Clause::Positional {
            pattern: pattern.into(),
        }
    }
}

/// Every field tested by any condition parsed so far, process-wide.
///
/// Grow-only; populated during parsing and snapshotted by the evaluator.
/// A field mentioned by no condition cannot influence any block decision,
/// so the evaluator skips accumulating it.
static ALL_FIELDS_TESTED: Lazy<RwLock<FxHashSet<Field>>> =
    Lazy::new(|| RwLock::new(FxHashSet::default()));

/// Snapshot of the process-wide tested-field set.
pub fn all_fields_tested() -> FxHashSet<Field> {
    ALL_FIELDS_TESTED
        .read()
        .expect("tested-field registry poisoned")
        .clone()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CondExpr {
    /// A single `field (not)? pattern` test.
    Match {
        field: Field,
        pattern: String,
        negated: bool,
    },
    /// Disjunction of terms from one ` or `-joined pattern string.
    AnyOf(Vec<CondExpr>),
}

/// A parsed condition: the conjunction of its clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<CondExpr>,
    fields_tested: FxHashSet<Field>,
}

impl Condition {
    /// Parse a condition from clauses.
    ///
    /// Fails with [`ConfigError::UnknownField`] when a clause names an
    /// unregistered field and [`ConfigError::BadCondition`] when a
    /// positional clause carries no `field:` retarget.
    pub fn new(clauses: impl IntoIterator<Item = Clause>) -> Result<Condition> {
        let mut parsed = Vec::new();
        let mut tested = FxHashSet::default();
        for clause in clauses {
            parsed.push(parse_clause(&clause, &mut tested)?);
        }
        ALL_FIELDS_TESTED
            .write()
            .expect("tested-field registry poisoned")
            .extend(tested.iter().copied());
        Ok(Condition {
            clauses: parsed,
            fields_tested: tested,
        })
    }

    /// The unconditional condition: no clauses, matches everything.
    pub fn always() -> Condition {
        Condition {
            clauses: Vec::new(),
            fields_tested: FxHashSet::default(),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Fields appearing in any leaf of this condition.
    pub fn fields_tested(&self) -> &FxHashSet<Field> {
        &self.fields_tested
    }

    /// Evaluate against a value map and an optional scope.
    ///
    /// When a scope is supplied, a leaf on a scope field resolves from it
    /// alone; every other leaf resolves from `values`. An absent tested
    /// value yields `nil`.
    pub fn matches_values(
        &self,
        values: &ValueSet,
        scope: Option<&ValueSet>,
        nil: NilMatch,
    ) -> bool {
        self.clauses
            .iter()
            .all(|clause| eval(clause, values, scope, nil))
    }

    /// Find the first scope this condition applies to.
    ///
    /// A scope is considered only if every field it pins is tested by the
    /// condition; others are skipped. Returns the index of the first
    /// considered scope for which [`Self::matches_values`] holds.
    pub fn matches_scope_and_values(
        &self,
        values: &ValueSet,
        scopes: &[ValueSet],
        nil: NilMatch,
    ) -> Option<usize> {
        scopes.iter().position(|scope| {
            scope.fields().all(|f| self.fields_tested.contains(&f))
                && self.matches_values(values, Some(scope), nil)
        })
    }

    /// True iff some scope in the list explicitly contradicts this
    /// condition.
    ///
    /// Absence of data is treated as a wildcard, so only a pinned value
    /// the condition rejects (scope says `projects=P1`, condition demands
    /// `projects=P2`) counts as a conflict. The evaluator leans on this
    /// from two angles: with the accumulated potential values split into
    /// per-field layers ("could this still match any sibling?"), and with
    /// the target's direct lineage ("does some level of the lineage rule
    /// us out?").
    pub fn has_conflicting_values(&self, scopes: &[ValueSet], values: &ValueSet) -> bool {
        scopes
            .iter()
            .any(|scope| !self.matches_values(values, Some(scope), NilMatch::MatchesAny))
    }
}

fn eval(expr: &CondExpr, values: &ValueSet, scope: Option<&ValueSet>, nil: NilMatch) -> bool {
    match expr {
        CondExpr::Match {
            field,
            pattern,
            negated,
        } => {
            let tested = if field.is_scope() && scope.is_some() {
                scope.and_then(|s| s.get(*field))
            } else {
                values.get(*field)
            };
            match tested {
                None => nil == NilMatch::MatchesAny,
                Some(value) => *negated != field.matches(value, pattern, true),
            }
        }
        CondExpr::AnyOf(terms) => terms.iter().any(|t| eval(t, values, scope, nil)),
    }
}

fn parse_clause(clause: &Clause, tested: &mut FxHashSet<Field>) -> Result<CondExpr> {
    let (default_field, pattern) = match clause {
        Clause::Keyed { field, pattern } => {
            let field = Field::lookup(field).ok_or_else(|| ConfigError::UnknownField {
                name: field.clone(),
            })?;
            (Some(field), pattern.as_str())
        }
        Clause::Positional { pattern } => (None, pattern.as_str()),
    };

    let mut terms = Vec::new();
    for raw in pattern.split(" or ") {
        let (negated, atom) = match raw.strip_prefix("not ") {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let (field, literal) = resolve_atom(atom, default_field)?;
        tested.insert(field);
        terms.push(CondExpr::Match {
            field,
            pattern: literal.to_string(),
            negated,
        });
    }
    // `split` yields at least one term, possibly the empty literal.
    if terms.len() == 1 {
        Ok(terms.pop().expect("single term"))
    } else {
        Ok(CondExpr::AnyOf(terms))
    }
}

fn resolve_atom(atom: &str, default_field: Option<Field>) -> Result<(Field, String)> {
    if let Some((prefix, rest)) = atom.split_once(':') {
        if let Some(field) = Field::lookup(prefix) {
            return Ok((field, rest.to_string()));
        }
        if default_field.is_none() {
            return Err(ConfigError::UnknownField {
                name: prefix.to_string(),
            });
        }
    }
    match default_field {
        Some(field) => Ok((field, atom.to_string())),
        None => Err(ConfigError::BadCondition {
            detail: format!("positional clause `{atom}` names no field"),
        }),
    }
}
