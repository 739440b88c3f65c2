//! Field registry and per-kind value operators.
//!
//! A [`Field`] is a cheap interned handle into a process-wide registry.
//! Handles with the same name compare equal; kind and scope flag are fixed
//! at registration. The registry is grow-only: it is populated while the
//! ingestion layer registers its schema and parses conditions, and read
//! during query evaluation.
//!
//! The field's kind owns the merge/remove/match semantics for its values.
//! The set of kinds is closed and small, so behavior is dispatched with a
//! `match` rather than a trait object.

use crate::error::{ConfigError, Result};
use crate::pattern;
use crate::value::Value;
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::RwLock;

/// How a field stores and combines its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FieldKind {
    /// Ordered collection; merging appends items not already present.
    #[default]
    List,

    /// Unordered collection with the same union semantics as `List`;
    /// callers that care about set identity use this kind.
    Set,

    /// Single value; merging overwrites.
    Scalar,

    /// Collection of paths; matching normalizes `\` to `/`.
    PathSet,
}

/// Registration-time description of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    is_scope: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
            is_scope: false,
        }
    }

    /// Mark this field as a scope selector (`workspaces`, `projects`,
    /// `configurations`, ...). Scope fields resolve against the scope map
    /// rather than the value map during condition evaluation.
    pub fn scope(mut self) -> Self {
        self.is_scope = true;
        self
    }
}

struct FieldInfo {
    name: String,
    kind: FieldKind,
    is_scope: bool,
}

#[derive(Default)]
struct Registry {
    by_name: FxHashMap<String, u32>,
    entries: Vec<FieldInfo>,
}

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// An interned field handle.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Field(u32);

impl Field {
    /// Register a field, or return the existing handle if `spec` matches
    /// the registration already on record.
    ///
    /// Kind and scope flag are immutable once registered; a mismatching
    /// redefinition fails with [`ConfigError::ConflictingField`].
    pub fn define(spec: FieldSpec) -> Result<Field> {
        let mut registry = REGISTRY.write().expect("field registry poisoned");
        if let Some(&id) = registry.by_name.get(&spec.name) {
            let info = &registry.entries[id as usize];
            if info.kind != spec.kind || info.is_scope != spec.is_scope {
                return Err(ConfigError::ConflictingField { name: spec.name });
            }
            return Ok(Field(id));
        }
        Ok(intern(&mut registry, spec))
    }

    /// Look up a field, creating it with the default shape (`List`, not a
    /// scope) if it does not exist yet. Never fails; monotone.
    pub fn get(name: &str) -> Field {
        let mut registry = REGISTRY.write().expect("field registry poisoned");
        if let Some(&id) = registry.by_name.get(name) {
            return Field(id);
        }
        intern(&mut registry, FieldSpec::new(name, FieldKind::default()))
    }

    /// Look up a field without creating it.
    pub fn lookup(name: &str) -> Option<Field> {
        let registry = REGISTRY.read().expect("field registry poisoned");
        registry.by_name.get(name).map(|&id| Field(id))
    }

    pub fn name(&self) -> String {
        self.with_info(|info| info.name.clone())
    }

    pub fn kind(&self) -> FieldKind {
        self.with_info(|info| info.kind)
    }

    pub fn is_scope(&self) -> bool {
        self.with_info(|info| info.is_scope)
    }

    fn with_info<R>(&self, f: impl FnOnce(&FieldInfo) -> R) -> R {
        let registry = REGISTRY.read().expect("field registry poisoned");
        f(&registry.entries[self.0 as usize])
    }

    /// Combine `incoming` into `current` per this field's kind: union
    /// preserving first-seen order for collections, overwrite for scalars.
    pub fn merge(&self, current: Option<&Value>, incoming: &Value) -> Value {
        match self.kind() {
            FieldKind::Scalar => incoming.clone(),
            kind => {
                let mut items: Vec<String> =
                    current.map(|v| v.as_items().to_vec()).unwrap_or_default();
                for item in incoming.as_items() {
                    if !items.iter().any(|have| item_eq(kind, have, item)) {
                        items.push(item.clone());
                    }
                }
                Value::Items(items)
            }
        }
    }

    /// Subtract every item of `current` matching any of `patterns`.
    ///
    /// Wildcards in a pattern expand against the current items. Returns
    /// the reduced value (`None` when nothing is left) and the concrete
    /// items that were removed, in their original order. Patterns that
    /// match nothing contribute nothing.
    pub fn remove(
        &self,
        current: Option<&Value>,
        patterns: &Value,
    ) -> (Option<Value>, Vec<String>) {
        let Some(current) = current else {
            return (None, Vec::new());
        };
        let kind = self.kind();
        let mut kept: Vec<String> = Vec::new();
        let mut removed: Vec<String> = Vec::new();
        for item in current.as_items() {
            let hit = patterns
                .as_items()
                .iter()
                .any(|p| item_matches(kind, item, p, true));
            if hit {
                removed.push(item.clone());
            } else {
                kept.push(item.clone());
            }
        }
        let new = match kind {
            FieldKind::Scalar => {
                if removed.is_empty() {
                    Some(current.clone())
                } else {
                    None
                }
            }
            _ if kept.is_empty() => None,
            _ => Some(Value::Items(kept)),
        };
        (new, removed)
    }

    /// Per-field pattern match: literal equality for scalars, element-wise
    /// membership for collections, `*` wildcards honored when
    /// `wildcard_ok`.
    pub fn matches(&self, value: &Value, pat: &str, wildcard_ok: bool) -> bool {
        let kind = self.kind();
        value
            .as_items()
            .iter()
            .any(|item| item_matches(kind, item, pat, wildcard_ok))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Field({})", self.name())
    }
}

fn intern(registry: &mut Registry, spec: FieldSpec) -> Field {
    let id = registry.entries.len() as u32;
    registry.by_name.insert(spec.name.clone(), id);
    registry.entries.push(FieldInfo {
        name: spec.name,
        kind: spec.kind,
        is_scope: spec.is_scope,
    });
    Field(id)
}

fn item_eq(kind: FieldKind, a: &str, b: &str) -> bool {
    match kind {
        FieldKind::PathSet => normalize_path(a) == normalize_path(b),
        _ => a == b,
    }
}

fn item_matches(kind: FieldKind, item: &str, pat: &str, wildcard_ok: bool) -> bool {
    match kind {
        FieldKind::PathSet => {
            pattern::matches(&normalize_path(item), &normalize_path(pat), wildcard_ok)
        }
        _ => pattern::matches(item, pat, wildcard_ok),
    }
}

fn normalize_path(p: &str) -> String {
    p.replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_with_same_name_compare_equal() {
        let a = Field::get("field_interning_probe");
        let b = Field::get("field_interning_probe");
        assert_eq!(a, b);
        assert_eq!(a.name(), "field_interning_probe");
    }

    #[test]
    fn define_is_idempotent() {
        let spec = FieldSpec::new("field_define_probe", FieldKind::Set).scope();
        let a = Field::define(spec.clone()).unwrap();
        let b = Field::define(spec).unwrap();
        assert_eq!(a, b);
        assert!(a.is_scope());
        assert_eq!(a.kind(), FieldKind::Set);
    }

    #[test]
    fn conflicting_redefinition_fails() {
        Field::define(FieldSpec::new("field_conflict_probe", FieldKind::List)).unwrap();
        let err =
            Field::define(FieldSpec::new("field_conflict_probe", FieldKind::Scalar)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::ConflictingField {
                name: "field_conflict_probe".into()
            }
        );
    }

    #[test]
    fn get_creates_default_shape() {
        let f = Field::get("field_default_probe");
        assert_eq!(f.kind(), FieldKind::List);
        assert!(!f.is_scope());
        assert_eq!(Field::lookup("field_default_probe"), Some(f));
        assert_eq!(Field::lookup("field_never_registered_probe"), None);
    }

    #[test]
    fn list_merge_unions_in_order() {
        let f = Field::define(FieldSpec::new("merge_list_probe", FieldKind::List)).unwrap();
        let base = f.merge(None, &Value::items(["A", "B"]));
        let merged = f.merge(Some(&base), &Value::items(["B", "C"]));
        assert_eq!(merged.as_items(), &["A", "B", "C"]);
    }

    #[test]
    fn readding_does_not_reorder() {
        let f = Field::define(FieldSpec::new("merge_order_probe", FieldKind::List)).unwrap();
        let base = f.merge(None, &Value::items(["A", "B", "C"]));
        let merged = f.merge(Some(&base), &Value::items(["A"]));
        assert_eq!(merged.as_items(), &["A", "B", "C"]);
    }

    #[test]
    fn scalar_merge_overwrites() {
        let f = Field::define(FieldSpec::new("merge_scalar_probe", FieldKind::Scalar)).unwrap();
        let base = f.merge(None, &Value::scalar("windows"));
        let merged = f.merge(Some(&base), &Value::scalar("linux"));
        assert_eq!(merged, Value::scalar("linux"));
    }

    #[test]
    fn remove_reports_concrete_items() {
        let f = Field::define(FieldSpec::new("remove_probe", FieldKind::List)).unwrap();
        let current = Value::items(["A", "B", "C"]);
        let (new, removed) = f.remove(Some(&current), &Value::items(["B"]));
        assert_eq!(new, Some(Value::items(["A", "C"])));
        assert_eq!(removed, vec!["B"]);
    }

    #[test]
    fn remove_expands_wildcards_against_current() {
        let f = Field::define(FieldSpec::new("remove_glob_probe", FieldKind::List)).unwrap();
        let current = Value::items(["DebugDLL", "DebugStatic", "Release"]);
        let (new, removed) = f.remove(Some(&current), &Value::items(["Debug*"]));
        assert_eq!(new, Some(Value::items(["Release"])));
        assert_eq!(removed, vec!["DebugDLL", "DebugStatic"]);
    }

    #[test]
    fn remove_of_unset_value_is_silent() {
        let f = Field::define(FieldSpec::new("remove_unset_probe", FieldKind::List)).unwrap();
        let current = Value::items(["A", "B"]);
        let (new, removed) = f.remove(Some(&current), &Value::items(["D"]));
        assert_eq!(new, Some(Value::items(["A", "B"])));
        assert!(removed.is_empty());

        let (new, removed) = f.remove(None, &Value::items(["D"]));
        assert_eq!(new, None);
        assert!(removed.is_empty());
    }

    #[test]
    fn remove_emptying_a_collection_yields_none() {
        let f = Field::define(FieldSpec::new("remove_empty_probe", FieldKind::List)).unwrap();
        let current = Value::items(["A"]);
        let (new, removed) = f.remove(Some(&current), &Value::items(["A"]));
        assert_eq!(new, None);
        assert_eq!(removed, vec!["A"]);
    }

    #[test]
    fn scalar_remove_clears_on_match() {
        let f = Field::define(FieldSpec::new("remove_scalar_probe", FieldKind::Scalar)).unwrap();
        let current = Value::scalar("windows");
        let (new, removed) = f.remove(Some(&current), &Value::scalar("windows"));
        assert_eq!(new, None);
        assert_eq!(removed, vec!["windows"]);

        let (new, removed) = f.remove(Some(&current), &Value::scalar("linux"));
        assert_eq!(new, Some(current));
        assert!(removed.is_empty());
    }

    #[test]
    fn matches_is_membership_for_collections() {
        let f = Field::define(FieldSpec::new("matches_probe", FieldKind::List)).unwrap();
        let value = Value::items(["P1", "P2", "P3"]);
        assert!(f.matches(&value, "P2", true));
        assert!(f.matches(&value, "P*", true));
        assert!(!f.matches(&value, "P4", true));
        assert!(!f.matches(&value, "P*", false));
    }

    #[test]
    fn path_set_normalizes_separators() {
        let f = Field::define(FieldSpec::new("matches_path_probe", FieldKind::PathSet)).unwrap();
        let value = Value::items(["src\\main.c", "src/util.c"]);
        assert!(f.matches(&value, "src/main.c", true));
        assert!(f.matches(&value, "src\\util.c", true));
        assert!(f.matches(&value, "src/*.c", true));

        let (new, removed) = f.remove(Some(&value), &Value::items(["src/main.c"]));
        assert_eq!(removed, vec!["src\\main.c"]);
        assert_eq!(new, Some(Value::items(["src/util.c"])));
    }
}
