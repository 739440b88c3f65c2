//! Wildcard pattern matching for field values.
//!
//! Patterns are plain strings where `*` matches any run of characters.
//! Everything else is literal. Compiled patterns are cached process-wide
//! since the same handful of patterns is tested against many values over
//! the course of an evaluation.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::RwLock;

static COMPILED: Lazy<RwLock<FxHashMap<String, Regex>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// True if the pattern contains a `*` wildcard.
pub fn has_wildcard(pattern: &str) -> bool {
    pattern.contains('*')
}

/// Match `value` against `pattern`.
///
/// When `wildcard_ok` is false, or the pattern carries no `*`, this is
/// plain string equality.
pub fn matches(value: &str, pattern: &str, wildcard_ok: bool) -> bool {
    if !wildcard_ok || !has_wildcard(pattern) {
        return value == pattern;
    }
    if let Some(re) = COMPILED.read().expect("pattern cache poisoned").get(pattern) {
        return re.is_match(value);
    }
    let re = compile(pattern);
    let matched = re.is_match(value);
    COMPILED
        .write()
        .expect("pattern cache poisoned")
        .insert(pattern.to_string(), re);
    matched
}

fn compile(pattern: &str) -> Regex {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    for (i, segment) in pattern.split('*').enumerate() {
        if i > 0 {
            source.push_str(".*");
        }
        source.push_str(&regex::escape(segment));
    }
    source.push('$');
    // The source is anchored escaped text joined by `.*`; it always compiles.
    Regex::new(&source).expect("wildcard pattern compiled to invalid regex")
}
