//! Process-wide symbol interning table
//!
//! The sampling interrupt may only copy plain values, so script
//! identities cross the interrupt boundary as [`SymbolId`]s — small
//! integers backed by this table. Entries live for the lifetime of the
//! process, which is what makes a `SymbolId` captured in a sample safe
//! to resolve long after the script frame it named has returned.
//!
//! The table lock is only ever taken on ordinary threads (the scripting
//! engine interns at parse/load time, reports resolve at shutdown);
//! interrupt context never touches it.

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::domain::SymbolId;

struct SymbolTable {
    names: Vec<String>,
    index: HashMap<String, SymbolId>,
}

static TABLE: OnceLock<Mutex<SymbolTable>> = OnceLock::new();

fn table() -> &'static Mutex<SymbolTable> {
    TABLE.get_or_init(|| {
        Mutex::new(SymbolTable { names: Vec::new(), index: HashMap::new() })
    })
}

/// Intern a symbol name, returning its stable ID.
///
/// Interning the same name twice returns the same ID.
///
/// # Panics
///
/// Panics if the table mutex was poisoned by a panicking thread.
pub fn intern(name: &str) -> SymbolId {
    let mut guard = table().lock().expect("symbol table poisoned");
    if let Some(&id) = guard.index.get(name) {
        return id;
    }
    #[allow(clippy::cast_possible_truncation)]
    let id = SymbolId(guard.names.len() as u32);
    guard.names.push(name.to_string());
    guard.index.insert(name.to_string(), id);
    id
}

/// Resolve an ID back to its name. Returns `None` for IDs this process
/// never issued (e.g. a torn read that slipped through unpacking).
///
/// # Panics
///
/// Panics if the table mutex was poisoned by a panicking thread.
#[must_use]
pub fn resolve(id: SymbolId) -> Option<String> {
    let guard = table().lock().expect("symbol table poisoned");
    guard.names.get(id.0 as usize).cloned()
}

/// Resolve an ID, falling back to a printable placeholder for unknown IDs.
#[must_use]
pub fn resolve_or_unknown(id: SymbolId) -> String {
    resolve(id).unwrap_or_else(|| format!("<unknown:{id}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let a = intern("test_intern_is_stable::eval");
        let b = intern("test_intern_is_stable::eval");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_names_get_distinct_ids() {
        let a = intern("test_distinct::a");
        let b = intern("test_distinct::b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_resolve_roundtrip() {
        let id = intern("test_resolve::on_collide");
        assert_eq!(resolve(id).as_deref(), Some("test_resolve::on_collide"));
    }

    #[test]
    fn test_resolve_unknown_id() {
        assert_eq!(resolve(SymbolId(u32::MAX)), None);
        assert!(resolve_or_unknown(SymbolId(u32::MAX)).contains("unknown"));
    }
}
