//! The environment: one flat base mapping plus transient comprehension
//! shadow frames.
//!
//! Reads fall through the shadow frames to the base table. Writes go to
//! the innermost shadow frame while one is active (comprehension targets),
//! to the base otherwise. Deletes act on the base only — nothing inside a
//! comprehension can delete. The base table keeps insertion order so
//! callers see bindings in the order they were created.

use indexmap::IndexMap;

use crate::{
    exception::{Exception, RunResult},
    value::Value,
};

/// The base environment: identifier to value, in binding order.
pub type SymbolTable = IndexMap<String, Value>;

/// Stack of comprehension shadow frames layered over a base table.
#[derive(Debug, Default)]
pub(crate) struct Scopes {
    frames: Vec<SymbolTable>,
}

impl Scopes {
    /// Opens one shadow frame for a comprehension.
    pub fn push(&mut self) {
        self.frames.push(SymbolTable::new());
    }

    /// Discards the innermost shadow frame and every binding in it.
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Drops all shadow frames (between runs, and after an error).
    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Looks a name up through the shadow frames, then the base table.
    pub fn lookup(&self, base: &SymbolTable, name: &str) -> RunResult<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        base.get(name)
            .cloned()
            .ok_or_else(|| Exception::NameLookup(name.to_string()))
    }

    /// Binds a name: innermost shadow frame when one is active, base
    /// otherwise.
    pub fn bind(&mut self, base: &mut SymbolTable, name: &str, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        } else {
            base.insert(name.to_string(), value);
        }
    }

    /// Removes a binding from the base table.
    pub fn unbind(&self, base: &mut SymbolTable, name: &str) -> RunResult<()> {
        base.shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| Exception::NameLookup(name.to_string()))
    }
}
