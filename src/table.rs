// ABOUTME: Macro table associating names with text bodies or built-in handlers

use crate::config::{is_white, RIGHT_DELIM};
use crate::engine::Engine;
use crate::error::EngineError;
use std::collections::HashMap;
use std::rc::Rc;

/// A built-in macro handler. Receives the engine (for emit/feed/define) and
/// the collected argument vector; `args[0]` is the registered name.
pub type BuiltinFn = fn(&mut Engine, &[Vec<u8>]) -> Result<(), EngineError>;

/// The body of a macro: replacement text, or a callable.
#[derive(Clone)]
pub enum MacroValue {
    /// Replacement text, re-fed through the expansion machine on invocation.
    /// Reference-counted so an invocation survives redefinition of its own
    /// name mid-expansion.
    Text(Rc<Vec<u8>>),
    Builtin(BuiltinFn),
}

impl std::fmt::Debug for MacroValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MacroValue::Text(body) => {
                write!(f, "Text({:?})", String::from_utf8_lossy(body))
            }
            MacroValue::Builtin(_) => write!(f, "Builtin"),
        }
    }
}

/// Name-to-body mapping with define / redefine / delete / lookup.
#[derive(Debug, Default)]
pub struct MacroTable {
    entries: HashMap<Vec<u8>, MacroValue>,
}

impl MacroTable {
    pub fn new() -> Self {
        MacroTable {
            entries: HashMap::new(),
        }
    }

    /// Validate a macro name: non-empty, no leading digit, no whitespace,
    /// no closing invocation delimiter.
    fn check_name(name: &[u8]) -> Result<(), EngineError> {
        let first = match name.first() {
            Some(c) => *c,
            None => return Err(EngineError::EmptyMacroName),
        };
        if first.is_ascii_digit() {
            return Err(EngineError::NameStartsWithDigit);
        }
        for &c in name {
            if is_white(c) {
                return Err(EngineError::NameContainsWhitespace);
            }
            if c == RIGHT_DELIM {
                return Err(EngineError::NameContainsDelimiter);
            }
        }
        Ok(())
    }

    /// Define a string macro. Defining to the empty body deletes the entry.
    pub fn define_text(&mut self, name: &[u8], body: &[u8]) -> Result<(), EngineError> {
        Self::check_name(name)?;
        if body.is_empty() {
            self.entries.remove(name);
            return Ok(());
        }
        self.entries
            .insert(name.to_vec(), MacroValue::Text(Rc::new(body.to_vec())));
        Ok(())
    }

    /// Register a built-in under `name`.
    pub fn define_builtin(&mut self, name: &[u8], handler: BuiltinFn) -> Result<(), EngineError> {
        Self::check_name(name)?;
        self.entries
            .insert(name.to_vec(), MacroValue::Builtin(handler));
        Ok(())
    }

    /// Look up a name. Unknown names are not errors; the caller treats
    /// `None` as the empty body.
    pub fn lookup(&self, name: &[u8]) -> Option<&MacroValue> {
        self.entries.get(name)
    }

    /// Diagnostic listing of the table, one entry per line.
    pub fn dump(&self) -> String {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .map(|(name, value)| match value {
                MacroValue::Text(body) => format!(
                    "{} / {}",
                    String::from_utf8_lossy(name),
                    String::from_utf8_lossy(body)
                ),
                MacroValue::Builtin(_) => {
                    format!("{} / BUILTIN", String::from_utf8_lossy(name))
                }
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(table: &MacroTable, name: &[u8]) -> Vec<u8> {
        match table.lookup(name) {
            Some(MacroValue::Text(b)) => b.as_ref().clone(),
            other => panic!("expected text body, got {:?}", other),
        }
    }

    #[test]
    fn test_define_and_lookup() {
        let mut table = MacroTable::new();
        table.define_text(b"GREET", b"Hello").unwrap();
        assert_eq!(body(&table, b"GREET"), b"Hello".to_vec());
    }

    #[test]
    fn test_unknown_name_is_not_an_error() {
        let table = MacroTable::new();
        assert!(table.lookup(b"missing").is_none());
    }

    #[test]
    fn test_redefine_replaces() {
        let mut table = MacroTable::new();
        table.define_text(b"X", b"one").unwrap();
        table.define_text(b"X", b"two").unwrap();
        assert_eq!(body(&table, b"X"), b"two".to_vec());
    }

    #[test]
    fn test_empty_body_deletes() {
        let mut table = MacroTable::new();
        table.define_text(b"X", b"one").unwrap();
        table.define_text(b"X", b"").unwrap();
        assert!(table.lookup(b"X").is_none());
    }

    #[test]
    fn test_delete_of_unknown_is_fine() {
        let mut table = MacroTable::new();
        table.define_text(b"never-defined", b"").unwrap();
        assert!(table.lookup(b"never-defined").is_none());
    }

    #[test]
    fn test_name_validation() {
        let mut table = MacroTable::new();
        assert_eq!(
            table.define_text(b"", b"x"),
            Err(EngineError::EmptyMacroName)
        );
        assert_eq!(
            table.define_text(b"1abc", b"x"),
            Err(EngineError::NameStartsWithDigit)
        );
        assert_eq!(
            table.define_text(b"a b", b"x"),
            Err(EngineError::NameContainsWhitespace)
        );
        assert_eq!(
            table.define_text(b"a)b", b"x"),
            Err(EngineError::NameContainsDelimiter)
        );
        // digits are fine anywhere but the front
        table.define_text(b"a1", b"x").unwrap();
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let mut table = MacroTable::new();
        table.define_text(b"x", b"lower").unwrap();
        table.define_text(b"X", b"upper").unwrap();
        assert_eq!(body(&table, b"x"), b"lower".to_vec());
        assert_eq!(body(&table, b"X"), b"upper".to_vec());
    }

    #[test]
    fn test_dump_lists_entries() {
        let mut table = MacroTable::new();
        table.define_text(b"A", b"alpha").unwrap();
        let listing = table.dump();
        assert!(listing.contains("A / alpha"));
    }
}
