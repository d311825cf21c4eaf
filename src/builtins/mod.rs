//! # Built-in Macros
//!
//! The fixed library of callable macros, organized into 4 categories:
//!
//! - **[definition]** (2): set, let - Macro definition
//! - **[numeric]** (3): calc, byte, numeric - Expression evaluation and bytes
//! - **[control]** (6): expand, if, repeat, loop, break, error - Control flow
//! - **[strings]** (5): null, index, length, substring, string_compare - String ops
//!
//! Each category is a sub-module with a register function that binds its
//! handlers into the engine's macro table. A handler receives the engine
//! (for the `emit_literal`/`feed` primitives and definitions) and the
//! evaluated argument vector, whose index 0 is the macro's own name.
//!
//! The host registers its own I/O macros (`include`, `output`, `append`)
//! on top of these.

use crate::engine::Engine;
use crate::error::EngineError;

pub mod control;
pub mod definition;
pub mod numeric;
pub mod strings;

// Re-export for convenience
pub use control::register as register_control;
pub use definition::register as register_definition;
pub use numeric::register as register_numeric;
pub use strings::register as register_strings;

/// Register the default built-in set in the engine
pub fn register_builtins(engine: &mut Engine) -> Result<(), EngineError> {
    register_definition(engine)?;
    register_numeric(engine)?;
    register_control(engine)?;
    register_strings(engine)?;
    Ok(())
}

/// Copy bytes into the current sink without re-evaluating them
pub(crate) fn emit_bytes(engine: &mut Engine, text: &[u8]) -> Result<(), EngineError> {
    for &c in text {
        engine.emit_literal(c)?;
    }
    Ok(())
}

/// Emit the decimal representation of a value
pub(crate) fn emit_decimal(engine: &mut Engine, value: i64) -> Result<(), EngineError> {
    emit_bytes(engine, value.to_string().as_bytes())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Expand an input string with the default built-ins registered
    pub fn expand(engine: &mut Engine, input: &str) -> Result<String, EngineError> {
        engine.start_expand(vec![b"smac".to_vec()]);
        let mut out = Vec::new();
        for &b in input.as_bytes() {
            engine.feed(b)?;
            out.extend(engine.take_output());
        }
        if engine.expanding() {
            return Err(EngineError::UnterminatedExpansion);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    pub fn engine_with_builtins() -> Engine {
        let mut engine = Engine::new();
        register_builtins(&mut engine).expect("builtin names are valid");
        engine
    }
}
