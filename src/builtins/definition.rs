//! Macro definition: set, let
//!
//! `set` binds one or more names to literal replacement text; `let` binds
//! them to the evaluated result of a numeric expression. Both take the body
//! last, after the list of names, and both delete when the body is empty.

use crate::calc::calc;
use crate::engine::Engine;
use crate::error::{EngineError, ARITY_AT_LEAST_TWO};

/// Associate each of args[1..n-1] with the last argument as literal
/// replacement text (not re-expanded here).
pub fn bi_set(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() < 3 {
        return Err(EngineError::arity("set", ARITY_AT_LEAST_TWO));
    }

    let body = &args[args.len() - 1];
    for name in &args[1..args.len() - 1] {
        engine.define_text(name, body)?;
    }

    Ok(())
}

/// Evaluate the last argument and associate each of args[1..n-1] with its
/// decimal representation.
pub fn bi_let(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() < 3 {
        return Err(EngineError::arity("let", ARITY_AT_LEAST_TWO));
    }

    let value = calc(&args[args.len() - 1])?;
    let body = value.to_string();
    for name in &args[1..args.len() - 1] {
        engine.define_text(name, body.as_bytes())?;
    }

    Ok(())
}

/// Register the definition builtins in the engine
pub fn register(engine: &mut Engine) -> Result<(), EngineError> {
    engine.define_builtin(b"set", bi_set)?;
    engine.define_builtin(b"let", bi_let)?;
    Ok(())
}
