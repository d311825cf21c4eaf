//! Numeric built-ins: calc, byte, numeric
//!
//! `calc` evaluates an infix expression and emits the decimal result;
//! `byte` emits the single byte named by an expression; `numeric` emits the
//! unsigned value of its argument's first byte.

use super::emit_decimal;
use crate::calc::calc;
use crate::engine::Engine;
use crate::error::{EngineError, ARITY_EXACTLY_ONE};

/// Evaluate the argument and emit its decimal representation.
pub fn bi_calc(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("calc", ARITY_EXACTLY_ONE));
    }

    let result = calc(&args[1])?;
    emit_decimal(engine, result)
}

/// Evaluate the argument and emit the byte holding the low 8 bits of the
/// result.
pub fn bi_byte(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("byte", ARITY_EXACTLY_ONE));
    }

    let result = calc(&args[1])?;
    engine.emit_literal(result as u8)
}

/// Emit the unsigned numeric value of the argument's first byte (0 for an
/// empty argument).
pub fn bi_numeric(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("numeric", ARITY_EXACTLY_ONE));
    }

    let value = args[1].first().copied().unwrap_or(0);
    emit_decimal(engine, value as i64)
}

/// Register the numeric builtins in the engine
pub fn register(engine: &mut Engine) -> Result<(), EngineError> {
    engine.define_builtin(b"calc", bi_calc)?;
    engine.define_builtin(b"byte", bi_byte)?;
    engine.define_builtin(b"numeric", bi_numeric)?;
    Ok(())
}
