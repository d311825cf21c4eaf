//! String operations: null, index, length, substring, string_compare
//!
//! All of these work on raw bytes; offsets are 1-based as seen by macro
//! code.

use super::{emit_bytes, emit_decimal};
use crate::calc::calc;
use crate::engine::Engine;
use crate::error::{
    EngineError, ARITY_EXACTLY_ONE, ARITY_EXACTLY_THREE, ARITY_EXACTLY_TWO, ARITY_TWO_OR_THREE,
};
use std::cmp::Ordering;

/// Emit `1` when the argument is empty, `0` otherwise.
pub fn bi_null(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("null", ARITY_EXACTLY_ONE));
    }

    engine.emit_literal(if args[1].is_empty() { b'1' } else { b'0' })
}

/// Emit the 1-based offset of the first occurrence of the first argument
/// within the second, `0` when absent. An empty needle matches at offset 1.
pub fn bi_index(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 3 {
        return Err(EngineError::arity("index", ARITY_EXACTLY_TWO));
    }

    let needle = &args[1];
    let haystack = &args[2];
    let offset = if needle.is_empty() {
        1
    } else {
        haystack
            .windows(needle.len())
            .position(|window| window == needle.as_slice())
            .map(|p| p as i64 + 1)
            .unwrap_or(0)
    };

    emit_decimal(engine, offset)
}

/// Emit the length of the argument in bytes.
pub fn bi_length(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("length", ARITY_EXACTLY_ONE));
    }

    emit_decimal(engine, args[1].len() as i64)
}

/// Emit a substring of the first argument. The second argument evaluates to
/// the 1-based start, the optional third to the length (default: to the
/// end). Out-of-bounds requests are the "illegal substring" diagnostic.
pub fn bi_substring(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() < 3 || args.len() > 4 {
        return Err(EngineError::arity("substring", ARITY_TWO_OR_THREE));
    }

    let len = args[1].len() as i64;
    let start = calc(&args[2])?;
    let count = if args.len() == 4 {
        calc(&args[3])?
    } else if start >= 1 {
        len - start + 1
    } else {
        // out-of-range start; the guard below rejects it
        0
    };

    // compared without summing so extreme values cannot wrap
    if start < 1 || count < 1 || count > len - (start - 1) {
        return Err(EngineError::IllegalSubstring);
    }

    let from = (start - 1) as usize;
    let to = from + count as usize;
    emit_bytes(engine, &args[1][from..to])
}

/// Compare the first and third arguments under the relation named by the
/// second (`=`, `<`, `>`, `<=`, `>=`, `<>`), byte-lexicographically; emit
/// `1` or `0`.
pub fn bi_string_compare(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 4 {
        return Err(EngineError::arity("string_compare", ARITY_EXACTLY_THREE));
    }

    let ordering = args[1].as_slice().cmp(args[3].as_slice());
    let holds = match args[2].as_slice() {
        b"=" => ordering == Ordering::Equal,
        b">" => ordering == Ordering::Greater,
        b"<" => ordering == Ordering::Less,
        b">=" => ordering != Ordering::Less,
        b"<=" => ordering != Ordering::Greater,
        b"<>" => ordering != Ordering::Equal,
        _ => return Err(EngineError::BadRelation),
    };

    engine.emit_literal(if holds { b'1' } else { b'0' })
}

/// Register the string builtins in the engine
pub fn register(engine: &mut Engine) -> Result<(), EngineError> {
    engine.define_builtin(b"null", bi_null)?;
    engine.define_builtin(b"index", bi_index)?;
    engine.define_builtin(b"length", bi_length)?;
    engine.define_builtin(b"substring", bi_substring)?;
    engine.define_builtin(b"string_compare", bi_string_compare)?;
    Ok(())
}
