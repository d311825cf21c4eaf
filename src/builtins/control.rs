//! Control flow: expand, if, repeat, loop, break, error
//!
//! These are the built-ins that re-enter the expansion machine. Because a
//! built-in call re-creates the caller's environment, `$(N)` inside any
//! text they re-expand resolves against the caller's arguments.

use super::emit_bytes;
use crate::calc::calc;
use crate::engine::Engine;
use crate::error::{
    EngineError, ARITY_AT_LEAST_ONE, ARITY_EXACTLY_ONE, ARITY_EXACTLY_TWO, ARITY_NONE,
    ARITY_TWO_OR_THREE,
};

/// Feed the argument's bytes back through the expansion machine.
pub fn bi_expand(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("expand", ARITY_EXACTLY_ONE));
    }

    engine.feed_bytes(&args[1])
}

/// Evaluate the condition; re-expand the second argument when nonzero, the
/// third (when present) otherwise.
pub fn bi_if(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() < 3 || args.len() > 4 {
        return Err(EngineError::arity("if", ARITY_TWO_OR_THREE));
    }

    let condition = calc(&args[1])?;
    if condition != 0 {
        engine.feed_bytes(&args[2])
    } else if args.len() == 4 {
        engine.feed_bytes(&args[3])
    } else {
        Ok(())
    }
}

/// Emit the first argument verbatim as many times as the second evaluates
/// to. A non-positive count emits nothing.
pub fn bi_repeat(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 3 {
        return Err(EngineError::arity("repeat", ARITY_EXACTLY_TWO));
    }

    let count = calc(&args[2])?;
    for _ in 0..count.max(0) {
        emit_bytes(engine, &args[1])?;
    }

    Ok(())
}

/// Re-expand the arguments in order, over and over, until `break` runs.
/// The flag is cleared before returning so nested loops stay independent.
pub fn bi_loop(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() < 2 {
        return Err(EngineError::arity("loop", ARITY_AT_LEAST_ONE));
    }

    engine.clear_break();
    loop {
        for body in &args[1..] {
            engine.feed_bytes(body)?;
            if engine.break_pending() {
                engine.clear_break();
                return Ok(());
            }
        }
    }
}

/// Arrange for the innermost enclosing `loop` to stop.
pub fn bi_break(engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 1 {
        return Err(EngineError::arity("break", ARITY_NONE));
    }

    engine.set_break();
    Ok(())
}

/// Raise the argument as the engine's diagnostic, ending the expansion.
pub fn bi_error(_engine: &mut Engine, args: &[Vec<u8>]) -> Result<(), EngineError> {
    if args.len() != 2 {
        return Err(EngineError::arity("error", ARITY_EXACTLY_ONE));
    }

    Err(EngineError::User(
        String::from_utf8_lossy(&args[1]).into_owned(),
    ))
}

/// Register the control-flow builtins in the engine
pub fn register(engine: &mut Engine) -> Result<(), EngineError> {
    engine.define_builtin(b"expand", bi_expand)?;
    engine.define_builtin(b"if", bi_if)?;
    engine.define_builtin(b"repeat", bi_repeat)?;
    engine.define_builtin(b"loop", bi_loop)?;
    engine.define_builtin(b"break", bi_break)?;
    engine.define_builtin(b"error", bi_error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{engine_with_builtins, expand};
    use crate::error::EngineError;

    #[test]
    fn test_expand_reenters_the_machine() {
        let mut engine = engine_with_builtins();
        let out = expand(&mut engine, "$(set X deep)$(expand (=[$(X)]=))").unwrap();
        assert_eq!(out, "[deep]");
    }

    #[test]
    fn test_if_true_branch() {
        let mut engine = engine_with_builtins();
        assert_eq!(expand(&mut engine, "$(if 1 yes no)").unwrap(), "yes");
    }

    #[test]
    fn test_if_false_branch() {
        let mut engine = engine_with_builtins();
        assert_eq!(expand(&mut engine, "$(if 0 yes no)").unwrap(), "no");
    }

    #[test]
    fn test_if_without_else() {
        let mut engine = engine_with_builtins();
        assert_eq!(expand(&mut engine, "$(if 0 yes)").unwrap(), "");
        assert_eq!(expand(&mut engine, "$(if 2>1 yes)").unwrap(), "yes");
    }

    #[test]
    fn test_if_branches_are_expanded() {
        let mut engine = engine_with_builtins();
        let out = expand(&mut engine, "$(set W yo)$(if 1 (=>$(W)<=) no)").unwrap();
        assert_eq!(out, ">yo<");
    }

    #[test]
    fn test_if_arity() {
        let mut engine = engine_with_builtins();
        assert_eq!(
            expand(&mut engine, "$(if 1)"),
            Err(EngineError::arity("if", "2 or 3 arguments"))
        );
        assert_eq!(
            expand(&mut engine, "$(if 1 a b c)"),
            Err(EngineError::arity("if", "2 or 3 arguments"))
        );
    }

    #[test]
    fn test_repeat() {
        let mut engine = engine_with_builtins();
        assert_eq!(expand(&mut engine, "$(repeat ab !1+2!)").unwrap(), "ababab");
        assert_eq!(expand(&mut engine, "$(repeat x 0)").unwrap(), "");
        assert_eq!(expand(&mut engine, "$(repeat x !0-5!)").unwrap(), "");
    }

    #[test]
    fn test_repeat_does_not_reexpand() {
        let mut engine = engine_with_builtins();
        let out = expand(&mut engine, "$(set X v)$(repeat (=$(X)=) 2)").unwrap();
        // the repeated text is copied verbatim, not fed back through
        assert_eq!(out, "$(X)$(X)");
    }

    #[test]
    fn test_loop_with_break() {
        let mut engine = engine_with_builtins();
        let out = expand(
            &mut engine,
            "$(let I 0)$(loop (=$(let I !$(I)+1!)x$(if !$(I)>=3! (=$(break)=))=))",
        )
        .unwrap();
        assert_eq!(out, "xxx");
    }

    #[test]
    fn test_nested_loops_break_independently() {
        let mut engine = engine_with_builtins();
        let inner = "$(loop (=i$(break)=))";
        let input = format!(
            "$(let N 0)$(loop (=$(let N !$(N)+1!){}o$(if !$(N)>=2! (=$(break)=))=))",
            inner
        );
        assert_eq!(expand(&mut engine, &input).unwrap(), "ioio");
    }

    #[test]
    fn test_break_arity() {
        let mut engine = engine_with_builtins();
        assert_eq!(
            expand(&mut engine, "$(break stray)"),
            Err(EngineError::arity("break", "no arguments"))
        );
    }

    #[test]
    fn test_error_builtin_raises_its_argument() {
        let mut engine = engine_with_builtins();
        assert_eq!(
            expand(&mut engine, "$(error (=bad input=))"),
            Err(EngineError::User("bad input".to_string()))
        );
    }
}
