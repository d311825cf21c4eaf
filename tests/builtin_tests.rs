// ABOUTME: Contract tests for the built-in library: arity diagnostics for
// ABOUTME: every macro and a few programs that combine them

use smac::builtins::register_builtins;
use smac::engine::Engine;
use smac::error::EngineError;

fn expand(input: &str) -> Result<String, EngineError> {
    let mut engine = Engine::new();
    register_builtins(&mut engine).expect("builtin registration succeeds");
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

fn arity_of(input: &str) -> String {
    match expand(input) {
        Err(EngineError::Arity { name, expected }) => format!("{}: {}", name, expected),
        other => panic!("expected an arity error for {}, got {:?}", input, other),
    }
}

// ============================================================================
// Arity contract
// ============================================================================

#[test]
fn test_arity_diagnostics() {
    assert_eq!(arity_of("$(set x)"), "set: at least 2 arguments");
    assert_eq!(arity_of("$(let x)"), "let: at least 2 arguments");
    assert_eq!(arity_of("$(calc)"), "calc: exactly 1 argument");
    assert_eq!(arity_of("$(calc 1 2)"), "calc: exactly 1 argument");
    assert_eq!(arity_of("$(expand a b)"), "expand: exactly 1 argument");
    assert_eq!(arity_of("$(if 1)"), "if: 2 or 3 arguments");
    assert_eq!(arity_of("$(repeat x)"), "repeat: exactly 2 arguments");
    assert_eq!(arity_of("$(loop)"), "loop: at least 1 argument");
    assert_eq!(arity_of("$(break x)"), "break: no arguments");
    assert_eq!(arity_of("$(null)"), "null: exactly 1 argument");
    assert_eq!(arity_of("$(index a)"), "index: exactly 2 arguments");
    assert_eq!(arity_of("$(length)"), "length: exactly 1 argument");
    assert_eq!(arity_of("$(substring s)"), "substring: 2 or 3 arguments");
    assert_eq!(
        arity_of("$(substring s 1 2 3)"),
        "substring: 2 or 3 arguments"
    );
    assert_eq!(
        arity_of("$(string_compare a =)"),
        "string_compare: exactly 3 arguments"
    );
    assert_eq!(arity_of("$(numeric)"), "numeric: exactly 1 argument");
    assert_eq!(arity_of("$(byte)"), "byte: exactly 1 argument");
    assert_eq!(arity_of("$(error)"), "error: exactly 1 argument");
}

#[test]
fn test_builtins_see_their_own_name_as_argument_zero() {
    // arity errors carry the invoked name, proving arg[0] arrived intact
    match expand("$(calc)") {
        Err(EngineError::Arity { name, .. }) => assert_eq!(name, "calc"),
        other => panic!("expected arity error, got {:?}", other),
    }
}

// ============================================================================
// Combined programs
// ============================================================================

#[test]
fn test_counted_list() {
    let input = "$(let I 0)$(loop (=$(let I !$(I)+1!)$(I),$(if !$(I)>=4! (=$(break)=))=))";
    assert_eq!(expand(input).unwrap(), "1,2,3,4,");
}

#[test]
fn test_recursive_countdown_macro() {
    let input =
        "$(set DOWN (=$(1) $(if !$(1)>1! (=$(let N !$(1)-1!)$(DOWN !$(N)!)=))=))$(DOWN 3)";
    assert_eq!(expand(input).unwrap(), "3 2 1 ");
}

#[test]
fn test_string_inspection_pipeline() {
    let input = "$(set S abcdef)\
                 $(if !$(index cd !$(S)!)! (=found at $(index cd !$(S)!)=) (=missing=))";
    assert_eq!(expand(input).unwrap(), "found at 3");
}

#[test]
fn test_substring_walk() {
    let input = "$(set S smac)$(let I 0)\
                 $(loop (=$(let I !$(I)+1!)$(substring !$(S)! !$(I)! 1)$(substring !$(S)! !$(I)! 1)$(if !$(I)>=$(length !$(S)!)! (=$(break)=))=))";
    assert_eq!(expand(input).unwrap(), "ssmmaacc");
}

#[test]
fn test_conditional_definition() {
    let input = "$(if !$(null !$(X)!)! (=$(set X default)=))$(X)";
    assert_eq!(expand(input).unwrap(), "default");
}

#[test]
fn test_byte_composes_with_numeric_arithmetic() {
    // shift a letter by one
    let input = "$(byte !$(numeric A)+1!)";
    assert_eq!(expand(input).unwrap(), "B");
}

#[test]
fn test_string_compare_drives_branching() {
    let input = "$(set A apple)$(set B berry)\
                 $(if !$(string_compare !$(A)! < !$(B)!)! (=$(A)=) (=$(B)=))";
    assert_eq!(expand(input).unwrap(), "apple");
}

#[test]
fn test_repeat_with_computed_width() {
    let input = "$(set PAD (=$(repeat - !$(1)!)=))$(PAD 5)";
    assert_eq!(expand(input).unwrap(), "-----");
}

#[test]
fn test_expand_applies_escapes() {
    // expansion of the stored text turns the escape into a literal $( pair
    assert_eq!(expand("$(expand (=$$(x)=))").unwrap(), "$(x)");
}
