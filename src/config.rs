// ABOUTME: Limits, syntax bytes and host configuration for the macro processor

use std::path::PathBuf;

pub const VERSION: &str = "1.0.0";

// ============================================================================
// Syntax bytes
// ============================================================================

/// Lead byte beginning every macro syntactic element
pub const LEAD: u8 = b'$';
/// Opens an invocation after the lead
pub const LEFT_DELIM: u8 = b'(';
/// Closes an invocation, an argument reference, or a quoted argument
pub const RIGHT_DELIM: u8 = b')';
/// First byte of the quoted-argument open `(=`
pub const BEGIN1_QUOTE_ARG: u8 = b'(';
/// Second byte of the quoted-argument open `(=`
pub const BEGIN2_QUOTE_ARG: u8 = b'=';
/// First byte of the quoted-argument close `=)`
pub const END1_QUOTE_ARG: u8 = b'=';
/// Second byte of the quoted-argument close `=)`
pub const END2_QUOTE_ARG: u8 = b')';
/// Delimits an eagerly-evaluated argument
pub const EVAL_ARG_DELIM: u8 = b'!';

/// Whitespace as the expansion syntax understands it
pub fn is_white(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == b'\n'
}

// ============================================================================
// Resource bounds (all static, per the resource model)
// ============================================================================

/// Size of each workspace arena buffer
pub const EVAL_BUF_SIZE: usize = 4 * 1024;
/// String pointers per arena
pub const N_EVAL_POINTERS: usize = 64;
/// Maximum evaluation nesting (body = 1 unit, eager arg or built-in = 2)
pub const MAX_NEST: usize = 64;
/// Pair-stack bound for the expression evaluator
pub const N_PAIRS: usize = 128;
/// Capacity of the result sink between host drains
pub const SIZE_RES_BUF: usize = 16 * 1024;
/// Maximum include-file nesting in the host
pub const MAX_INCLUDE_NEST: usize = 10;

// ============================================================================
// Host filesystem configuration
// ============================================================================

/// Sandbox roots for paths opened by macro input (include/output/append)
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub allowed_paths: Vec<PathBuf>,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            // The working directory; macros see the project they run in
            allowed_paths: vec![PathBuf::from(".")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_set() {
        assert!(is_white(b' '));
        assert!(is_white(b'\t'));
        assert!(is_white(b'\n'));
        assert!(!is_white(b'\r'));
        assert!(!is_white(b'!'));
    }

    #[test]
    fn test_default_fs_config() {
        let config = FsConfig::default();
        assert_eq!(config.allowed_paths, vec![PathBuf::from(".")]);
    }
}
