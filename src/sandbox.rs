// ABOUTME: Capability-scoped filesystem access for macro-driven I/O
// Paths named by macro input (include/output/append) resolve inside the
// configured roots only, using cap-std for capability-based security

use crate::config::FsConfig;
use cap_std::fs::{Dir, File, OpenOptions};

/// Error type for sandbox operations
#[derive(Debug, Clone)]
pub enum SandboxError {
    PathNotAllowed(String),
    FileNotFound(String),
    IoError(String),
}

impl std::fmt::Display for SandboxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxError::PathNotAllowed(path) => {
                write!(f, "access denied: {} is not in allowed paths", path)
            }
            SandboxError::FileNotFound(path) => {
                write!(f, "file not found: {}", path)
            }
            SandboxError::IoError(msg) => {
                write!(f, "I/O error: {}", msg)
            }
        }
    }
}

impl std::error::Error for SandboxError {}

/// Sandbox for file access requested from inside the macro stream.
pub struct Sandbox {
    roots: Vec<Dir>,
}

impl Sandbox {
    /// Open every allowed path as a capability directory.
    pub fn new(config: &FsConfig) -> Result<Self, SandboxError> {
        let mut roots = Vec::new();

        for path in &config.allowed_paths {
            std::fs::create_dir_all(path).map_err(|e| {
                SandboxError::IoError(format!("cannot create {}: {}", path.display(), e))
            })?;

            let dir = Dir::open_ambient_dir(path, cap_std::ambient_authority()).map_err(|e| {
                SandboxError::IoError(format!("cannot open {}: {}", path.display(), e))
            })?;

            roots.push(dir);
        }

        Ok(Self { roots })
    }

    /// Reject absolute paths and parent traversal up front; cap-std would
    /// refuse them anyway, but the message should name the real reason.
    fn validate(path: &str) -> Result<(), SandboxError> {
        if path.starts_with('/') || path.starts_with('\\') || path.contains("..") {
            return Err(SandboxError::PathNotAllowed(path.to_string()));
        }
        Ok(())
    }

    /// Open a file for reading, trying each root in order.
    pub fn open_read(&self, path: &str) -> Result<File, SandboxError> {
        Self::validate(path)?;

        for root in &self.roots {
            match root.open(path) {
                Ok(file) => return Ok(file),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(SandboxError::IoError(format!("cannot open {}: {}", path, e)))
                }
            }
        }

        Err(SandboxError::FileNotFound(path.to_string()))
    }

    /// Open a file for writing in the first root, truncating or appending.
    pub fn open_write(&self, path: &str, append: bool) -> Result<File, SandboxError> {
        Self::validate(path)?;

        let root = self
            .roots
            .first()
            .ok_or_else(|| SandboxError::PathNotAllowed(path.to_string()))?;

        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if append {
            options.append(true);
        } else {
            options.truncate(true);
        }

        root.open_with(path, &options)
            .map_err(|e| SandboxError::IoError(format!("cannot open {}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use std::io::{Read, Write};
    use std::path::PathBuf;

    fn create_test_sandbox() -> (Sandbox, PathBuf) {
        let test_dir = PathBuf::from("./test_sandbox_temp");
        let _ = fs::remove_dir_all(&test_dir);
        fs::create_dir_all(&test_dir).unwrap();

        let config = FsConfig {
            allowed_paths: vec![test_dir.clone()],
        };
        let sandbox = Sandbox::new(&config).unwrap();

        (sandbox, test_dir)
    }

    fn cleanup_test_sandbox(test_dir: &PathBuf) {
        let _ = fs::remove_dir_all(test_dir);
    }

    #[test]
    #[serial]
    fn test_open_read_success() {
        let (sandbox, test_dir) = create_test_sandbox();

        fs::write(test_dir.join("in.smac"), "$(GREET)").unwrap();

        let mut contents = String::new();
        sandbox
            .open_read("in.smac")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "$(GREET)");

        cleanup_test_sandbox(&test_dir);
    }

    #[test]
    #[serial]
    fn test_open_write_truncates() {
        let (sandbox, test_dir) = create_test_sandbox();

        sandbox
            .open_write("out.txt", false)
            .unwrap()
            .write_all(b"first")
            .unwrap();
        sandbox
            .open_write("out.txt", false)
            .unwrap()
            .write_all(b"second")
            .unwrap();

        let contents = fs::read_to_string(test_dir.join("out.txt")).unwrap();
        assert_eq!(contents, "second");

        cleanup_test_sandbox(&test_dir);
    }

    #[test]
    #[serial]
    fn test_open_write_appends() {
        let (sandbox, test_dir) = create_test_sandbox();

        sandbox
            .open_write("log.txt", false)
            .unwrap()
            .write_all(b"one")
            .unwrap();
        sandbox
            .open_write("log.txt", true)
            .unwrap()
            .write_all(b"two")
            .unwrap();

        let contents = fs::read_to_string(test_dir.join("log.txt")).unwrap();
        assert_eq!(contents, "onetwo");

        cleanup_test_sandbox(&test_dir);
    }

    #[test]
    #[serial]
    fn test_missing_file() {
        let (sandbox, test_dir) = create_test_sandbox();

        let result = sandbox.open_read("nonexistent.smac");
        assert!(matches!(result, Err(SandboxError::FileNotFound(_))));

        cleanup_test_sandbox(&test_dir);
    }

    #[test]
    #[serial]
    fn test_path_traversal_rejected() {
        let (sandbox, test_dir) = create_test_sandbox();

        let result = sandbox.open_read("../../../etc/passwd");
        assert!(matches!(result, Err(SandboxError::PathNotAllowed(_))));

        cleanup_test_sandbox(&test_dir);
    }

    #[test]
    #[serial]
    fn test_absolute_path_rejected() {
        let (sandbox, test_dir) = create_test_sandbox();

        let result = sandbox.open_read("/etc/passwd");
        assert!(matches!(result, Err(SandboxError::PathNotAllowed(_))));

        let result = sandbox.open_write("/tmp/evil", false);
        assert!(matches!(result, Err(SandboxError::PathNotAllowed(_))));

        cleanup_test_sandbox(&test_dir);
    }
}
