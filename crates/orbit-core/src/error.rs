//! Error types for orbit-core.

use thiserror::Error;

/// Result type for orbit-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in orbit-core.
#[derive(Debug, Error)]
pub enum Error {
    /// Submission code could not be parsed into declarations and statements.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// An identifier was reused with a different declaration kind.
    #[error("conflicting redeclaration of `{identifier}`: already declared as {existing}, redeclared as {requested}")]
    Conflict {
        identifier: String,
        existing: String,
        requested: String,
    },

    /// Compilation failed for a reason other than diagnostics in user code.
    #[error("compilation failed: {0}")]
    Compilation(String),

    /// Toolchain missing or broken (fatal).
    #[error("toolchain error: {0}")]
    Toolchain(String),

    /// Scratch workspace could not be created or written (fatal).
    #[error("workspace error: {0}")]
    Workspace(String),

    /// Bad directive arguments.
    #[error("{0}")]
    Directive(String),

    /// Corrupt frame or broken display sideband.
    #[error("sideband error: {0}")]
    Sideband(String),

    /// Manifest could not be read or updated.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Spawning or waiting for a child process failed.
    #[error("execution error: {0}")]
    Execution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Execution was interrupted by the caller.
    #[error("execution aborted")]
    Aborted,
}

impl Error {
    /// Whether the error leaves the engine unusable (restart required).
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Toolchain(_) | Error::Workspace(_))
    }

    /// Render the error with a short recovery hint, for terminal display.
    pub fn with_hint(&self) -> String {
        let hint = match self {
            Error::Toolchain(_) => Some("install a Rust toolchain (https://rustup.rs) and make sure `cargo` is in PATH"),
            Error::Workspace(_) => Some("check that the temporary directory is writable, or set ORBIT_SCRATCH_DIR"),
            Error::Conflict { .. } => Some("use `%rm <name>` to drop the old declaration first"),
            Error::Manifest(_) => Some("`%reset manifest` restores the pristine Cargo.toml"),
            _ => None,
        };
        match hint {
            Some(hint) => format!("{self}\n  hint: {hint}"),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Toolchain("cargo not found".into()).is_fatal());
        assert!(Error::Workspace("read-only".into()).is_fatal());
        assert!(!Error::Directive("bad".into()).is_fatal());
        assert!(!Error::Aborted.is_fatal());
    }

    #[test]
    fn test_hint_appended() {
        let err = Error::Conflict {
            identifier: "Point".into(),
            existing: "type".into(),
            requested: "function".into(),
        };
        let rendered = err.with_hint();
        assert!(rendered.contains("`Point`"));
        assert!(rendered.contains("hint: use `%rm <name>`"));

        let plain = Error::Aborted.with_hint();
        assert_eq!(plain, "execution aborted");
    }
}
