//! Build system error types
use std::path::PathBuf;
use thiserror::Error;

pub type BuildResult<T> = Result<T, BuildError>;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to parse manifest {path} (line {line}): {message}")]
    ManifestParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to read manifest at {path}: {error}")]
    ManifestReadError { path: PathBuf, error: String },

    #[error("Non-local file not supported: {target}")]
    NonLocalFile { target: String },

    #[error("Target path isn't a .py file: {target}")]
    UnexpectedSuffix { target: String },

    #[error("Compilation failed for module '{module}': {error}")]
    CompilationError { module: String, error: String },

    #[error("Toolchain error: {0}")]
    Toolchain(String),

    #[error("I/O error at {path}: {error}")]
    IoError {
        path: PathBuf,
        error: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    /// Create a manifest parse error
    pub fn manifest_parse(
        path: impl Into<PathBuf>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::ManifestParse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a manifest read error
    pub fn manifest_read(path: impl Into<PathBuf>, error: impl ToString) -> Self {
        Self::ManifestReadError {
            path: path.into(),
            error: error.to_string(),
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        Self::IoError {
            path: path.into(),
            error,
        }
    }

    /// Create a compilation error
    pub fn compilation(module: impl Into<String>, error: impl ToString) -> Self {
        Self::CompilationError {
            module: module.into(),
            error: error.to_string(),
        }
    }

    /// Whether the error only fails the package it occurred in
    pub fn is_package_local(&self) -> bool {
        matches!(
            self,
            Self::ManifestParse { .. }
                | Self::ManifestReadError { .. }
                | Self::NonLocalFile { .. }
                | Self::UnexpectedSuffix { .. }
                | Self::CompilationError { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_parse_message() {
        let err = BuildError::manifest_parse("pkg/manifest.py", 3, "unexpected token");
        assert_eq!(
            err.to_string(),
            "Failed to parse manifest pkg/manifest.py (line 3): unexpected token"
        );
    }

    #[test]
    fn test_package_local_classification() {
        assert!(BuildError::compilation("foo.py", "syntax error").is_package_local());
        assert!(BuildError::UnexpectedSuffix {
            target: "foo/bar.txt".to_string()
        }
        .is_package_local());
        assert!(!BuildError::Toolchain("missing".to_string()).is_package_local());
        assert!(!BuildError::io(
            "/out",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full")
        )
        .is_package_local());
    }
}
