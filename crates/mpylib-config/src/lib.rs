//! mpylib configuration
//!
//! Settings for a library build come from, in increasing precedence:
//! 1. Built-in defaults (`~/.micropython/lib`, `/micropython`)
//! 2. `mpylib.toml`, found by walking up from the working directory
//! 3. Environment variables (`MPYLIB_*`, `MPY_CROSS`)
//! 4. CLI flags, passed in as [`Overrides`]
//!
//! # Example
//!
//! ```no_run
//! use mpylib_config::{ConfigLoader, Overrides};
//! use std::path::Path;
//!
//! let loader = ConfigLoader::new();
//! let settings = loader
//!     .load_from_directory(Path::new("."), &Overrides::default())
//!     .unwrap();
//! println!("{}", settings.output_dir.display());
//! ```

pub mod file;
pub mod loader;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use file::{BuildSection, CompilerSection, ConfigFile, CONFIG_FILE_NAME};
pub use loader::{expand_tilde, BuildSettings, ConfigLoader, Overrides};
