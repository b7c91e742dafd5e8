//! Build configuration file (mpylib.toml)

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the configuration file
pub const CONFIG_FILE_NAME: &str = "mpylib.toml";

/// Contents of mpylib.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Where to read sources and write bytecode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<BuildSection>,

    /// Cross-compiler invocation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compiler: Option<CompilerSection>,
}

/// `[build]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    /// Output directory (default: ~/.micropython/lib)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// MicroPython checkout (default: /micropython)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<PathBuf>,

    /// Library categories to build, in order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lib_dirs: Option<Vec<String>>,

    /// Build log location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

/// `[compiler]` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct CompilerSection {
    /// mpy-cross binary (default: <toolchain>/mpy-cross/build/mpy-cross)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mpy_cross: Option<PathBuf>,

    /// Target architecture for native code, passed as -march
    #[serde(skip_serializing_if = "Option::is_none")]
    pub march: Option<String>,
}

impl ConfigFile {
    /// Load and validate a configuration file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config: ConfigFile =
            toml::from_str(&content).map_err(|e| ConfigError::TomlParseError {
                file: path.to_path_buf(),
                error: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Check values the type system lets through
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(build) = &self.build {
            if let Some(lib_dirs) = &build.lib_dirs {
                if lib_dirs.is_empty() {
                    return Err(ConfigError::invalid(
                        "build.lib_dirs",
                        "at least one library directory is required",
                    ));
                }
                if let Some(bad) = lib_dirs
                    .iter()
                    .find(|d| d.is_empty() || d.contains(['/', '\\']))
                {
                    return Err(ConfigError::invalid(
                        "build.lib_dirs",
                        format!("'{}' is not a directory name", bad),
                    ));
                }
            }
        }

        if let Some(march) = self.compiler.as_ref().and_then(|c| c.march.as_deref()) {
            if march.trim().is_empty() {
                return Err(ConfigError::invalid("compiler.march", "must not be empty"));
            }
        }

        Ok(())
    }

    pub fn build(&self) -> BuildSection {
        self.build.clone().unwrap_or_default()
    }

    pub fn compiler(&self) -> CompilerSection {
        self.compiler.clone().unwrap_or_default()
    }
}
