//! File targets produced by manifest reading
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Suffix every compilable target must carry
pub const SOURCE_SUFFIX: &str = ".py";

/// Extension of compiled bytecode artifacts
pub const ARTIFACT_EXTENSION: &str = "mpy";

/// Where a file target's source comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileType {
    /// A file on the local filesystem
    Local,
    /// Anything else (remote URLs and the like)
    Other,
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Optimization level passed to the cross-compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptLevel {
    /// No optimization, asserts and `__debug__` kept
    O0,
    /// Asserts stripped
    O1,
    /// Docstrings stripped as well
    O2,
    /// Line numbers stripped as well
    O3,
}

impl OptLevel {
    /// Map the numeric level used in manifests
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::O0),
            1 => Some(Self::O1),
            2 => Some(Self::O2),
            3 => Some(Self::O3),
            _ => None,
        }
    }

    /// Numeric level
    pub fn level(&self) -> u8 {
        match self {
            Self::O0 => 0,
            Self::O1 => 1,
            Self::O2 => 2,
            Self::O3 => 3,
        }
    }

    /// Command-line flag understood by mpy-cross
    pub fn as_flag(&self) -> String {
        format!("-O{}", self.level())
    }
}

/// Opaque per-package metadata attached to targets (version, description, ...)
pub type Metadata = BTreeMap<String, String>;

/// A single file a manifest asks to be compiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTarget {
    /// Logical path inside the output tree, e.g. `aioble/core.py`
    pub target_path: String,
    /// Where the source lives
    pub full_path: PathBuf,
    /// Source kind
    pub file_type: FileType,
    /// Requested optimization level
    pub opt: Option<OptLevel>,
    /// Metadata of the manifest that added the file
    pub metadata: Metadata,
}

impl FileTarget {
    /// Create a local file target
    pub fn local(target_path: impl Into<String>, full_path: impl Into<PathBuf>) -> Self {
        Self {
            target_path: target_path.into(),
            full_path: full_path.into(),
            file_type: FileType::Local,
            opt: None,
            metadata: Metadata::new(),
        }
    }

    /// Set the file type
    pub fn with_file_type(mut self, file_type: FileType) -> Self {
        self.file_type = file_type;
        self
    }

    /// Set the optimization level
    pub fn with_opt(mut self, opt: Option<OptLevel>) -> Self {
        self.opt = opt;
        self
    }

    /// Set the metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Version tag from the metadata, if any
    pub fn version(&self) -> Option<&str> {
        self.metadata.get("version").map(String::as_str)
    }

    /// Directory segments of the target path (`a/b/c.py` -> `{"a", "b"}`)
    pub fn module_segments(&self) -> HashSet<&str> {
        match self.target_path.rsplit_once('/') {
            Some((dir, _)) => dir.split('/').collect(),
            None => HashSet::new(),
        }
    }

    /// Whether any directory segment names an excluded module
    pub fn is_excluded_by(&self, excluded: &HashSet<String>) -> bool {
        self.module_segments()
            .iter()
            .any(|segment| excluded.contains(*segment))
    }

    /// Whether the target path carries the source suffix
    pub fn has_source_suffix(&self) -> bool {
        self.target_path.ends_with(SOURCE_SUFFIX)
    }
}

/// Join `target_path` onto `output_root`, replacing a trailing `.py` with `.mpy`
pub fn artifact_path(output_root: &Path, target_path: &str) -> PathBuf {
    let stem = target_path
        .strip_suffix(SOURCE_SUFFIX)
        .unwrap_or(target_path);
    output_root.join(format!("{}.{}", stem, ARTIFACT_EXTENSION))
}
