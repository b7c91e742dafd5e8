//! Package manifest descriptors
//!
//! Every package directory in micropython-lib carries a `manifest.py`
//! listing the files that belong to it. [`ManifestReader`] is the narrow
//! contract the build pipeline consumes; [`ManifestFile`] implements it by
//! statically evaluating the declarative subset of the manifest language
//! (`metadata`, `module`, `package`, `require`, `include`, option blocks)
//! without executing any Python.

pub mod lexer;
pub mod parser;
pub mod reader;

use crate::error::BuildResult;
use crate::targets::FileTarget;
use regex::Regex;
use std::collections::BTreeMap;
use std::path::Path;

pub use reader::{ManifestContents, ManifestFile};

/// File name of a package manifest
pub const MANIFEST_FILE_NAME: &str = "manifest.py";

/// Path variable pointing at the micropython-lib checkout
pub const LIB_DIR_VAR: &str = "MPY_LIB_DIR";

/// Variables substituted into `$(NAME)` references in manifest paths
pub type PathVars = BTreeMap<String, String>;

/// Turns a manifest descriptor into the ordered list of files it names
pub trait ManifestReader {
    /// Read `manifest_path`, resolving file references only
    fn read(&self, manifest_path: &Path, vars: &PathVars) -> BuildResult<Vec<FileTarget>>;
}

/// Expand `$(NAME)` references; unknown names are an error
pub fn substitute_vars(path: &str, vars: &PathVars) -> Result<String, String> {
    let re = Regex::new(r"\$\(([A-Za-z_][A-Za-z0-9_]*)\)").map_err(|e| e.to_string())?;
    let mut missing = None;
    let expanded = re.replace_all(path, |caps: &regex::Captures<'_>| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        }
    });

    match missing {
        Some(name) => Err(format!("unknown path variable $({})", name)),
        None => Ok(expanded.into_owned()),
    }
}

/// Whether a path refers to a remote resource rather than a local file
pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}
