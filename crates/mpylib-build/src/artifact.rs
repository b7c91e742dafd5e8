//! Compiled artifacts backed by temporary storage
//!
//! A [`CompiledArtifact`] owns the temporary `.mpy` file the cross-compiler
//! wrote. The file is deleted exactly once: by an explicit [`release`], or on
//! drop if nobody released it first. Releasing twice is a no-op.
//!
//! [`release`]: CompiledArtifact::release

use crate::error::{BuildError, BuildResult};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::warn;

/// Bytecode produced for one file target
#[derive(Debug)]
pub struct CompiledArtifact {
    /// Logical path of the source inside the package tree
    target_path: String,
    /// Temporary file holding the bytecode; `None` once released
    storage: Option<NamedTempFile>,
}

impl CompiledArtifact {
    /// Wrap the temporary file the compiler wrote into
    pub fn new(target_path: impl Into<String>, storage: NamedTempFile) -> Self {
        Self {
            target_path: target_path.into(),
            storage: Some(storage),
        }
    }

    /// Allocate fresh temporary storage suitable for an artifact
    pub fn temp_storage() -> io::Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix("mpylib-")
            .suffix(".mpy")
            .tempfile()
    }

    /// Logical target path
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Location of the temporary bytecode, while it still exists
    pub fn temp_path(&self) -> Option<&Path> {
        self.storage.as_ref().map(|f| f.path())
    }

    /// Whether the temporary storage is already gone
    pub fn is_released(&self) -> bool {
        self.storage.is_none()
    }

    /// Copy the bytecode to `dest`, creating the file fresh
    ///
    /// The destination gets default permissions rather than the private
    /// mode of the temporary file.
    pub fn copy_to(&self, dest: &Path) -> BuildResult<u64> {
        let src = self.temp_path().ok_or_else(|| {
            BuildError::io(
                dest,
                io::Error::new(io::ErrorKind::NotFound, "artifact already released"),
            )
        })?;
        let mut reader = File::open(src).map_err(|e| BuildError::io(src, e))?;
        let mut writer = File::create(dest).map_err(|e| BuildError::io(dest, e))?;
        io::copy(&mut reader, &mut writer).map_err(|e| BuildError::io(dest, e))
    }

    /// Delete the temporary storage; returns whether anything was deleted
    pub fn release(&mut self) -> bool {
        match self.storage.take() {
            Some(file) => {
                let path: PathBuf = file.path().to_path_buf();
                if let Err(e) = file.close() {
                    warn!("Failed to delete temporary artifact {}: {}", path.display(), e);
                }
                true
            }
            None => false,
        }
    }
}

/// Create every missing parent of `path` (mode 0775 on unix)
pub fn create_parent_dirs(path: &Path) -> BuildResult<()> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() || parent.is_dir() {
        return Ok(());
    }

    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o775);
    }
    builder
        .create(parent)
        .map_err(|e| BuildError::io(parent, e))
}
