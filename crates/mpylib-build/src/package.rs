//! Building a single package with all-or-nothing semantics

use crate::artifact::CompiledArtifact;
use crate::compiler::{tag_source, ArtifactCompiler};
use crate::error::{BuildError, BuildResult};
use crate::manifest::{ManifestReader, PathVars};
use crate::targets::{FileTarget, FileType};
use std::collections::HashSet;
use std::path::Path;
use tracing::{error, info};

/// Outcome of one package build
#[derive(Debug)]
pub enum PackageStatus {
    /// Every eligible target compiled
    Built,
    /// A target was rejected or failed to compile; nothing may be written
    Failed(BuildError),
    /// The package is excluded and was never attempted
    Skipped,
}

/// Artifacts and status for one package
#[derive(Debug)]
pub struct PackageResult {
    pub package_name: String,
    pub artifacts: Vec<CompiledArtifact>,
    pub status: PackageStatus,
}

impl PackageResult {
    fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            artifacts: Vec::new(),
            status: PackageStatus::Built,
        }
    }

    /// Whether the package built cleanly
    pub fn succeeded(&self) -> bool {
        matches!(self.status, PackageStatus::Built)
    }

    /// Whether the package was skipped without an attempt
    pub fn is_skipped(&self) -> bool {
        matches!(self.status, PackageStatus::Skipped)
    }

    /// The error that failed the package
    pub fn failure(&self) -> Option<&BuildError> {
        match &self.status {
            PackageStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the package has output worth placing and reporting
    pub fn is_reportable(&self) -> bool {
        self.succeeded() && !self.artifacts.is_empty()
    }

    /// Release every artifact's temporary storage; returns how many were live
    pub fn release_all(&mut self) -> usize {
        self.artifacts
            .iter_mut()
            .map(CompiledArtifact::release)
            .filter(|released| *released)
            .count()
    }
}

/// Package name of a manifest: its directory's name
pub fn package_name(manifest_path: &Path) -> String {
    manifest_path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compiles the targets of one manifest
pub struct PackageBuilder<'a> {
    reader: &'a dyn ManifestReader,
    compiler: &'a dyn ArtifactCompiler,
    vars: &'a PathVars,
}

impl<'a> PackageBuilder<'a> {
    pub fn new(
        reader: &'a dyn ManifestReader,
        compiler: &'a dyn ArtifactCompiler,
        vars: &'a PathVars,
    ) -> Self {
        Self {
            reader,
            compiler,
            vars,
        }
    }

    /// Build the package described by `manifest_path`
    ///
    /// Package-level problems (unreadable manifest, bad target, compile
    /// error) produce a [`PackageStatus::Failed`] result with every
    /// artifact already released. Only toolchain and filesystem errors are
    /// returned as `Err`.
    pub fn build_package(
        &self,
        manifest_path: &Path,
        excluded: &HashSet<String>,
    ) -> BuildResult<PackageResult> {
        let name = package_name(manifest_path);
        let mut result = PackageResult::new(&name);

        if excluded.contains(&name) {
            result.status = PackageStatus::Skipped;
            return Ok(result);
        }

        let targets = match self.reader.read(manifest_path, self.vars) {
            Ok(targets) => targets,
            Err(e) if e.is_package_local() => {
                error!("> {}", e);
                error!("> Failed to build package {}", name);
                result.status = PackageStatus::Failed(e);
                return Ok(result);
            }
            Err(e) => return Err(e),
        };

        let mut failure = None;
        for target in &targets {
            if target.is_excluded_by(excluded) {
                info!("> Skipping module {}...", target.target_path);
                continue;
            }

            info!("> Compiling {}...", target.target_path);
            match self.compile_target(target) {
                Ok(artifact) => result.artifacts.push(artifact),
                Err(e) if e.is_package_local() => {
                    error!("> {}", e);
                    failure = Some(e);
                    break;
                }
                Err(e) => {
                    result.release_all();
                    return Err(e);
                }
            }
        }

        if let Some(e) = failure {
            error!("> Failed to build package {}", name);
            result.release_all();
            result.status = PackageStatus::Failed(e);
        }

        Ok(result)
    }

    fn compile_target(&self, target: &FileTarget) -> BuildResult<CompiledArtifact> {
        if target.file_type != FileType::Local {
            return Err(BuildError::NonLocalFile {
                target: target.target_path.clone(),
            });
        }
        if !target.has_source_suffix() {
            return Err(BuildError::UnexpectedSuffix {
                target: target.target_path.clone(),
            });
        }

        // The tagged copy must outlive the compile
        let tagged = tag_source(&target.full_path, target.version())?;
        let source = tagged
            .as_ref()
            .map(|file| file.path())
            .unwrap_or(target.full_path.as_path());
        self.compiler.compile(source, &target.target_path, target.opt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_package_name_from_manifest_dir() {
        assert_eq!(
            package_name(Path::new("/lib/python-stdlib/copy/manifest.py")),
            "copy"
        );
        assert_eq!(
            package_name(&PathBuf::from("micropython/bluetooth/aioble/manifest.py")),
            "aioble"
        );
    }

    #[test]
    fn test_result_status_helpers() {
        let mut result = PackageResult::new("copy");
        assert!(result.succeeded());
        assert!(!result.is_reportable());

        result.status = PackageStatus::Skipped;
        assert!(result.is_skipped());
        assert!(!result.succeeded());

        result.status = PackageStatus::Failed(BuildError::compilation("copy.py", "boom"));
        assert!(result.failure().is_some());
        assert_eq!(result.release_all(), 0);
    }
}
