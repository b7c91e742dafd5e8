//! Library build orchestration
use crate::artifact::create_parent_dirs;
use crate::compiler::ArtifactCompiler;
use crate::error::BuildResult;
use crate::exclusions::builtin_exclusions;
use crate::manifest::{ManifestReader, PathVars, LIB_DIR_VAR, MANIFEST_FILE_NAME};
use crate::package::{package_name, PackageBuilder, PackageResult};
use crate::report::BuildReport;
use crate::targets::artifact_path;

use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Location of micropython-lib inside a MicroPython checkout
pub const LIB_SUBDIR: &str = "lib/micropython-lib";

/// Library categories built by default, in build order
///
/// `unix-ffi` is left out: its packages are only usable through mip.
pub const DEFAULT_LIB_DIRS: [&str; 3] = ["micropython", "python-stdlib", "python-ecosys"];

/// Build configuration
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Where `.mpy` files are written
    pub output_dir: PathBuf,
    /// MicroPython checkout holding micropython-lib and mpy-cross
    pub toolchain_root: PathBuf,
    /// Library categories under micropython-lib, in build order
    pub lib_dirs: Vec<String>,
    /// Package and module names that are never built
    pub excluded: HashSet<String>,
}

impl BuildConfig {
    /// Configuration with the default categories and builtin exclusions
    pub fn new(output_dir: impl Into<PathBuf>, toolchain_root: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            toolchain_root: toolchain_root.into(),
            lib_dirs: DEFAULT_LIB_DIRS.iter().map(|d| d.to_string()).collect(),
            excluded: builtin_exclusions(),
        }
    }

    /// Set the library categories
    pub fn with_lib_dirs(mut self, lib_dirs: Vec<String>) -> Self {
        self.lib_dirs = lib_dirs;
        self
    }

    /// Replace the exclusion set
    pub fn with_excluded(mut self, excluded: HashSet<String>) -> Self {
        self.excluded = excluded;
        self
    }

    /// `<toolchain>/lib/micropython-lib`
    pub fn lib_root(&self) -> PathBuf {
        self.toolchain_root.join(LIB_SUBDIR)
    }

    /// Variables available to manifests
    pub fn path_vars(&self) -> PathVars {
        let mut vars = PathVars::new();
        vars.insert(
            LIB_DIR_VAR.to_string(),
            self.lib_root().to_string_lossy().into_owned(),
        );
        vars
    }
}

/// A manifest found during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredPackage {
    /// Package name (the manifest's directory)
    pub name: String,
    /// Path of the manifest
    pub manifest_path: PathBuf,
    /// Library category it was found under
    pub category: String,
    /// Whether the exclusion set rules it out
    pub excluded: bool,
}

/// Builds every package of micropython-lib
pub struct LibraryBuilder<R, C> {
    config: BuildConfig,
    reader: R,
    compiler: C,
}

impl<R: ManifestReader, C: ArtifactCompiler> LibraryBuilder<R, C> {
    pub fn new(config: BuildConfig, reader: R, compiler: C) -> Self {
        Self {
            config,
            reader,
            compiler,
        }
    }

    /// Compiler driving the build
    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Find every package manifest, category by category
    pub fn discover(&self) -> Vec<DiscoveredPackage> {
        discover(&self.config)
    }

    /// Build all packages and place their bytecode in the output directory
    ///
    /// A failing package never stops the run. Errors returned from here are
    /// run-fatal: the compiler can't be driven, or the output tree can't be
    /// written. When a package name turns up more than once only the first
    /// manifest found is built.
    pub fn build(&self) -> BuildResult<BuildReport> {
        let build_start = Instant::now();
        let mut report = BuildReport::new();

        report.bytecode_version = self.compiler.bytecode_version()?;
        if let Some(version) = report.bytecode_version {
            info!("Generating bytecode version {}...", version.major);
        }

        let vars = self.config.path_vars();
        let package_builder = PackageBuilder::new(&self.reader, &self.compiler, &vars);
        let mut seen: HashSet<String> = HashSet::new();

        for package in self.discover() {
            if !seen.insert(package.name.clone()) {
                warn!(
                    "Package {} already handled, ignoring {}",
                    package.name,
                    package.manifest_path.display()
                );
                continue;
            }
            if package.excluded {
                info!("Skipping package {}...", package.name);
                report.record_skipped(&package.name);
                continue;
            }

            info!("Building package {}...", package.name);
            let mut result =
                package_builder.build_package(&package.manifest_path, &self.config.excluded)?;

            if let Some(e) = result.failure() {
                report.record_failed(&package.name, e);
                result.release_all();
            } else if result.is_skipped() {
                report.record_skipped(&package.name);
            } else if result.is_reportable() {
                let written = self.place(&mut result)?;
                report.record_built(&package.name, written);
            } else {
                debug!("Package {} has no modules to build", package.name);
            }
        }

        report.total_time = build_start.elapsed();
        report.log_summary();
        Ok(report)
    }

    /// Copy a built package's artifacts into the output tree
    fn place(&self, result: &mut PackageResult) -> BuildResult<usize> {
        let mut written = 0;
        for artifact in &mut result.artifacts {
            let dest = artifact_path(&self.config.output_dir, artifact.target_path());
            create_parent_dirs(&dest)?;
            artifact.copy_to(&dest)?;
            artifact.release();
            debug!("Wrote {}", dest.display());
            written += 1;
        }
        Ok(written)
    }
}

/// Find every package manifest under the configured categories
///
/// Packages come out category by category, sorted by file name within each.
pub fn discover(config: &BuildConfig) -> Vec<DiscoveredPackage> {
    let lib_root = config.lib_root();
    let mut packages = Vec::new();

    for category in &config.lib_dirs {
        let dir = lib_root.join(category);
        if !dir.is_dir() {
            warn!("Library directory not found: {}", dir.display());
            continue;
        }

        for entry in WalkDir::new(&dir)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || entry.file_name() != MANIFEST_FILE_NAME {
                continue;
            }
            let name = package_name(entry.path());
            packages.push(DiscoveredPackage {
                excluded: config.excluded.contains(&name),
                name,
                manifest_path: entry.path().to_path_buf(),
                category: category.clone(),
            });
        }
    }

    packages
}

/// Whether `path` looks like a MicroPython checkout with micropython-lib
pub fn is_toolchain_root(path: &Path) -> bool {
    path.join(LIB_SUBDIR).is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_config_defaults() {
        let config = BuildConfig::new("/out", "/micropython");
        assert_eq!(config.lib_dirs, DEFAULT_LIB_DIRS);
        assert!(config.excluded.contains("asyncio"));
        assert_eq!(
            config.lib_root(),
            PathBuf::from("/micropython/lib/micropython-lib")
        );
    }

    #[test]
    fn test_path_vars() {
        let config = BuildConfig::new("/out", "/micropython");
        assert_eq!(
            config.path_vars().get(LIB_DIR_VAR).map(String::as_str),
            Some("/micropython/lib/micropython-lib")
        );
    }

    #[test]
    fn test_is_toolchain_root() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_toolchain_root(dir.path()));
        std::fs::create_dir_all(dir.path().join(LIB_SUBDIR)).unwrap();
        assert!(is_toolchain_root(dir.path()));
    }
}
