//! micropython-lib bytecode builder
//!
//! Turns the packages of micropython-lib into precompiled `.mpy` files:
//! - Package discovery across the library categories
//! - Declarative `manifest.py` evaluation
//! - Per-file compilation with mpy-cross, version tagging included
//! - All-or-nothing placement of each package's output
//! - Build summary reporting

pub mod artifact;
pub mod builder;
pub mod compiler;
pub mod error;
pub mod exclusions;
pub mod manifest;
pub mod package;
pub mod report;
pub mod targets;

// Re-export main types
pub use artifact::CompiledArtifact;
pub use builder::{
    discover, is_toolchain_root, BuildConfig, DiscoveredPackage, LibraryBuilder,
};
pub use compiler::{ArtifactCompiler, BytecodeVersion, MpyCross};
pub use error::{BuildError, BuildResult};
pub use exclusions::{builtin_exclusions, BUILTIN_MODULES};
pub use manifest::{ManifestContents, ManifestFile, ManifestReader, PathVars};
pub use package::{PackageBuilder, PackageResult, PackageStatus};
pub use report::BuildReport;
pub use targets::{FileTarget, FileType, OptLevel};
