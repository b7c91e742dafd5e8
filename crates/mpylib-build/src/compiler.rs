//! Cross-compiler integration
//!
//! [`ArtifactCompiler`] is the seam between the build pipeline and whatever
//! turns a `.py` source into `.mpy` bytecode. [`MpyCross`] drives the
//! `mpy-cross` binary from a MicroPython checkout.

use crate::artifact::CompiledArtifact;
use crate::error::{BuildError, BuildResult};
use crate::targets::OptLevel;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tempfile::NamedTempFile;
use tracing::debug;

/// Compiles one source file into a temporary bytecode artifact
pub trait ArtifactCompiler {
    /// Compile `source`, recording `target_path` as its logical name
    ///
    /// Rejections of the source itself are reported as
    /// [`BuildError::CompilationError`]; anything else aborts the run.
    fn compile(
        &self,
        source: &Path,
        target_path: &str,
        opt: Option<OptLevel>,
    ) -> BuildResult<CompiledArtifact>;

    /// Bytecode version emitted by this compiler, if it can tell
    fn bytecode_version(&self) -> BuildResult<Option<BytecodeVersion>> {
        Ok(None)
    }
}

/// `.mpy` format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytecodeVersion {
    pub major: u32,
    pub minor: u32,
}

impl BytecodeVersion {
    /// Parse the banner printed by `mpy-cross --version`
    pub fn parse(banner: &str) -> Option<Self> {
        let re = Regex::new(r"mpy-cross emitting mpy v(\d+)(?:\.(\d+))?").ok()?;
        let caps = re.captures(banner)?;
        let major = caps.get(1)?.as_str().parse().ok()?;
        let minor = match caps.get(2) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self { major, minor })
    }
}

impl std::fmt::Display for BytecodeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// The `mpy-cross` cross-compiler
#[derive(Debug, Clone)]
pub struct MpyCross {
    binary: PathBuf,
    march: Option<String>,
}

impl MpyCross {
    /// Use the binary at `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            march: None,
        }
    }

    /// Use the binary built inside a MicroPython checkout
    pub fn from_toolchain(toolchain_root: &Path) -> Self {
        Self::new(Self::default_binary(toolchain_root))
    }

    /// `<toolchain>/mpy-cross/build/mpy-cross`
    pub fn default_binary(toolchain_root: &Path) -> PathBuf {
        toolchain_root
            .join("mpy-cross")
            .join("build")
            .join("mpy-cross")
    }

    /// Target a specific native architecture (`-march=`)
    pub fn with_march(mut self, march: Option<String>) -> Self {
        self.march = march;
        self
    }

    /// Arguments for one compile, source last
    fn compile_args(
        &self,
        source: &Path,
        dest: &Path,
        target_path: &str,
        opt: Option<OptLevel>,
    ) -> Vec<String> {
        let mut args = vec![
            "-s".to_string(),
            target_path.to_string(),
            "-o".to_string(),
            dest.display().to_string(),
        ];
        if let Some(march) = &self.march {
            args.push(format!("-march={}", march));
        }
        if let Some(opt) = opt {
            args.push(opt.as_flag());
        }
        args.push(source.display().to_string());
        args
    }

    fn spawn_error(&self, e: std::io::Error) -> BuildError {
        BuildError::Toolchain(format!(
            "failed to run {}: {}",
            self.binary.display(),
            e
        ))
    }
}

impl ArtifactCompiler for MpyCross {
    fn compile(
        &self,
        source: &Path,
        target_path: &str,
        opt: Option<OptLevel>,
    ) -> BuildResult<CompiledArtifact> {
        let storage = CompiledArtifact::temp_storage()?;
        let args = self.compile_args(source, storage.path(), target_path, opt);
        debug!("{} {}", self.binary.display(), args.join(" "));

        let output = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            let mut message = String::from_utf8_lossy(&output.stdout).to_string();
            message.push_str(&String::from_utf8_lossy(&output.stderr));
            let message = message.trim();
            return Err(BuildError::compilation(
                target_path,
                if message.is_empty() {
                    format!("mpy-cross exited with {}", output.status)
                } else {
                    message.to_string()
                },
            ));
        }

        Ok(CompiledArtifact::new(target_path, storage))
    }

    fn bytecode_version(&self) -> BuildResult<Option<BytecodeVersion>> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        let banner = String::from_utf8_lossy(&output.stdout);
        BytecodeVersion::parse(&banner).map(Some).ok_or_else(|| {
            BuildError::Toolchain(format!(
                "unrecognised version banner from {}: {}",
                self.binary.display(),
                banner.trim()
            ))
        })
    }
}

/// Copy `source` to a temporary `.py` with `__version__` appended
///
/// Returns `None` when no tagging is needed: no version given, or the source
/// already defines `__version__`. The temporary copy is deleted on drop.
pub fn tag_source(source: &Path, version: Option<&str>) -> BuildResult<Option<NamedTempFile>> {
    let Some(version) = version else {
        return Ok(None);
    };

    let contents = fs::read_to_string(source)
        .map_err(|e| BuildError::compilation(source.display().to_string(), e))?;
    if contents.contains("__version__ =") {
        return Ok(None);
    }

    let mut tagged = tempfile::Builder::new()
        .prefix("mpylib-")
        .suffix(".py")
        .tempfile()?;
    tagged.write_all(contents.as_bytes())?;
    if !contents.is_empty() && !contents.ends_with('\n') {
        tagged.write_all(b"\n")?;
    }
    writeln!(tagged, "\n__version__ = {}", py_repr(version))?;
    tagged.flush()?;
    Ok(Some(tagged))
}

/// Single-quoted Python string literal
fn py_repr(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
