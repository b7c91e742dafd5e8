//! Build command - compile micropython-lib and install the bytecode

use super::{build_config, load_settings};
use crate::logging::LogSession;
use anyhow::{bail, Result};
use mpylib_build::{is_toolchain_root, BuildReport, LibraryBuilder, ManifestFile, MpyCross};
use mpylib_config::{BuildSettings, Overrides};
use std::path::PathBuf;
use tracing::error;

/// Build command arguments
#[derive(Default)]
pub struct BuildArgs {
    /// Output directory for .mpy files
    pub output: Option<PathBuf>,
    /// MicroPython checkout
    pub toolchain: Option<PathBuf>,
    /// Build log location
    pub log_file: Option<PathBuf>,
    /// mpy-cross binary
    pub mpy_cross: Option<PathBuf>,
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// JSON output
    pub json: bool,
    /// Quiet output (log file only)
    pub quiet: bool,
}

impl BuildArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            output: self.output.clone(),
            toolchain: self.toolchain.clone(),
            log_file: self.log_file.clone(),
            mpy_cross: self.mpy_cross.clone(),
        }
    }
}

/// Run the build command
pub fn run(args: BuildArgs) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), &args.overrides())?;
    let log = LogSession::start(Some(&settings.log_file), !args.quiet && !args.json)?;

    if !is_toolchain_root(&settings.toolchain_root) {
        let message = format!(
            "No micropython-lib checkout under {} (expected lib/micropython-lib)",
            settings.toolchain_root.display()
        );
        error!("Build aborted: {}", message);
        log.finish()?;
        bail!(message);
    }

    let builder = LibraryBuilder::new(
        build_config(&settings),
        ManifestFile::new(),
        compiler_for(&settings),
    );
    let report = match builder.build() {
        Ok(report) => report,
        Err(e) => {
            error!("Build aborted: {}", e);
            return Err(anyhow::Error::new(e).context("Build failed"));
        }
    };
    log.finish()?;

    if args.json {
        println!("{}", report_json(&report, &settings));
    } else if !args.quiet {
        print_summary(&report, &settings);
    }

    Ok(())
}

/// mpy-cross from the settings, falling back to the checkout's own build
fn compiler_for(settings: &BuildSettings) -> MpyCross {
    let compiler = match &settings.mpy_cross {
        Some(binary) => MpyCross::new(binary),
        None => MpyCross::from_toolchain(&settings.toolchain_root),
    };
    compiler.with_march(settings.march.clone())
}

fn report_json(report: &BuildReport, settings: &BuildSettings) -> serde_json::Value {
    serde_json::json!({
        "success": !report.has_failures(),
        "output": settings.output_dir,
        "total_time": report.total_time.as_secs_f64(),
        "built": report.built,
        "failed": report.failed,
        "skipped": report.skipped,
        "artifacts": report.artifacts_written,
        "bytecode_version": report.bytecode_version,
    })
}

fn print_summary(report: &BuildReport, settings: &BuildSettings) {
    println!("\n{}", "=".repeat(60));
    println!(
        "Build finished in {:.2}s",
        report.total_time.as_secs_f64()
    );
    println!("{}", "=".repeat(60));
    println!("  Output: {}", settings.output_dir.display());
    println!("  Built: {} packages", report.built.len());
    println!("  Failed: {} packages", report.failed.len());
    println!("  Skipped: {} packages", report.skipped.len());
    println!("  Files: {}", report.artifacts_written);
    println!("  Log: {}", settings.log_file.display());
    println!("{}", "=".repeat(60));
}
