pub mod build;
pub mod list;

use anyhow::{Context, Result};
use mpylib_build::BuildConfig;
use mpylib_config::{BuildSettings, ConfigLoader, Overrides};
use std::path::Path;

/// Resolve settings from an explicit file or the nearest mpylib.toml
fn load_settings(config: Option<&Path>, overrides: &Overrides) -> Result<BuildSettings> {
    let loader = ConfigLoader::new();
    match config {
        Some(path) => loader
            .load_from_file(path, overrides)
            .with_context(|| format!("Failed to load {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            loader
                .load_from_directory(&cwd, overrides)
                .context("Failed to load configuration")
        }
    }
}

/// Builder configuration for the resolved settings
fn build_config(settings: &BuildSettings) -> BuildConfig {
    let config = BuildConfig::new(&settings.output_dir, &settings.toolchain_root);
    match &settings.lib_dirs {
        Some(lib_dirs) => config.with_lib_dirs(lib_dirs.clone()),
        None => config,
    }
}
