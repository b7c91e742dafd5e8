//! List command - show discovered packages

use super::{build_config, load_settings};
use crate::logging::LogSession;
use anyhow::{bail, Result};
use mpylib_build::{discover, is_toolchain_root};
use mpylib_config::Overrides;
use std::path::PathBuf;

pub struct ListArgs {
    pub toolchain: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: ListArgs) -> Result<()> {
    let overrides = Overrides {
        toolchain: args.toolchain.clone(),
        ..Overrides::default()
    };
    let settings = load_settings(args.config.as_deref(), &overrides)?;
    let log = LogSession::start(None, !args.json)?;

    if !is_toolchain_root(&settings.toolchain_root) {
        bail!(
            "No micropython-lib checkout under {} (expected lib/micropython-lib)",
            settings.toolchain_root.display()
        );
    }

    let packages = discover(&build_config(&settings));
    log.finish()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    let width = packages.iter().map(|p| p.name.len()).max().unwrap_or(0);
    for package in &packages {
        let note = if package.excluded { "  (builtin, skipped)" } else { "" };
        println!(
            "{:<width$}  {}{}",
            package.name,
            package.category,
            note,
            width = width
        );
    }
    let buildable = packages.iter().filter(|p| !p.excluded).count();
    println!("\n{} packages, {} to build", packages.len(), buildable);

    Ok(())
}
