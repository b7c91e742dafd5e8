use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

/// Build micropython-lib into precompiled .mpy bytecode.
///
/// Every package of micropython-lib (except the modules the unix port
/// already has built in) is compiled with mpy-cross and installed into a
/// directory MicroPython can import from.
///
/// EXAMPLES:
///     mpylib build                          Build into ~/.micropython/lib
///     mpylib build --toolchain ~/micropython  Use another checkout
///     mpylib build --json                   Print the report as JSON
///     mpylib list                           Show the packages that would be built
///
/// ENVIRONMENT VARIABLES:
///     MPYLIB_OUTPUT     Output directory
///     MPYLIB_TOOLCHAIN  MicroPython checkout
///     MPYLIB_LOG_FILE   Build log location
///     MPY_CROSS         mpy-cross binary
///     RUST_LOG          Log filter (default: info)
#[derive(Parser)]
#[command(name = "mpylib")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile every package and install the bytecode
    ///
    /// A package is installed only if all of its modules compile. Failed
    /// packages are listed in the summary and leave nothing behind.
    ///
    /// EXAMPLES:
    ///     mpylib build                        Build with defaults or mpylib.toml
    ///     mpylib build -o out/lib             Write into out/lib
    ///     mpylib build --log-file build.log   Log somewhere else
    #[command(visible_alias = "b")]
    Build {
        /// Output directory for .mpy files
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// MicroPython checkout containing lib/micropython-lib
        #[arg(long, short = 't')]
        toolchain: Option<PathBuf>,
        /// Build log location
        #[arg(long)]
        log_file: Option<PathBuf>,
        /// mpy-cross binary (default: the checkout's own build)
        #[arg(long)]
        mpy_cross: Option<PathBuf>,
        /// Configuration file (default: nearest mpylib.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// JSON output
        #[arg(long)]
        json: bool,
        /// Quiet output (log file only)
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// List discovered packages without building
    ///
    /// EXAMPLES:
    ///     mpylib list              Packages under the default checkout
    ///     mpylib list --json       Machine-readable listing
    #[command(visible_alias = "ls")]
    List {
        /// MicroPython checkout containing lib/micropython-lib
        #[arg(long, short = 't')]
        toolchain: Option<PathBuf>,
        /// Configuration file (default: nearest mpylib.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
        /// JSON output
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            output,
            toolchain,
            log_file,
            mpy_cross,
            config,
            json,
            quiet,
        } => {
            let args = commands::build::BuildArgs {
                output,
                toolchain,
                log_file,
                mpy_cross,
                config,
                json,
                quiet,
            };
            commands::build::run(args)?;
        }
        Commands::List {
            toolchain,
            config,
            json,
        } => {
            let args = commands::list::ListArgs {
                toolchain,
                config,
                json,
            };
            commands::list::run(args)?;
        }
    }

    Ok(())
}
