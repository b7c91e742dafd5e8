//! Log output for one command run: console and log file

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Subscriber installed for the duration of a run
///
/// Events go to stdout when `console` is set and, when a log file is given,
/// are appended to it without colours. `RUST_LOG` overrides the default
/// `info` filter. The subscriber is only active on the current thread until
/// the session is finished or dropped.
pub struct LogSession {
    file: Option<(PathBuf, Arc<File>)>,
    _guard: DefaultGuard,
}

impl LogSession {
    pub fn start(log_file: Option<&Path>, console: bool) -> Result<Self> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let file = match log_file {
            Some(path) => Some((path.to_path_buf(), Arc::new(open_log(path)?))),
            None => None,
        };
        let file_layer = file.as_ref().map(|(_, file)| {
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::clone(file))
        });
        let console_layer = console.then(|| fmt::layer().with_target(false));

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer);

        Ok(Self {
            file,
            _guard: tracing::subscriber::set_default(subscriber),
        })
    }

    /// Flush the log file to disk and uninstall the subscriber
    pub fn finish(self) -> Result<()> {
        if let Some((path, file)) = &self.file {
            file.sync_all()
                .with_context(|| format!("Failed to flush log file {}", path.display()))?;
        }
        Ok(())
    }
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}
