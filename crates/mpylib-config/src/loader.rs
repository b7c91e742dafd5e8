//! Configuration Loader
//!
//! Resolves the final build settings from defaults, mpylib.toml, the
//! environment and CLI flags, in that order of precedence.

use crate::file::{ConfigFile, CONFIG_FILE_NAME};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Output directory when nothing else is configured
pub const DEFAULT_OUTPUT: &str = "~/.micropython/lib";

/// MicroPython checkout when nothing else is configured
pub const DEFAULT_TOOLCHAIN: &str = "/micropython";

/// Build log when nothing else is configured
pub const DEFAULT_LOG_FILE: &str = "mpylib-build.log";

pub const ENV_OUTPUT: &str = "MPYLIB_OUTPUT";
pub const ENV_TOOLCHAIN: &str = "MPYLIB_TOOLCHAIN";
pub const ENV_LOG_FILE: &str = "MPYLIB_LOG_FILE";
pub const ENV_MPY_CROSS: &str = "MPY_CROSS";

/// Values given on the command line; `None` means "not given"
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub output: Option<PathBuf>,
    pub toolchain: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub mpy_cross: Option<PathBuf>,
}

/// Fully resolved build settings
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSettings {
    /// Where `.mpy` files are written
    pub output_dir: PathBuf,
    /// MicroPython checkout
    pub toolchain_root: PathBuf,
    /// Library categories; `None` keeps the builder's defaults
    pub lib_dirs: Option<Vec<String>>,
    /// Build log location
    pub log_file: PathBuf,
    /// Explicit mpy-cross binary; `None` means the toolchain's own build
    pub mpy_cross: Option<PathBuf>,
    /// `-march` value for mpy-cross
    pub march: Option<String>,
    /// The mpylib.toml these settings were read from
    pub config_path: Option<PathBuf>,
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load settings, looking for mpylib.toml from `start_dir` upwards
    pub fn load_from_directory(
        &self,
        start_dir: &Path,
        overrides: &Overrides,
    ) -> ConfigResult<BuildSettings> {
        match find_config_file(start_dir) {
            Some(path) => self.load_from_file(&path, overrides),
            None => self.resolve(ConfigFile::default(), None, overrides),
        }
    }

    /// Load settings from a specific configuration file
    pub fn load_from_file(
        &self,
        config_path: &Path,
        overrides: &Overrides,
    ) -> ConfigResult<BuildSettings> {
        let file = ConfigFile::load_from_file(config_path)?;
        self.resolve(file, Some(config_path), overrides)
    }

    fn resolve(
        &self,
        file: ConfigFile,
        config_path: Option<&Path>,
        overrides: &Overrides,
    ) -> ConfigResult<BuildSettings> {
        let base = config_path.and_then(Path::parent);
        let build = file.build();
        let compiler = file.compiler();

        // Relative paths in the file are relative to the file
        let from_file = |path: Option<PathBuf>| -> ConfigResult<Option<PathBuf>> {
            path.map(|p| -> ConfigResult<PathBuf> {
                let expanded = expand_tilde(&p)?;
                Ok(match base {
                    Some(base) if expanded.is_relative() => base.join(expanded),
                    _ => expanded,
                })
            })
            .transpose()
        };

        let output = pick(
            overrides.output.clone(),
            env_path(ENV_OUTPUT),
            from_file(build.output)?,
            DEFAULT_OUTPUT,
        );
        let toolchain = pick(
            overrides.toolchain.clone(),
            env_path(ENV_TOOLCHAIN),
            from_file(build.toolchain)?,
            DEFAULT_TOOLCHAIN,
        );
        let log_file = pick(
            overrides.log_file.clone(),
            env_path(ENV_LOG_FILE),
            from_file(build.log_file)?,
            DEFAULT_LOG_FILE,
        );
        let mpy_cross = overrides
            .mpy_cross
            .clone()
            .or_else(|| env_path(ENV_MPY_CROSS))
            .map_or_else(|| from_file(compiler.mpy_cross), |p| Ok(Some(p)))?;

        Ok(BuildSettings {
            output_dir: expand_tilde(&output)?,
            toolchain_root: absolute(expand_tilde(&toolchain)?)?,
            lib_dirs: build.lib_dirs,
            log_file: expand_tilde(&log_file)?,
            mpy_cross: mpy_cross.map(|p| expand_tilde(&p)).transpose()?,
            march: compiler.march,
            config_path: config_path.map(Path::to_path_buf),
        })
    }
}

/// Walk up from `start_dir` looking for mpylib.toml
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|path| path.is_file())
}

/// Replace a leading `~` with the home directory
pub fn expand_tilde(path: &Path) -> ConfigResult<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Anchor a relative path at the working directory
fn absolute(path: PathBuf) -> ConfigResult<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()?.join(path))
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn pick(
    flag: Option<PathBuf>,
    env: Option<PathBuf>,
    file: Option<PathBuf>,
    default: &str,
) -> PathBuf {
    flag.or(env)
        .or(file)
        .unwrap_or_else(|| PathBuf::from(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn create_config_file(dir: &Path, content: &str) -> PathBuf {
        let config_path = dir.join(CONFIG_FILE_NAME);
        fs::write(&config_path, content).unwrap();
        config_path
    }

    #[test]
    fn test_expand_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(
            expand_tilde(Path::new("~/.micropython/lib")).unwrap(),
            home.join(".micropython/lib")
        );
        assert_eq!(
            expand_tilde(Path::new("/abs/path")).unwrap(),
            PathBuf::from("/abs/path")
        );
        assert_eq!(
            expand_tilde(Path::new("~user/x")).unwrap(),
            PathBuf::from("~user/x")
        );
    }

    #[test]
    #[serial]
    fn test_defaults_without_config() {
        let temp_dir = TempDir::new().unwrap();
        let settings = ConfigLoader::new()
            .load_from_directory(temp_dir.path(), &Overrides::default())
            .unwrap();

        assert_eq!(
            settings.output_dir,
            dirs::home_dir().unwrap().join(".micropython/lib")
        );
        assert_eq!(settings.toolchain_root, PathBuf::from("/micropython"));
        assert_eq!(settings.log_file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(settings.config_path, None);
    }

    #[test]
    #[serial]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(
            temp_dir.path(),
            "[build]\noutput = \"out\"\ntoolchain = \"/opt/micropython\"\n",
        );

        let settings = ConfigLoader::new()
            .load_from_directory(temp_dir.path(), &Overrides::default())
            .unwrap();

        assert_eq!(settings.output_dir, temp_dir.path().join("out"));
        assert_eq!(settings.toolchain_root, PathBuf::from("/opt/micropython"));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        create_config_file(temp_dir.path(), "[build]\ntoolchain = \"/opt/micropython\"\n");

        env::set_var(ENV_TOOLCHAIN, "/env/micropython");
        let settings = ConfigLoader::new()
            .load_from_directory(temp_dir.path(), &Overrides::default());
        env::remove_var(ENV_TOOLCHAIN);

        assert_eq!(
            settings.unwrap().toolchain_root,
            PathBuf::from("/env/micropython")
        );
    }

    #[test]
    #[serial]
    fn test_flag_overrides_env() {
        let temp_dir = TempDir::new().unwrap();

        env::set_var(ENV_OUTPUT, "/env/out");
        let overrides = Overrides {
            output: Some(PathBuf::from("/flag/out")),
            ..Overrides::default()
        };
        let settings = ConfigLoader::new().load_from_directory(temp_dir.path(), &overrides);
        env::remove_var(ENV_OUTPUT);

        assert_eq!(settings.unwrap().output_dir, PathBuf::from("/flag/out"));
    }

    #[test]
    #[serial]
    fn test_relative_toolchain_flag_is_anchored_at_cwd() {
        let temp_dir = TempDir::new().unwrap();
        let overrides = Overrides {
            toolchain: Some(PathBuf::from("../../micropython")),
            ..Overrides::default()
        };

        let settings = ConfigLoader::new()
            .load_from_directory(temp_dir.path(), &overrides)
            .unwrap();

        assert!(settings.toolchain_root.is_absolute());
        assert_eq!(
            settings.toolchain_root,
            env::current_dir().unwrap().join("../../micropython")
        );
    }
}
