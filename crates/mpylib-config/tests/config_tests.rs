//! Configuration loading and precedence tests

use mpylib_config::loader::{ENV_LOG_FILE, ENV_MPY_CROSS};
use mpylib_config::{ConfigError, ConfigLoader, Overrides, CONFIG_FILE_NAME};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn create_config_file(dir: &Path, content: &str) -> PathBuf {
    let config_path = dir.join(CONFIG_FILE_NAME);
    fs::write(&config_path, content).unwrap();
    config_path
}

// ============================================================================
// Discovery
// ============================================================================

#[test]
#[serial]
fn test_load_from_subdirectory_finds_parent() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = create_config_file(
        temp_dir.path(),
        "[build]\ntoolchain = \"/src/micropython\"\n",
    );
    let nested = temp_dir.path().join("a/b");
    fs::create_dir_all(&nested).unwrap();

    let settings = ConfigLoader::new()
        .load_from_directory(&nested, &Overrides::default())
        .unwrap();

    assert_eq!(settings.toolchain_root, PathBuf::from("/src/micropython"));
    assert_eq!(settings.config_path, Some(config_path));
}

#[test]
#[serial]
fn test_compiler_section() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        r#"
[build]
lib_dirs = ["python-stdlib", "micropython"]

[compiler]
mpy_cross = "bin/mpy-cross"
march = "x64"
"#,
    );

    let settings = ConfigLoader::new()
        .load_from_directory(temp_dir.path(), &Overrides::default())
        .unwrap();

    assert_eq!(
        settings.lib_dirs,
        Some(vec!["python-stdlib".to_string(), "micropython".to_string()])
    );
    assert_eq!(settings.mpy_cross, Some(temp_dir.path().join("bin/mpy-cross")));
    assert_eq!(settings.march.as_deref(), Some("x64"));
}

// ============================================================================
// Errors
// ============================================================================

#[rstest]
#[case::bad_syntax("[build\noutput = 1\n")]
#[case::unknown_section("[package]\nname = \"x\"\n")]
#[case::wrong_type("[build]\noutput = 3\n")]
fn test_invalid_file_is_parse_error(#[case] content: &str) {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), content);

    let err = ConfigLoader::new()
        .load_from_file(&path, &Overrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::TomlParseError { .. }), "{err:?}");
}

#[test]
fn test_explicit_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = ConfigLoader::new()
        .load_from_file(&temp_dir.path().join("nope.toml"), &Overrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(_)));
}

#[test]
fn test_validation_error_surfaces() {
    let temp_dir = TempDir::new().unwrap();
    let path = create_config_file(temp_dir.path(), "[compiler]\nmarch = \"  \"\n");

    let err = ConfigLoader::new()
        .load_from_file(&path, &Overrides::default())
        .unwrap_err();
    assert!(err.to_string().contains("compiler.march"));
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
#[serial]
fn test_env_mpy_cross_overrides_file() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[compiler]\nmpy_cross = \"/file/mpy-cross\"\n");

    env::set_var(ENV_MPY_CROSS, "/env/mpy-cross");
    let settings = ConfigLoader::new().load_from_directory(temp_dir.path(), &Overrides::default());
    env::remove_var(ENV_MPY_CROSS);

    assert_eq!(
        settings.unwrap().mpy_cross,
        Some(PathBuf::from("/env/mpy-cross"))
    );
}

#[test]
#[serial]
fn test_empty_env_value_is_ignored() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(temp_dir.path(), "[build]\nlog_file = \"/file/build.log\"\n");

    env::set_var(ENV_LOG_FILE, "");
    let settings = ConfigLoader::new().load_from_directory(temp_dir.path(), &Overrides::default());
    env::remove_var(ENV_LOG_FILE);

    assert_eq!(settings.unwrap().log_file, PathBuf::from("/file/build.log"));
}

#[test]
#[serial]
fn test_flags_win_over_everything() {
    let temp_dir = TempDir::new().unwrap();
    create_config_file(
        temp_dir.path(),
        "[build]\noutput = \"/file/out\"\nlog_file = \"/file/log\"\n",
    );

    env::set_var(ENV_LOG_FILE, "/env/log");
    let overrides = Overrides {
        output: Some(PathBuf::from("/flag/out")),
        log_file: Some(PathBuf::from("/flag/log")),
        ..Overrides::default()
    };
    let settings = ConfigLoader::new().load_from_directory(temp_dir.path(), &overrides);
    env::remove_var(ENV_LOG_FILE);

    let settings = settings.unwrap();
    assert_eq!(settings.output_dir, PathBuf::from("/flag/out"));
    assert_eq!(settings.log_file, PathBuf::from("/flag/log"));
}
