//! End-to-end tests for the mpylib binary
//!
//! Builds run against a temporary micropython-lib tree and a shell script
//! standing in for mpy-cross.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn mpylib_cmd(cwd: &Path) -> Command {
    let mut cmd = Command::cargo_bin("mpylib").unwrap();
    cmd.current_dir(cwd)
        .env_remove("MPYLIB_OUTPUT")
        .env_remove("MPYLIB_TOOLCHAIN")
        .env_remove("MPYLIB_LOG_FILE")
        .env_remove("MPY_CROSS")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a file, creating its parents
fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// Fake mpy-cross: copies the source, fails on a marker
#[cfg(unix)]
const FAKE_MPY_CROSS: &str = r#"#!/bin/sh
if [ "$1" = "--version" ]; then
    echo "MicroPython v1.22.0 on 2024-01-01; mpy-cross emitting mpy v6.2"
    exit 0
fi
out=""
while [ $# -gt 1 ]; do
    case "$1" in
        -o) out="$2"; shift 2 ;;
        -s) shift 2 ;;
        *) shift ;;
    esac
done
if grep -q SYNTAX_ERROR "$1"; then
    echo "SyntaxError: invalid syntax" >&2
    exit 1
fi
cp "$1" "$out"
"#;

/// Checkout with packages `alpha` (2 modules), `beta` (broken), `asyncio` (builtin)
#[cfg(unix)]
fn create_toolchain() -> TempDir {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let lib = dir.path().join("lib/micropython-lib");

    write(
        &lib.join("python-stdlib/alpha/manifest.py"),
        "metadata(version=\"0.1.0\")\nmodule(\"alpha.py\")\npackage(\"alpha_util\")\n",
    );
    write(&lib.join("python-stdlib/alpha/alpha.py"), "A = 1\n");
    write(&lib.join("python-stdlib/alpha/alpha_util/__init__.py"), "");
    write(
        &lib.join("python-ecosys/beta/manifest.py"),
        "module(\"beta.py\")\n",
    );
    write(&lib.join("python-ecosys/beta/beta.py"), "SYNTAX_ERROR\n");
    write(
        &lib.join("micropython/asyncio/manifest.py"),
        "module(\"asyncio.py\")\n",
    );
    write(&lib.join("micropython/asyncio/asyncio.py"), "");

    let binary = dir.path().join("mpy-cross/build/mpy-cross");
    write(&binary, FAKE_MPY_CROSS);
    fs::set_permissions(&binary, fs::Permissions::from_mode(0o755)).unwrap();

    dir
}

fn output_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }
    files.sort();
    files
}

// ══════════════════════════════════════════════════════════════════════════════
// HELP
// ══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_help_shows_commands_and_examples() {
    let cwd = tempfile::tempdir().unwrap();
    mpylib_cmd(cwd.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("EXAMPLES"))
        .stdout(predicate::str::contains("MPYLIB_TOOLCHAIN"));
}

#[test]
fn test_unknown_flag_fails() {
    let cwd = tempfile::tempdir().unwrap();
    mpylib_cmd(cwd.path())
        .args(["build", "--no-such-flag"])
        .assert()
        .failure();
}

// ══════════════════════════════════════════════════════════════════════════════
// BUILD
// ══════════════════════════════════════════════════════════════════════════════

#[cfg(unix)]
#[test]
fn test_build_installs_only_successful_packages() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();
    let output = cwd.path().join("out");

    mpylib_cmd(cwd.path())
        .arg("build")
        .arg("--toolchain")
        .arg(toolchain.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stdout(predicate::str::contains("Building package alpha"))
        .stdout(predicate::str::contains("Skipping package asyncio"))
        .stdout(predicate::str::contains("Build complete."));

    assert_eq!(
        output_files(&output),
        vec![
            PathBuf::from("alpha.mpy"),
            PathBuf::from("alpha_util/__init__.mpy"),
        ]
    );

    let compiled = fs::read_to_string(output.join("alpha.mpy")).unwrap();
    assert!(compiled.contains("__version__ = '0.1.0'"));

    let log = fs::read_to_string(cwd.path().join("mpylib-build.log")).unwrap();
    assert!(log.contains("Failed to build package beta"));
    assert!(log.contains("Build successful: 1 packages."));
}

#[cfg(unix)]
#[test]
fn test_build_json_report() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();
    let output = cwd.path().join("out");

    let assert = mpylib_cmd(cwd.path())
        .arg("build")
        .arg("--json")
        .arg("--toolchain")
        .arg(toolchain.path())
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let report: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(report["built"], serde_json::json!(["alpha"]));
    assert_eq!(report["skipped"], serde_json::json!(["asyncio"]));
    assert_eq!(report["artifacts"], 2);
    assert_eq!(report["success"], false);
    assert_eq!(report["bytecode_version"]["major"], 6);
    assert!(report["failed"]["beta"]
        .as_str()
        .unwrap()
        .contains("SyntaxError"));
}

#[cfg(unix)]
#[test]
fn test_build_reads_config_file() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();
    write(
        &cwd.path().join("mpylib.toml"),
        &format!(
            "[build]\ntoolchain = \"{}\"\noutput = \"lib\"\nlog_file = \"logs/build.log\"\n",
            toolchain.path().display()
        ),
    );

    mpylib_cmd(cwd.path()).args(["build", "-q"]).assert().success().stdout("");

    assert!(cwd.path().join("lib/alpha.mpy").is_file());
    assert!(cwd.path().join("logs/build.log").is_file());
}

#[cfg(unix)]
#[test]
fn test_missing_compiler_is_fatal() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();

    mpylib_cmd(cwd.path())
        .arg("build")
        .arg("--toolchain")
        .arg(toolchain.path())
        .arg("--output")
        .arg(cwd.path().join("out"))
        .arg("--mpy-cross")
        .arg(cwd.path().join("no-such-mpy-cross"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to run"));

    assert!(!cwd.path().join("out").exists());
}

#[test]
fn test_missing_checkout_is_fatal() {
    let cwd = tempfile::tempdir().unwrap();

    mpylib_cmd(cwd.path())
        .arg("build")
        .arg("--toolchain")
        .arg(cwd.path().join("nowhere"))
        .arg("--output")
        .arg(cwd.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("No micropython-lib checkout"));

    let log = fs::read_to_string(cwd.path().join("mpylib-build.log")).unwrap();
    assert!(log.contains("Build aborted: No micropython-lib checkout"));
    assert!(!cwd.path().join("out").exists());
}

// ══════════════════════════════════════════════════════════════════════════════
// LIST
// ══════════════════════════════════════════════════════════════════════════════

#[cfg(unix)]
#[test]
fn test_list_marks_builtin_packages() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();

    mpylib_cmd(cwd.path())
        .arg("list")
        .arg("--toolchain")
        .arg(toolchain.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("asyncio"))
        .stdout(predicate::str::contains("(builtin, skipped)"))
        .stdout(predicate::str::contains("3 packages, 2 to build"));
}

#[cfg(unix)]
#[test]
fn test_list_json_in_category_order() {
    let toolchain = create_toolchain();
    let cwd = tempfile::tempdir().unwrap();

    let assert = mpylib_cmd(cwd.path())
        .args(["list", "--json", "--toolchain"])
        .arg(toolchain.path())
        .assert()
        .success();

    let packages: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let names: Vec<&str> = packages
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["asyncio", "alpha", "beta"]);
    assert_eq!(packages[0]["excluded"], true);
}
